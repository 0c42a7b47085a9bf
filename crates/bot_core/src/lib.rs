use std::{
    collections::HashMap,
    time::{Duration, Instant},
};

use anyhow::Result;
use chrono::Utc;
use shared::domain::{ChatId, ClaimStatus, UserId};
use storage::Storage;

pub mod notify;
pub mod texts;

/// Process-wide referral configuration, fixed at startup. The code recorded
/// on a user record comes from the profile active at creation time.
#[derive(Debug, Clone)]
pub struct BotProfile {
    pub brand_name: String,
    pub referral_code: String,
    pub referral_link: String,
}

/// Static allow-list for admin commands: the configured admin chat or the
/// configured admin user may invoke them, nobody else.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdminGate {
    pub admin_user: Option<UserId>,
    pub admin_chat: Option<ChatId>,
}

impl AdminGate {
    pub fn permits(&self, sender: UserId, chat: ChatId) -> bool {
        self.admin_chat == Some(chat) || self.admin_user == Some(sender)
    }
}

/// Per-user cooldown on the claim trigger. An accepted call updates the
/// timestamp; a rejected call leaves it untouched.
#[derive(Debug)]
pub struct Cooldown {
    window: Duration,
    last_accepted: HashMap<UserId, Instant>,
}

impl Cooldown {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: HashMap::new(),
        }
    }

    pub fn allow(&mut self, user: UserId) -> bool {
        self.allow_at(user, Instant::now())
    }

    pub fn allow_at(&mut self, user: UserId, now: Instant) -> bool {
        if let Some(last) = self.last_accepted.get(&user) {
            if now.duration_since(*last) < self.window {
                return false;
            }
        }
        self.last_accepted.insert(user, now);
        true
    }
}

/// Ephemeral per-user conversation state. Not persisted; a restart drops
/// every user back to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    #[default]
    Idle,
    AwaitingIdentity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyboard {
    Menu,
    Claim,
}

/// One inbound chat event: who sent it, where, and the raw text.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub sender: UserId,
    pub chat: ChatId,
    pub handle: Option<String>,
    pub text: String,
}

/// Outbound intent produced by the controller. Delivery (and its best-effort
/// semantics) happens in the dispatch layer, never here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Reply {
        chat: ChatId,
        text: String,
        keyboard: Option<Keyboard>,
    },
    NotifyAdmin {
        text: String,
    },
    NotifyUser {
        user: UserId,
        text: String,
    },
    SendDocument {
        chat: ChatId,
        filename: String,
        bytes: Vec<u8>,
        caption: String,
    },
    Broadcast {
        reply_chat: ChatId,
        user_ids: Vec<UserId>,
        text: String,
    },
}

/// Maps inbound events to store mutations and outbound intents. Holds all
/// mutable conversation state as explicit fields: one controller is
/// constructed at startup and handed every event in arrival order.
pub struct Controller {
    storage: Storage,
    profile: BotProfile,
    gate: AdminGate,
    cooldown: Cooldown,
    flows: HashMap<UserId, Flow>,
}

impl Controller {
    pub fn new(
        storage: Storage,
        profile: BotProfile,
        gate: AdminGate,
        cooldown_window: Duration,
    ) -> Self {
        Self {
            storage,
            profile,
            gate,
            cooldown: Cooldown::new(cooldown_window),
            flows: HashMap::new(),
        }
    }

    pub fn flow(&self, user: UserId) -> Flow {
        self.flows.get(&user).copied().unwrap_or_default()
    }

    pub async fn handle(&mut self, inbound: &Inbound) -> Result<Vec<Outbound>> {
        let text = inbound.text.trim();
        let command = text.split_whitespace().next().unwrap_or_default();

        match command {
            "/setstatus" => return self.admin_set_status(inbound, text).await,
            "/export" => return self.admin_export(inbound).await,
            "/stats" => return self.admin_stats(inbound).await,
            "/broadcast" => return self.admin_broadcast(inbound, text).await,
            _ => {}
        }

        // Any recognized command or button supersedes a pending
        // awaiting-identity flow; only free text feeds it.
        match command {
            "/start" => {
                self.flows.insert(inbound.sender, Flow::Idle);
                return self.start(inbound).await;
            }
            "/help" => {
                self.flows.insert(inbound.sender, Flow::Idle);
                return Ok(vec![reply(
                    inbound.chat,
                    texts::help(&self.profile),
                    Some(Keyboard::Menu),
                )]);
            }
            _ => {}
        }

        match text {
            texts::CLAIM_BUTTON => {
                self.flows.insert(inbound.sender, Flow::Idle);
                self.claim(inbound).await
            }
            texts::DONE_BUTTON => self.done(inbound).await,
            texts::STATUS_BUTTON => {
                self.flows.insert(inbound.sender, Flow::Idle);
                self.status(inbound).await
            }
            texts::HELP_BUTTON => {
                self.flows.insert(inbound.sender, Flow::Idle);
                Ok(vec![reply(
                    inbound.chat,
                    texts::help(&self.profile),
                    Some(Keyboard::Menu),
                )])
            }
            _ if self.flow(inbound.sender) == Flow::AwaitingIdentity => {
                self.receive_identity(inbound, text).await
            }
            _ => Ok(Vec::new()),
        }
    }

    async fn start(&mut self, inbound: &Inbound) -> Result<Vec<Outbound>> {
        self.get_or_create(inbound).await?;
        Ok(vec![reply(
            inbound.chat,
            texts::welcome(&self.profile),
            Some(Keyboard::Menu),
        )])
    }

    async fn claim(&mut self, inbound: &Inbound) -> Result<Vec<Outbound>> {
        if !self.cooldown.allow(inbound.sender) {
            return Ok(vec![reply(inbound.chat, texts::wait_a_moment(), None)]);
        }

        self.get_or_create(inbound).await?;
        Ok(vec![reply(
            inbound.chat,
            texts::claim_instructions(&self.profile),
            Some(Keyboard::Claim),
        )])
    }

    async fn done(&mut self, inbound: &Inbound) -> Result<Vec<Outbound>> {
        self.get_or_create(inbound).await?;
        self.storage.mark_signed_up(inbound.sender).await?;
        self.flows.insert(inbound.sender, Flow::AwaitingIdentity);
        Ok(vec![reply(
            inbound.chat,
            texts::identity_prompt(),
            Some(Keyboard::Menu),
        )])
    }

    async fn status(&mut self, inbound: &Inbound) -> Result<Vec<Outbound>> {
        let record = self.get_or_create(inbound).await?;
        Ok(vec![reply(
            inbound.chat,
            texts::status_view(&record),
            Some(Keyboard::Menu),
        )])
    }

    async fn receive_identity(&mut self, inbound: &Inbound, text: &str) -> Result<Vec<Outbound>> {
        if text.chars().count() < 2 {
            // Flow is preserved so the user can retry.
            return Ok(vec![reply(inbound.chat, texts::invalid_identity(), None)]);
        }

        self.get_or_create(inbound).await?;
        self.storage.save_submission(inbound.sender, text).await?;
        let record = self.get_or_create(inbound).await?;
        self.flows.insert(inbound.sender, Flow::Idle);

        Ok(vec![
            Outbound::NotifyAdmin {
                text: texts::admin_summary(&record, text),
            },
            reply(
                inbound.chat,
                texts::submission_confirmed(text),
                Some(Keyboard::Menu),
            ),
        ])
    }

    async fn admin_set_status(&mut self, inbound: &Inbound, text: &str) -> Result<Vec<Outbound>> {
        if let Some(denied) = self.deny_unless_admin(inbound) {
            return Ok(denied);
        }

        let parts: Vec<&str> = text.split_whitespace().collect();
        if parts.len() != 3 {
            return Ok(vec![reply(inbound.chat, texts::setstatus_usage(), None)]);
        }

        let Ok(target) = parts[1].parse::<i64>() else {
            return Ok(vec![reply(inbound.chat, texts::invalid_target_id(), None)]);
        };
        let target = UserId(target);

        let status = match parts[2].parse::<ClaimStatus>() {
            Ok(status) => status,
            Err(_) => {
                return Ok(vec![reply(inbound.chat, texts::invalid_status(), None)]);
            }
        };

        if !self.storage.set_status(target, status).await? {
            return Ok(vec![reply(inbound.chat, texts::target_not_found(), None)]);
        }

        Ok(vec![
            reply(inbound.chat, texts::status_updated(target, status), None),
            Outbound::NotifyUser {
                user: target,
                text: texts::status_changed_notice(status),
            },
        ])
    }

    async fn admin_export(&mut self, inbound: &Inbound) -> Result<Vec<Outbound>> {
        if let Some(denied) = self.deny_unless_admin(inbound) {
            return Ok(denied);
        }

        let records = self.storage.list_all().await?;
        let csv = export_csv(&records);
        Ok(vec![Outbound::SendDocument {
            chat: inbound.chat,
            filename: format!("users_export_{}.csv", Utc::now().timestamp()),
            bytes: csv.into_bytes(),
            caption: texts::export_caption().to_string(),
        }])
    }

    async fn admin_stats(&mut self, inbound: &Inbound) -> Result<Vec<Outbound>> {
        if let Some(denied) = self.deny_unless_admin(inbound) {
            return Ok(denied);
        }

        let total = self.storage.count_users().await?;
        let by_status = self.storage.count_by_status().await?;
        Ok(vec![reply(
            inbound.chat,
            texts::stats(&self.profile, total, &by_status),
            None,
        )])
    }

    async fn admin_broadcast(&mut self, inbound: &Inbound, text: &str) -> Result<Vec<Outbound>> {
        if let Some(denied) = self.deny_unless_admin(inbound) {
            return Ok(denied);
        }

        let payload = text
            .strip_prefix("/broadcast")
            .unwrap_or_default()
            .trim();
        if payload.is_empty() {
            return Ok(vec![reply(inbound.chat, texts::broadcast_usage(), None)]);
        }

        let user_ids = self.storage.list_user_ids().await?;
        Ok(vec![Outbound::Broadcast {
            reply_chat: inbound.chat,
            user_ids,
            text: payload.to_string(),
        }])
    }

    fn deny_unless_admin(&self, inbound: &Inbound) -> Option<Vec<Outbound>> {
        if self.gate.permits(inbound.sender, inbound.chat) {
            None
        } else {
            Some(vec![reply(inbound.chat, texts::not_allowed(), None)])
        }
    }

    async fn get_or_create(&self, inbound: &Inbound) -> Result<storage::UserRecord> {
        self.storage
            .get_or_create_user(
                inbound.sender,
                inbound.handle.as_deref(),
                &self.profile.referral_code,
            )
            .await
    }
}

fn reply(chat: ChatId, text: String, keyboard: Option<Keyboard>) -> Outbound {
    Outbound::Reply {
        chat,
        text,
        keyboard,
    }
}

pub fn export_csv(records: &[storage::UserRecord]) -> String {
    let mut out = String::from(
        "telegram_id,handle,referral_code,signed_up,claim_submitted,platform_identity,status,updated_at\n",
    );
    for record in records {
        let row = [
            record.user_id.to_string(),
            record.handle.clone().unwrap_or_default(),
            record.referral_code.clone(),
            i64::from(record.signed_up).to_string(),
            i64::from(record.claim_submitted).to_string(),
            record.platform_identity.clone().unwrap_or_default(),
            record.status.to_string(),
            record.updated_at.to_rfc3339(),
        ];
        let encoded: Vec<String> = row.iter().map(|field| csv_field(field)).collect();
        out.push_str(&encoded.join(","));
        out.push('\n');
    }
    out
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
