use std::time::Duration;

use bot_core::{notify::Notifier, texts, Controller, Inbound, Outbound};
use shared::domain::{ChatId, UserId};
use telegram::{Message, TelegramClient, TelegramError, Update};
use tokio::time::sleep;
use tracing::{error, info, warn};

const POLL_TIMEOUT_SECS: u64 = 50;
const CONFLICT_BACKOFF: Duration = Duration::from_secs(5);
const POLL_FAILURE_BACKOFF: Duration = Duration::from_secs(10);

/// Single-consumer update loop. Faults never tear the process down: a
/// conflicting consumer or a transport error backs off and re-polls, bounded
/// to one retry in flight at a time (no recursive re-entry).
pub async fn run_polling(
    client: &TelegramClient,
    controller: &mut Controller,
    notifier: &Notifier<TelegramClient>,
) {
    let mut offset: Option<i64> = None;
    info!("polling for updates");
    loop {
        match client.get_updates(offset, POLL_TIMEOUT_SECS).await {
            Ok(updates) => {
                for update in updates {
                    offset = Some(update.update_id + 1);
                    process_update(client, controller, notifier, update).await;
                }
            }
            Err(TelegramError::Conflict(description)) => {
                error!(
                    %description,
                    backoff_secs = CONFLICT_BACKOFF.as_secs(),
                    "another instance is consuming this update stream"
                );
                sleep(CONFLICT_BACKOFF).await;
            }
            Err(error) => {
                error!(
                    %error,
                    backoff_secs = POLL_FAILURE_BACKOFF.as_secs(),
                    "polling failed"
                );
                sleep(POLL_FAILURE_BACKOFF).await;
            }
        }
    }
}

async fn process_update(
    client: &TelegramClient,
    controller: &mut Controller,
    notifier: &Notifier<TelegramClient>,
    update: Update,
) {
    let Some(message) = update.message else {
        return;
    };
    let Some(inbound) = inbound_from_message(&message) else {
        return;
    };

    match controller.handle(&inbound).await {
        Ok(actions) => execute(client, notifier, actions).await,
        Err(error) => error!(sender = %inbound.sender, %error, "failed to handle inbound event"),
    }
}

pub fn inbound_from_message(message: &Message) -> Option<Inbound> {
    let from = message.from.as_ref()?;
    let text = message.text.clone()?;
    Some(Inbound {
        sender: UserId(from.id),
        chat: ChatId(message.chat.id),
        handle: from.username.clone(),
        text,
    })
}

/// Executes controller intents. Every delivery here is best-effort: a failed
/// send is logged and the remaining actions still run.
pub async fn execute(
    client: &TelegramClient,
    notifier: &Notifier<TelegramClient>,
    actions: Vec<Outbound>,
) {
    for action in actions {
        match action {
            Outbound::Reply {
                chat,
                text,
                keyboard,
            } => {
                if let Err(error) = client.send_message(chat, &text, keyboard).await {
                    warn!(%chat, %error, "reply delivery failed");
                }
            }
            Outbound::NotifyAdmin { text } => {
                let outcome = notifier.notify_admin(&text).await;
                if !outcome.is_sent() {
                    warn!(?outcome, "admin summary not delivered");
                }
            }
            Outbound::NotifyUser { user, text } => {
                notifier.notify_user(user, &text).await;
            }
            Outbound::SendDocument {
                chat,
                filename,
                bytes,
                caption,
            } => {
                if let Err(error) = client.send_document(chat, &filename, bytes, &caption).await {
                    warn!(%chat, %error, "document delivery failed");
                }
            }
            Outbound::Broadcast {
                reply_chat,
                user_ids,
                text,
            } => {
                let sent = notifier.broadcast(&user_ids, &text).await;
                if let Err(error) = client
                    .send_message(reply_chat, &texts::broadcast_report(sent), None)
                    .await
                {
                    warn!(%reply_chat, %error, "broadcast report delivery failed");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use telegram::{Chat, User};

    fn message(from: Option<User>, chat_id: i64, text: Option<&str>) -> Message {
        Message {
            message_id: 1,
            from,
            chat: Chat { id: chat_id },
            text: text.map(str::to_string),
        }
    }

    #[test]
    fn maps_message_to_inbound_event() {
        let inbound = inbound_from_message(&message(
            Some(User {
                id: 101,
                username: Some("joe".into()),
                first_name: None,
            }),
            -500,
            Some("/start"),
        ))
        .expect("inbound");

        assert_eq!(inbound.sender, UserId(101));
        assert_eq!(inbound.chat, ChatId(-500));
        assert_eq!(inbound.handle.as_deref(), Some("joe"));
        assert_eq!(inbound.text, "/start");
    }

    #[test]
    fn skips_messages_without_sender_or_text() {
        assert!(inbound_from_message(&message(None, 1, Some("hi"))).is_none());
        assert!(inbound_from_message(&message(
            Some(User {
                id: 101,
                username: None,
                first_name: None,
            }),
            1,
            None,
        ))
        .is_none());
    }
}
