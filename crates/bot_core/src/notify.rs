//! Best-effort outbound delivery. Failures never propagate into the
//! conversation flow; they are surfaced as an explicit [`Delivery`] outcome
//! so callers and tests can still observe them.

use std::time::Duration;

use async_trait::async_trait;
use shared::domain::{ChatId, UserId};
use tracing::warn;

/// Seam between the controller's intents and the real messaging transport.
#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn deliver(&self, chat: ChatId, text: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Failed,
    /// No admin sink is configured; nothing was attempted.
    NoSink,
}

impl Delivery {
    pub fn is_sent(&self) -> bool {
        matches!(self, Delivery::Sent)
    }
}

pub struct Notifier<S> {
    sink: S,
    admin_chat: Option<ChatId>,
    broadcast_delay: Duration,
}

impl<S: MessageSink> Notifier<S> {
    pub fn new(sink: S, admin_chat: Option<ChatId>) -> Self {
        Self {
            sink,
            admin_chat,
            broadcast_delay: Duration::from_millis(30),
        }
    }

    pub fn with_broadcast_delay(mut self, delay: Duration) -> Self {
        self.broadcast_delay = delay;
        self
    }

    /// At most one delivery attempt against the configured admin sink.
    pub async fn notify_admin(&self, text: &str) -> Delivery {
        let Some(chat) = self.admin_chat else {
            return Delivery::NoSink;
        };
        match self.sink.deliver(chat, text).await {
            Ok(()) => Delivery::Sent,
            Err(error) => {
                warn!(%chat, %error, "admin notification failed");
                Delivery::Failed
            }
        }
    }

    pub async fn notify_user(&self, user: UserId, text: &str) -> Delivery {
        match self.sink.deliver(ChatId::from(user), text).await {
            Ok(()) => Delivery::Sent,
            Err(error) => {
                warn!(%user, %error, "user notification failed");
                Delivery::Failed
            }
        }
    }

    /// Attempts delivery to every id, spacing sends to respect outbound rate
    /// limits. A failed recipient is skipped, never aborts the loop.
    pub async fn broadcast(&self, user_ids: &[UserId], text: &str) -> usize {
        let mut sent = 0;
        for user in user_ids {
            if self.notify_user(*user, text).await.is_sent() {
                sent += 1;
            }
            tokio::time::sleep(self.broadcast_delay).await;
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Sink that fails for a configured set of chats and records the rest.
    struct FlakySink {
        failing: Vec<i64>,
        delivered: Mutex<Vec<(i64, String)>>,
    }

    impl FlakySink {
        fn new(failing: Vec<i64>) -> Self {
            Self {
                failing,
                delivered: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MessageSink for FlakySink {
        async fn deliver(&self, chat: ChatId, text: &str) -> anyhow::Result<()> {
            if self.failing.contains(&chat.0) {
                anyhow::bail!("delivery refused for chat {chat}");
            }
            self.delivered
                .lock()
                .expect("lock")
                .push((chat.0, text.to_string()));
            Ok(())
        }
    }

    fn notifier(sink: FlakySink, admin: Option<i64>) -> Notifier<FlakySink> {
        Notifier::new(sink, admin.map(ChatId)).with_broadcast_delay(Duration::ZERO)
    }

    #[tokio::test]
    async fn broadcast_counts_only_successful_deliveries() {
        let notifier = notifier(FlakySink::new(vec![2]), None);
        let sent = notifier
            .broadcast(&[UserId(1), UserId(2), UserId(3)], "hello")
            .await;
        assert_eq!(sent, 2);

        let delivered = notifier.sink.delivered.lock().expect("lock");
        let chats: Vec<i64> = delivered.iter().map(|(chat, _)| *chat).collect();
        assert_eq!(chats, vec![1, 3]);
    }

    #[tokio::test]
    async fn admin_notification_reports_outcome_without_failing() {
        let reachable = notifier(FlakySink::new(vec![]), Some(99));
        assert_eq!(reachable.notify_admin("summary").await, Delivery::Sent);

        let unreachable = notifier(FlakySink::new(vec![99]), Some(99));
        assert_eq!(unreachable.notify_admin("summary").await, Delivery::Failed);
    }

    #[tokio::test]
    async fn admin_notification_without_sink_attempts_nothing() {
        let notifier = notifier(FlakySink::new(vec![]), None);
        assert_eq!(notifier.notify_admin("summary").await, Delivery::NoSink);
        assert!(notifier.sink.delivered.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn user_notification_is_best_effort() {
        let notifier = notifier(FlakySink::new(vec![7]), None);
        assert_eq!(notifier.notify_user(UserId(7), "hi").await, Delivery::Failed);
        assert_eq!(notifier.notify_user(UserId(8), "hi").await, Delivery::Sent);
    }
}
