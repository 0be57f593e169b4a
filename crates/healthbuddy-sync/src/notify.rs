//! In-process notification service
//!
//! [`BroadcastNotifier`] fans notifications out to any number of
//! subscribers (the CLI prints them, a UI would render them). Eviction
//! notices get their own channel so the user-facing layer can show a
//! distinct alert for changes that were not saved remotely.

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use healthbuddy_core::ports::{EvictionNotice, INotificationService, Notification};

/// Buffered messages per subscriber before the oldest are dropped
const CHANNEL_CAPACITY: usize = 64;

/// Notification service backed by `tokio::sync::broadcast` channels
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    notifications: broadcast::Sender<Notification>,
    evictions: broadcast::Sender<EvictionNotice>,
}

impl BroadcastNotifier {
    /// Creates a notifier with no subscribers
    pub fn new() -> Self {
        let (notifications, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (evictions, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            notifications,
            evictions,
        }
    }

    /// Subscribes to every notification, eviction alerts included
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.notifications.subscribe()
    }

    /// Subscribes to eviction notices only
    pub fn subscribe_evictions(&self) -> broadcast::Receiver<EvictionNotice> {
        self.evictions.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl INotificationService for BroadcastNotifier {
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        info!(
            title = %notification.title,
            priority = %notification.priority,
            category = %notification.category,
            "Notification"
        );
        // No subscribers is not an error: the log line above is the record
        if self.notifications.send(notification.clone()).is_err() {
            debug!("No notification subscribers");
        }
        Ok(())
    }

    async fn notify_eviction(&self, notice: &EvictionNotice) -> anyhow::Result<()> {
        warn!(
            queue_id = %notice.queue_id,
            entity_id = %notice.entity_id,
            target = %notice.target,
            reason = %notice.reason,
            retry_count = notice.retry_count,
            "Operation evicted"
        );
        if self.evictions.send(notice.clone()).is_err() {
            debug!("No eviction subscribers");
        }
        self.notify(&notice.to_notification()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use healthbuddy_core::domain::{
        newtypes::{EntityId, LogicalPath, QueueId},
        NewOperation, OperationMethod, QueuedOperation,
    };
    use healthbuddy_core::ports::{EvictionReason, NotificationPriority};
    use serde_json::json;

    fn notice() -> EvictionNotice {
        let op = QueuedOperation::enqueued(
            QueueId::new(7),
            NewOperation::new(
                OperationMethod::Update,
                LogicalPath::new("/goals").unwrap(),
                EntityId::goals(),
                json!({"daily_calories": 1800}),
            ),
            Utc::now(),
        );
        EvictionNotice::new(&op, EvictionReason::Rejected, 1, "HTTP 422", Utc::now())
    }

    #[tokio::test]
    async fn test_notify_without_subscribers_is_ok() {
        let notifier = BroadcastNotifier::new();
        notifier
            .notify(&Notification::sync("Synced", "All changes saved"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_eviction_reaches_both_channels() {
        let notifier = BroadcastNotifier::new();
        let mut all = notifier.subscribe();
        let mut evictions = notifier.subscribe_evictions();

        notifier.notify_eviction(&notice()).await.unwrap();

        let evicted = evictions.recv().await.unwrap();
        assert_eq!(evicted.queue_id, QueueId::new(7));
        assert_eq!(evicted.reason, EvictionReason::Rejected);

        let alert = all.recv().await.unwrap();
        assert_eq!(alert.priority, NotificationPriority::High);
        assert!(alert.title.contains("goals"));
    }
}
