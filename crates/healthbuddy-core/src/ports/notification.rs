//! Notification service port (driven/secondary port)
//!
//! Eviction of a queued operation must always reach the user. The sync
//! coordinator builds an [`EvictionNotice`] and hands it to an
//! [`INotificationService`]; adapters decide how it is displayed
//! (terminal, in-process broadcast, desktop toast).
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because notification delivery is adapter-specific.
//! - Notifications are fire-and-forget; a delivery failure is logged by the
//!   caller and never aborts a drain cycle.

use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    newtypes::{EntityId, LogicalPath, QueueId},
    OperationMethod, QueuedOperation, SyncError,
};

// ============================================================================
// Notification struct and NotificationPriority enum
// ============================================================================

/// Priority level for a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    /// Low priority, may not be shown immediately
    Low,
    /// Normal priority
    #[default]
    Normal,
    /// High priority, shown prominently
    High,
}

impl Display for NotificationPriority {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotificationPriority::Low => "low",
            NotificationPriority::Normal => "normal",
            NotificationPriority::High => "high",
        };
        write!(f, "{}", s)
    }
}

/// A notification to display to the user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Title of the notification (short, descriptive)
    pub title: String,
    /// Body text with details about the event
    pub body: String,
    /// Priority level affecting how the notification is displayed
    pub priority: NotificationPriority,
    /// Category for grouping/filtering (e.g., "sync", "error")
    pub category: String,
}

impl Notification {
    /// Creates a new notification with `Normal` priority and no category
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            priority: NotificationPriority::Normal,
            category: String::new(),
        }
    }

    /// Sets the priority level
    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    /// Creates a sync-related notification
    pub fn sync(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, body).with_category("sync")
    }

    /// Creates an error notification with High priority
    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new(title, body)
            .with_priority(NotificationPriority::High)
            .with_category("error")
    }
}

// ============================================================================
// EvictionNotice
// ============================================================================

/// Why an operation left the queue without succeeding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionReason {
    /// The remote rejected the operation outright
    Rejected,
    /// Transient failures reached the retry cap
    RetryCapReached,
}

impl Display for EvictionReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            EvictionReason::Rejected => write!(f, "rejected by server"),
            EvictionReason::RetryCapReached => write!(f, "retry limit reached"),
        }
    }
}

/// Describes an evicted operation; the mutation it carried was not applied
/// remotely
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionNotice {
    pub queue_id: QueueId,
    pub entity_id: EntityId,
    pub method: OperationMethod,
    pub target: LogicalPath,
    pub reason: EvictionReason,
    pub retry_count: u32,
    pub last_error: String,
    pub evicted_at: DateTime<Utc>,
}

impl EvictionNotice {
    /// Builds a notice from the operation being evicted
    pub fn new(
        operation: &QueuedOperation,
        reason: EvictionReason,
        retry_count: u32,
        last_error: impl Into<String>,
        evicted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            queue_id: operation.queue_id(),
            entity_id: operation.entity_id().clone(),
            method: operation.method(),
            target: operation.target().clone(),
            reason,
            retry_count,
            last_error: last_error.into(),
            evicted_at,
        }
    }

    /// The error surfaced to the user for this eviction
    pub fn to_error(&self) -> SyncError {
        match self.reason {
            EvictionReason::Rejected => SyncError::PermanentRemoteFailure(self.last_error.clone()),
            EvictionReason::RetryCapReached => SyncError::QueuePoisoned {
                queue_id: self.queue_id,
                retry_count: self.retry_count,
                last_error: self.last_error.clone(),
            },
        }
    }

    /// Renders the notice as a high priority notification
    pub fn to_notification(&self) -> Notification {
        Notification::error(
            format!("Change to {} was not saved", self.entity_id),
            format!(
                "{} {} {}: {}",
                self.method, self.target, self.reason, self.to_error()
            ),
        )
        .with_category("sync")
    }
}

// ============================================================================
// INotificationService trait
// ============================================================================

/// Port trait for user-facing notifications
#[async_trait::async_trait]
pub trait INotificationService: Send + Sync {
    /// Sends a notification to the user
    async fn notify(&self, notification: &Notification) -> anyhow::Result<()>;

    /// Reports an evicted operation
    ///
    /// The default renders the notice through [`INotificationService::notify`].
    async fn notify_eviction(&self, notice: &EvictionNotice) -> anyhow::Result<()> {
        self.notify(&notice.to_notification()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewOperation;

    fn sample_operation() -> QueuedOperation {
        let op = NewOperation::new(
            OperationMethod::Update,
            LogicalPath::new("/goals").unwrap(),
            EntityId::goals(),
            serde_json::json!({"steps": 9000}),
        );
        QueuedOperation::enqueued(QueueId::new(7), op, Utc::now())
    }

    #[test]
    fn test_notification_builders() {
        let n = Notification::error("t", "b");
        assert_eq!(n.priority, NotificationPriority::High);
        assert_eq!(n.category, "error");
        assert_eq!(Notification::sync("t", "b").category, "sync");
    }

    #[test]
    fn test_eviction_notice_rejected_maps_to_permanent() {
        let notice = EvictionNotice::new(
            &sample_operation(),
            EvictionReason::Rejected,
            0,
            "HTTP 400: bad goals",
            Utc::now(),
        );
        assert_eq!(
            notice.to_error(),
            SyncError::PermanentRemoteFailure("HTTP 400: bad goals".to_string())
        );
    }

    #[test]
    fn test_eviction_notice_cap_maps_to_poisoned() {
        let notice = EvictionNotice::new(
            &sample_operation(),
            EvictionReason::RetryCapReached,
            3,
            "timeout",
            Utc::now(),
        );
        match notice.to_error() {
            SyncError::QueuePoisoned {
                queue_id,
                retry_count,
                ..
            } => {
                assert_eq!(queue_id, QueueId::new(7));
                assert_eq!(retry_count, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let notification = notice.to_notification();
        assert_eq!(notification.priority, NotificationPriority::High);
        assert!(notification.title.contains("goals"));
    }
}
