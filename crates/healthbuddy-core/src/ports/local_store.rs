//! Local store ports (driven/secondary ports)
//!
//! This module defines the interfaces for the durable local mirror and the
//! outbound operation queue, and the combined store that couples a mirror
//! write with its enqueue in a single local transaction.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because storage errors are adapter-specific
//!   (SQLite, filesystem, etc.); the engine client maps them onto
//!   `SyncError::LocalStorageFailure` before they reach a domain service.
//! - Queue removal is idempotent: removing an id twice reports `false` the
//!   second time instead of failing.
//! - `ILocalStore` exists so that a mirror write can never land without its
//!   queued operation (and vice versa).

use crate::domain::{
    newtypes::{EntityId, EntityKind, QueueId},
    EntityPayload, MirrorEntry, NewOperation, QueuedOperation,
};

// ============================================================================
// EntryFilter
// ============================================================================

/// Filter criteria for listing mirror entries
///
/// All fields are optional; when unset, no filtering is applied for that
/// field. Results are ordered by `last_updated`, newest first.
///
/// # Example
///
/// ```
/// use healthbuddy_core::domain::EntityKind;
/// use healthbuddy_core::ports::EntryFilter;
///
/// // The 20 most recently touched meals
/// let filter = EntryFilter::new().with_kind(EntityKind::Meal).with_limit(20);
/// assert!(!filter.is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    /// Filter by entity kind
    pub kind: Option<EntityKind>,
    /// Only entries awaiting reconciliation
    pub pending_only: bool,
    /// Maximum number of entries returned
    pub limit: Option<u32>,
}

impl EntryFilter {
    /// Creates a new empty filter (matches all entries)
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the kind filter
    pub fn with_kind(mut self, kind: EntityKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Restricts the listing to pending entries
    pub fn pending(mut self) -> Self {
        self.pending_only = true;
        self
    }

    /// Sets the result limit
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Returns true if no filters are set
    pub fn is_empty(&self) -> bool {
        self.kind.is_none() && !self.pending_only && self.limit.is_none()
    }
}

// ============================================================================
// IMirrorStore
// ============================================================================

/// Port trait for the local mirror of entity values
#[async_trait::async_trait]
pub trait IMirrorStore: Send + Sync {
    /// Returns the latest locally known value; never touches the network
    async fn get(&self, entity_id: &EntityId) -> anyhow::Result<Option<MirrorEntry>>;

    /// Upserts a value and its pending flag atomically
    async fn put(
        &self,
        entity_id: &EntityId,
        value: &EntityPayload,
        pending_sync: bool,
    ) -> anyhow::Result<MirrorEntry>;

    /// Replaces the local value with the server's canonical response and
    /// clears `pending_sync`
    ///
    /// If newer operations for the same entity are still queued, the newer
    /// optimistic value is laid over the server value (server-only fields
    /// such as an assigned id survive), the entry stays pending, and queued
    /// operations addressed by the entity's local key are rebound to the
    /// server id.
    async fn mark_synced(
        &self,
        entity_id: &EntityId,
        server_value: &EntityPayload,
    ) -> anyhow::Result<()>;

    /// Applies a value fetched from the remote unless the entry is pending
    ///
    /// Returns true if the value was written.
    async fn refresh(
        &self,
        entity_id: &EntityId,
        server_value: &EntityPayload,
    ) -> anyhow::Result<bool>;

    /// Deletes an entry (explicit entity deletion). Returns true if it existed.
    async fn delete(&self, entity_id: &EntityId) -> anyhow::Result<bool>;

    /// Lists entries matching the filter, newest first
    async fn list(&self, filter: &EntryFilter) -> anyhow::Result<Vec<MirrorEntry>>;

    /// Lists entries awaiting reconciliation, newest first
    async fn list_pending(&self) -> anyhow::Result<Vec<MirrorEntry>> {
        self.list(&EntryFilter::new().pending()).await
    }
}

// ============================================================================
// IOutboundQueue
// ============================================================================

/// Port trait for the durable, strictly ordered outbound operation log
#[async_trait::async_trait]
pub trait IOutboundQueue: Send + Sync {
    /// Appends an operation and returns its monotonically increasing id
    async fn enqueue(&self, operation: &NewOperation) -> anyhow::Result<QueueId>;

    /// Returns all pending operations in enqueue order
    async fn peek_ordered(&self) -> anyhow::Result<Vec<QueuedOperation>>;

    /// Retrieves a single operation by id
    async fn get_operation(&self, queue_id: QueueId) -> anyhow::Result<Option<QueuedOperation>>;

    /// Removes an operation; returns false if it was already gone
    async fn remove(&self, queue_id: QueueId) -> anyhow::Result<bool>;

    /// Increments `retry_count` and stores `last_error`
    ///
    /// Returns the new retry count, or `None` if the operation no longer exists.
    async fn record_failure(&self, queue_id: QueueId, error: &str) -> anyhow::Result<Option<u32>>;

    /// Returns the number of pending operations
    async fn pending_count(&self) -> anyhow::Result<u64>;

    /// Discards every pending operation; returns how many were removed
    async fn clear(&self) -> anyhow::Result<u64>;
}

// ============================================================================
// ILocalStore
// ============================================================================

/// Mirror and queue behind one transactional boundary
#[async_trait::async_trait]
pub trait ILocalStore: IMirrorStore + IOutboundQueue {
    /// Writes the optimistic value (`pending_sync = true`) and enqueues the
    /// operation in one local transaction
    ///
    /// Either both land or neither does.
    async fn record_mutation(
        &self,
        entity_id: &EntityId,
        value: &EntityPayload,
        operation: &NewOperation,
    ) -> anyhow::Result<(MirrorEntry, QueueId)>;

    /// Removes a successfully dispatched operation and reconciles its mirror
    /// entry (see [`IMirrorStore::mark_synced`]) in one local transaction
    ///
    /// Returns false, without touching the mirror, if the operation had
    /// already been removed.
    async fn acknowledge(
        &self,
        queue_id: QueueId,
        entity_id: &EntityId,
        server_value: &EntityPayload,
    ) -> anyhow::Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_filter() {
        assert!(EntryFilter::new().is_empty());
    }

    #[test]
    fn test_filter_builders() {
        let filter = EntryFilter::new()
            .with_kind(EntityKind::Hydration)
            .pending()
            .with_limit(5);
        assert_eq!(filter.kind, Some(EntityKind::Hydration));
        assert!(filter.pending_only);
        assert_eq!(filter.limit, Some(5));
    }
}
