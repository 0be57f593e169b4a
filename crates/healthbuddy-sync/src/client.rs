//! Engine client used by domain services
//!
//! Every mutation follows the same two-phase contract:
//!
//! 1. **Local** (synchronous to the caller): the optimistic value is written
//!    to the mirror with `pending_sync = true` and the operation is appended
//!    to the outbound queue, both in one local transaction. The caller gets
//!    the optimistic entry back immediately.
//! 2. **Remote** (asynchronous): the coordinator dispatches the operation
//!    later and reconciles the mirror with the server's response.
//!
//! Only local storage failures reach the caller; remote failures surface as
//! pending state and eviction notices.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info};

use healthbuddy_core::domain::{
    newtypes::{EntityId, LogicalPath},
    DispatchOutcome, EntityPayload, MirrorEntry, NewOperation, SyncError,
};
use healthbuddy_core::ports::{
    EntryFilter, ILocalStore, IMirrorStore, IOutboundQueue, IRemoteDispatcher,
};

use crate::connectivity::ConnectivityMonitor;
use crate::coordinator::DrainTrigger;
use crate::scheduler::DrainHandle;

/// Buffered mirror changes per subscriber
const CHANGE_CAPACITY: usize = 256;

// ============================================================================
// ChangeFeed
// ============================================================================

/// Broadcast of mirror entries as they are written or reconciled
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<MirrorEntry>,
}

impl ChangeFeed {
    /// Creates a feed with no subscribers
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANGE_CAPACITY);
        Self { tx }
    }

    /// Subscribes to subsequent changes
    pub fn subscribe(&self) -> broadcast::Receiver<MirrorEntry> {
        self.tx.subscribe()
    }

    /// Publishes a changed entry; a feed without subscribers drops it
    pub fn publish(&self, entry: MirrorEntry) {
        let _ = self.tx.send(entry);
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SyncClient
// ============================================================================

/// Read-your-writes API over the mirror and the outbound queue
pub struct SyncClient {
    store: Arc<dyn ILocalStore>,
    dispatcher: Arc<dyn IRemoteDispatcher>,
    connectivity: ConnectivityMonitor,
    changes: ChangeFeed,
    drain: Option<DrainHandle>,
}

impl SyncClient {
    /// Creates a client; without a drain handle, enqueues do not nudge the
    /// scheduler and mutations wait for the next connectivity or timer event
    pub fn new(
        store: Arc<dyn ILocalStore>,
        dispatcher: Arc<dyn IRemoteDispatcher>,
        connectivity: ConnectivityMonitor,
        changes: ChangeFeed,
    ) -> Self {
        Self {
            store,
            dispatcher,
            connectivity,
            changes,
            drain: None,
        }
    }

    /// Attaches the scheduler handle used to request a drain after enqueue
    pub fn with_drain_handle(mut self, handle: DrainHandle) -> Self {
        self.drain = Some(handle);
        self
    }

    /// Records a mutation: optimistic mirror write plus enqueue
    ///
    /// `value` is the full optimistic value of `operation.entity_id`; the
    /// operation's payload is what the remote receives.
    ///
    /// # Errors
    ///
    /// `SyncError::LocalStorageFailure` if the local transaction failed; in
    /// that case neither the mirror nor the queue changed.
    pub async fn record(
        &self,
        value: &EntityPayload,
        operation: NewOperation,
    ) -> Result<MirrorEntry, SyncError> {
        let (entry, queue_id) = self
            .store
            .record_mutation(&operation.entity_id, value, &operation)
            .await
            .map_err(SyncError::local)?;

        info!(
            %queue_id,
            entity_id = %operation.entity_id,
            method = %operation.method,
            target = %operation.target,
            "Mutation recorded"
        );

        self.changes.publish(entry.clone());
        self.nudge();
        Ok(entry)
    }

    /// Writes a value locally without queueing anything (drafts)
    ///
    /// An entry that is already pending stays pending.
    pub async fn save_local(
        &self,
        entity_id: &EntityId,
        value: &EntityPayload,
    ) -> Result<MirrorEntry, SyncError> {
        let pending = self
            .get(entity_id)
            .await?
            .is_some_and(|entry| entry.pending_sync());

        let entry = self
            .store
            .put(entity_id, value, pending)
            .await
            .map_err(SyncError::local)?;

        debug!(%entity_id, "Saved local value");
        self.changes.publish(entry.clone());
        Ok(entry)
    }

    /// Returns the latest locally known value; never touches the network
    pub async fn get(&self, entity_id: &EntityId) -> Result<Option<MirrorEntry>, SyncError> {
        self.store.get(entity_id).await.map_err(SyncError::local)
    }

    /// Lists mirror entries, newest first
    pub async fn list(&self, filter: &EntryFilter) -> Result<Vec<MirrorEntry>, SyncError> {
        self.store.list(filter).await.map_err(SyncError::local)
    }

    /// Deletes a local entry; returns true if it existed
    pub async fn delete(&self, entity_id: &EntityId) -> Result<bool, SyncError> {
        self.store.delete(entity_id).await.map_err(SyncError::local)
    }

    /// Number of operations waiting in the outbound queue
    pub async fn pending_count(&self) -> Result<u64, SyncError> {
        self.store.pending_count().await.map_err(SyncError::local)
    }

    /// Subscribes to mirror changes (local writes and reconciliations)
    pub fn subscribe(&self) -> broadcast::Receiver<MirrorEntry> {
        self.changes.subscribe()
    }

    /// Opportunistically refreshes an entry from the remote
    ///
    /// Only runs while online and never overwrites an entry with pending
    /// local changes. Remote failures are logged and the local value is
    /// returned unchanged.
    pub async fn refresh(
        &self,
        entity_id: &EntityId,
        target: &LogicalPath,
    ) -> Result<Option<MirrorEntry>, SyncError> {
        if !self.connectivity.is_online() {
            debug!(%entity_id, "Offline, skipping refresh");
            return self.get(entity_id).await;
        }

        match self.dispatcher.fetch(target).await {
            DispatchOutcome::Success(server_value) => {
                let written = self
                    .store
                    .refresh(entity_id, &server_value)
                    .await
                    .map_err(SyncError::local)?;
                let entry = self.get(entity_id).await?;
                if written {
                    debug!(%entity_id, "Refreshed from remote");
                    if let Some(entry) = &entry {
                        self.changes.publish(entry.clone());
                    }
                }
                Ok(entry)
            }
            failure => {
                debug!(
                    %entity_id,
                    %target,
                    error = failure.error_message().unwrap_or_default(),
                    "Refresh failed, keeping local value"
                );
                self.get(entity_id).await
            }
        }
    }

    fn nudge(&self) {
        if !self.connectivity.is_online() {
            return;
        }
        if let Some(handle) = &self.drain {
            handle.request(DrainTrigger::Enqueue);
        }
    }
}
