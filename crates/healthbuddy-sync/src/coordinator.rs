//! Sync coordinator
//!
//! The [`SyncCoordinator`] drains the outbound queue against the remote and
//! reconciles the mirror with each response.
//!
//! ## State machine
//!
//! ```text
//!            trigger (online)              snapshot done
//!   Idle ─────────────────────→ Draining ─────────────────→ Idle
//!    ↑                             │
//!    │   deadline passed /         │ transient failure
//!    │   manual trigger            ↓
//!    └──────────────────────── Backoff(until)
//! ```
//!
//! ## Cycle rules
//!
//! - One queue snapshot per cycle, dispatched strictly in enqueue order.
//! - Success: the operation is acknowledged (removed and the mirror
//!   reconciled in one local transaction), then the next one is dispatched.
//! - Transient failure: the failure is recorded and the cycle stops so no
//!   later operation passes it. Reaching the retry cap evicts it.
//! - Permanent failure: the operation is evicted after one attempt and the
//!   cycle continues.
//! - Losing connectivity stops the cycle before the next dispatch without
//!   counting a failure.
//!
//! Evicted operations leave their mirror entry `pending_sync = true`; the
//! user is told through the notification service.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use healthbuddy_core::domain::{
    ConnectivityState, CoordinatorState, DispatchOutcome, QueuedOperation, SyncIndicator,
    SyncSessionState,
};
use healthbuddy_core::ports::{
    EvictionNotice, EvictionReason, IClock, ILocalStore, IMirrorStore, INotificationService,
    IOutboundQueue, IRemoteDispatcher,
};

use crate::backoff::RetryPolicy;
use crate::client::ChangeFeed;
use crate::connectivity::ConnectivityMonitor;

// ============================================================================
// Triggers and reports
// ============================================================================

/// What asked for a drain cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainTrigger {
    /// Connectivity went from offline to online
    Connectivity,
    /// The periodic timer fired
    Periodic,
    /// A mutation was enqueued while online
    Enqueue,
    /// The user asked to sync now; bypasses an active backoff window
    Manual,
    /// The backoff window set by a failed cycle expired
    Retry,
}

impl DrainTrigger {
    /// Returns true for triggers that ignore an active backoff window
    pub fn bypasses_backoff(&self) -> bool {
        matches!(self, DrainTrigger::Manual | DrainTrigger::Retry)
    }
}

impl std::fmt::Display for DrainTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DrainTrigger::Connectivity => "connectivity",
            DrainTrigger::Periodic => "periodic",
            DrainTrigger::Enqueue => "enqueue",
            DrainTrigger::Manual => "manual",
            DrainTrigger::Retry => "retry",
        };
        f.write_str(s)
    }
}

/// How a drain request ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum DrainOutcome {
    /// The whole snapshot was processed
    Completed,
    /// Not started: a cycle is already running
    AlreadyDraining,
    /// Not started: no connectivity
    Offline,
    /// Not started: automatic trigger inside the backoff window
    BackingOff { until: DateTime<Utc> },
    /// Stopped on a transient failure; automatic triggers wait until `until`
    BackedOff { until: DateTime<Utc> },
    /// Stopped because connectivity was lost
    ConnectivityLost,
    /// Stopped because the local store failed
    StorageFailure { message: String },
}

impl DrainOutcome {
    /// Returns true if a cycle actually ran
    pub fn started(&self) -> bool {
        !matches!(
            self,
            DrainOutcome::AlreadyDraining | DrainOutcome::Offline | DrainOutcome::BackingOff { .. }
        )
    }
}

/// Summary of one drain request
#[derive(Debug, Clone, Serialize)]
pub struct DrainReport {
    /// What asked for the cycle
    pub trigger: DrainTrigger,
    /// How it ended
    pub outcome: DrainOutcome,
    /// Operations handed to the dispatcher
    pub attempted: u32,
    /// Operations acknowledged by the remote
    pub succeeded: u32,
    /// Operations evicted during the cycle
    pub evicted: Vec<EvictionNotice>,
}

impl DrainReport {
    fn new(trigger: DrainTrigger, outcome: DrainOutcome) -> Self {
        Self {
            trigger,
            outcome,
            attempted: 0,
            succeeded: 0,
            evicted: Vec::new(),
        }
    }

    /// Backoff deadline set by this cycle, if any
    pub fn backoff_until(&self) -> Option<DateTime<Utc>> {
        match self.outcome {
            DrainOutcome::BackedOff { until } | DrainOutcome::BackingOff { until } => Some(until),
            _ => None,
        }
    }
}

/// Point-in-time view of the sync engine for status displays
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub connectivity: ConnectivityState,
    pub session: SyncSessionState,
    pub pending_count: u64,
    pub backoff_until: Option<DateTime<Utc>>,
    pub indicator: SyncIndicator,
}

// ============================================================================
// SyncCoordinator
// ============================================================================

/// Drains the outbound queue; at most one cycle runs at a time
pub struct SyncCoordinator {
    store: Arc<dyn ILocalStore>,
    dispatcher: Arc<dyn IRemoteDispatcher>,
    notifier: Arc<dyn INotificationService>,
    clock: Arc<dyn IClock>,
    connectivity: ConnectivityMonitor,
    policy: RetryPolicy,
    changes: ChangeFeed,
    state: Mutex<CoordinatorState>,
    session_tx: watch::Sender<SyncSessionState>,
}

impl SyncCoordinator {
    /// Creates an idle coordinator
    pub fn new(
        store: Arc<dyn ILocalStore>,
        dispatcher: Arc<dyn IRemoteDispatcher>,
        notifier: Arc<dyn INotificationService>,
        clock: Arc<dyn IClock>,
        connectivity: ConnectivityMonitor,
        policy: RetryPolicy,
    ) -> Self {
        let (session_tx, _) = watch::channel(SyncSessionState::Idle);
        Self {
            store,
            dispatcher,
            notifier,
            clock,
            connectivity,
            policy,
            changes: ChangeFeed::new(),
            state: Mutex::new(CoordinatorState::Idle),
            session_tx,
        }
    }

    /// Publishes reconciled entries on `changes`
    pub fn with_change_feed(mut self, changes: ChangeFeed) -> Self {
        self.changes = changes;
        self
    }

    /// Returns the retry policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns the current state
    pub fn state(&self) -> CoordinatorState {
        *self.lock_state()
    }

    /// Watches the session state ("is syncing")
    pub fn subscribe_session(&self) -> watch::Receiver<SyncSessionState> {
        self.session_tx.subscribe()
    }

    /// Returns a status snapshot
    pub async fn status(&self) -> anyhow::Result<SyncStatus> {
        let pending_count = self.store.pending_count().await?;
        let state = self.state();
        let connectivity = self.connectivity.current();
        let session = state.session();

        Ok(SyncStatus {
            connectivity,
            session,
            pending_count,
            backoff_until: state.backoff_until(self.clock.now()),
            indicator: SyncIndicator::derive(connectivity, session, pending_count),
        })
    }

    /// Runs one drain cycle if the state machine allows it
    ///
    /// Concurrent requests collapse: while a cycle runs every other request
    /// returns [`DrainOutcome::AlreadyDraining`] without side effects.
    pub async fn drain(&self, trigger: DrainTrigger) -> DrainReport {
        if let Err(outcome) = self.begin(trigger) {
            debug!(%trigger, ?outcome, "Drain not started");
            return DrainReport::new(trigger, outcome);
        }

        info!(%trigger, "Drain cycle starting");
        let mut guard = DrainGuard::new(self);
        let mut report = DrainReport::new(trigger, DrainOutcome::Completed);

        self.run_cycle(&mut report).await;

        if let DrainOutcome::BackedOff { until } = report.outcome {
            guard.finish(CoordinatorState::Backoff { until });
        }
        drop(guard);

        info!(
            %trigger,
            outcome = ?report.outcome,
            attempted = report.attempted,
            succeeded = report.succeeded,
            evicted = report.evicted.len(),
            "Drain cycle finished"
        );
        report
    }

    /// Time left until `deadline` by the coordinator's clock; zero once passed
    pub fn time_until(&self, deadline: DateTime<Utc>) -> Duration {
        (deadline - self.clock.now()).to_std().unwrap_or(Duration::ZERO)
    }

    /// Checks the state machine and moves to `Draining`
    fn begin(&self, trigger: DrainTrigger) -> Result<(), DrainOutcome> {
        let mut state = self.lock_state();

        if matches!(*state, CoordinatorState::Draining) {
            return Err(DrainOutcome::AlreadyDraining);
        }
        if !self.connectivity.is_online() {
            return Err(DrainOutcome::Offline);
        }
        if !trigger.bypasses_backoff() {
            if let Some(until) = state.backoff_until(self.clock.now()) {
                return Err(DrainOutcome::BackingOff { until });
            }
        }

        *state = CoordinatorState::Draining;
        drop(state);
        self.session_tx.send_replace(SyncSessionState::Draining);
        Ok(())
    }

    async fn run_cycle(&self, report: &mut DrainReport) {
        let snapshot = match self.store.peek_ordered().await {
            Ok(ops) => ops,
            Err(e) => {
                error!(error = %e, "Failed to read outbound queue");
                report.outcome = DrainOutcome::StorageFailure {
                    message: format!("{e:#}"),
                };
                return;
            }
        };
        debug!(operations = snapshot.len(), "Queue snapshot taken");

        for queued in snapshot {
            if !self.connectivity.is_online() {
                info!(queue_id = %queued.queue_id(), "Connectivity lost, stopping drain");
                report.outcome = DrainOutcome::ConnectivityLost;
                return;
            }

            // Earlier acknowledgements may have rebound the target or removed the operation
            let operation = match self.store.get_operation(queued.queue_id()).await {
                Ok(Some(operation)) => operation,
                Ok(None) => {
                    debug!(queue_id = %queued.queue_id(), "Operation already removed");
                    continue;
                }
                Err(e) => {
                    report.outcome = storage_failure(&queued, e);
                    return;
                }
            };

            report.attempted += 1;
            let outcome = self.dispatcher.dispatch(&operation).await;

            let step = match outcome {
                DispatchOutcome::Success(server_value) => {
                    self.on_success(&operation, &server_value, report).await
                }
                DispatchOutcome::TransientFailure(message) => {
                    self.on_transient(&operation, &message, report).await
                }
                DispatchOutcome::PermanentFailure(message) => {
                    self.on_permanent(&operation, &message, report).await
                }
            };

            if let Err(outcome) = step {
                report.outcome = outcome;
                return;
            }
        }
    }

    async fn on_success(
        &self,
        operation: &QueuedOperation,
        server_value: &serde_json::Value,
        report: &mut DrainReport,
    ) -> Result<(), DrainOutcome> {
        let acknowledged = self
            .store
            .acknowledge(operation.queue_id(), operation.entity_id(), server_value)
            .await
            .map_err(|e| storage_failure(operation, e))?;

        if acknowledged {
            report.succeeded += 1;
            debug!(
                queue_id = %operation.queue_id(),
                entity_id = %operation.entity_id(),
                "Operation acknowledged"
            );
            self.publish_entry(operation).await;
        } else {
            // Removed concurrently (queue cleared); nothing left to reconcile
            debug!(queue_id = %operation.queue_id(), "Operation already removed");
        }
        Ok(())
    }

    async fn on_transient(
        &self,
        operation: &QueuedOperation,
        message: &str,
        report: &mut DrainReport,
    ) -> Result<(), DrainOutcome> {
        // A failure caused by going offline does not count against the cap
        if !self.connectivity.is_online() {
            info!(queue_id = %operation.queue_id(), "Dispatch failed after connectivity loss");
            return Err(DrainOutcome::ConnectivityLost);
        }

        let Some(retry_count) = self
            .store
            .record_failure(operation.queue_id(), message)
            .await
            .map_err(|e| storage_failure(operation, e))?
        else {
            debug!(queue_id = %operation.queue_id(), "Operation already removed");
            return Ok(());
        };

        warn!(
            queue_id = %operation.queue_id(),
            target = %operation.target(),
            retry_count,
            error = message,
            "Transient failure"
        );

        if self.policy.is_exhausted(retry_count) {
            self.evict(
                operation,
                EvictionReason::RetryCapReached,
                retry_count,
                message,
                report,
            )
            .await?;
        }

        let delay = self.policy.delay(retry_count);
        let until = self.clock.now()
            + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::seconds(1));
        info!(retry_count, %until, "Entering backoff");
        Err(DrainOutcome::BackedOff { until })
    }

    async fn on_permanent(
        &self,
        operation: &QueuedOperation,
        message: &str,
        report: &mut DrainReport,
    ) -> Result<(), DrainOutcome> {
        let retry_count = self
            .store
            .record_failure(operation.queue_id(), message)
            .await
            .map_err(|e| storage_failure(operation, e))?
            .unwrap_or(operation.retry_count() + 1);

        self.evict(operation, EvictionReason::Rejected, retry_count, message, report)
            .await
    }

    async fn evict(
        &self,
        operation: &QueuedOperation,
        reason: EvictionReason,
        retry_count: u32,
        message: &str,
        report: &mut DrainReport,
    ) -> Result<(), DrainOutcome> {
        self.store
            .remove(operation.queue_id())
            .await
            .map_err(|e| storage_failure(operation, e))?;

        let notice = EvictionNotice::new(operation, reason, retry_count, message, self.clock.now());
        error!(
            queue_id = %operation.queue_id(),
            entity_id = %operation.entity_id(),
            target = %operation.target(),
            retry_count,
            %reason,
            error = message,
            "Operation evicted, change not applied remotely"
        );

        if let Err(e) = self.notifier.notify_eviction(&notice).await {
            warn!(error = %e, "Failed to deliver eviction notice");
        }
        report.evicted.push(notice);
        Ok(())
    }

    async fn publish_entry(&self, operation: &QueuedOperation) {
        match self.store.get(operation.entity_id()).await {
            Ok(Some(entry)) => self.changes.publish(entry),
            Ok(None) => {}
            Err(e) => debug!(entity_id = %operation.entity_id(), error = %e, "Mirror read failed"),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CoordinatorState> {
        // The guarded value is a plain enum; a poisoned lock still holds a valid state
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, next: CoordinatorState) {
        *self.lock_state() = next;
        self.session_tx.send_replace(next.session());
    }
}

fn storage_failure(operation: &QueuedOperation, err: anyhow::Error) -> DrainOutcome {
    error!(queue_id = %operation.queue_id(), error = %err, "Local store failed during drain");
    DrainOutcome::StorageFailure {
        message: format!("{err:#}"),
    }
}

/// Leaves `Draining` when dropped, even if the cycle future is cancelled
struct DrainGuard<'a> {
    coordinator: &'a SyncCoordinator,
    next: CoordinatorState,
}

impl<'a> DrainGuard<'a> {
    fn new(coordinator: &'a SyncCoordinator) -> Self {
        Self {
            coordinator,
            next: CoordinatorState::Idle,
        }
    }

    fn finish(&mut self, next: CoordinatorState) {
        self.next = next;
    }
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.coordinator.set_state(self.next);
    }
}
