//! Sync scheduler - turns events into drain cycles
//!
//! The [`SyncScheduler`] owns the only task that calls
//! [`SyncCoordinator::drain`] automatically. It waits on five sources:
//!
//! ```text
//! ConnectivityMonitor ──(offline → online)──┐
//! periodic interval ─────────────────────────┤
//! backoff deadline ──────────────────────────┼──→ SyncScheduler ──→ coordinator.drain()
//! DrainHandle (enqueue / "sync now") ────────┘          │
//! CancellationToken ─────────────────────────────→ shutdown
//! ```
//!
//! A cycle that stops on a transient failure leaves a backoff deadline; the
//! scheduler sleeps until it and then retries, independent of the periodic
//! interval.
//!
//! Requests arriving while a cycle runs collapse into at most one follow-up
//! cycle: the request channel holds a single slot. Operations enqueued
//! mid-cycle are not in that cycle's snapshot, so the follow-up picks them
//! up without waiting for the next tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use healthbuddy_core::domain::ConnectivityState;

use crate::connectivity::ConnectivityMonitor;
use crate::coordinator::{DrainOutcome, DrainReport, DrainTrigger, SyncCoordinator};

/// Pending drain requests held while a cycle runs
const REQUEST_SLOTS: usize = 1;

// ============================================================================
// DrainHandle
// ============================================================================

/// Cloneable handle for requesting a drain from outside the scheduler
#[derive(Debug, Clone)]
pub struct DrainHandle {
    tx: mpsc::Sender<DrainTrigger>,
}

impl DrainHandle {
    /// Requests a drain cycle without waiting for it
    ///
    /// Returns false if a request is already pending (it will cover this
    /// one) or the scheduler has stopped.
    pub fn request(&self, trigger: DrainTrigger) -> bool {
        match self.tx.try_send(trigger) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(%trigger, "Drain already requested");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                debug!(%trigger, "Scheduler stopped, drain request dropped");
                false
            }
        }
    }
}

// ============================================================================
// SyncScheduler
// ============================================================================

/// Event loop driving the coordinator
pub struct SyncScheduler {
    coordinator: Arc<SyncCoordinator>,
    connectivity_rx: watch::Receiver<ConnectivityState>,
    request_rx: mpsc::Receiver<DrainTrigger>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl SyncScheduler {
    /// Creates a scheduler and the handle used to request drains
    pub fn new(
        coordinator: Arc<SyncCoordinator>,
        connectivity: &ConnectivityMonitor,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> (Self, DrainHandle) {
        let (tx, request_rx) = mpsc::channel(REQUEST_SLOTS);

        info!(
            interval_secs = interval.as_secs(),
            "Creating sync scheduler"
        );

        let scheduler = Self {
            coordinator,
            connectivity_rx: connectivity.subscribe(),
            request_rx,
            interval,
            shutdown,
        };
        (scheduler, DrainHandle { tx })
    }

    /// Runs until the shutdown token is cancelled
    ///
    /// The first periodic tick fires immediately, so queued operations left
    /// over from a previous run are drained at startup when online.
    pub async fn run(mut self) {
        info!("Sync scheduler starting");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut connectivity_open = true;
        let mut retry_at: Option<Instant> = None;

        loop {
            let report = tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested, scheduler stopping");
                    break;
                }

                _ = ticker.tick() => {
                    drain(&self.coordinator, DrainTrigger::Periodic).await
                }

                _ = sleep_until(retry_at), if retry_at.is_some() => {
                    retry_at = None;
                    drain(&self.coordinator, DrainTrigger::Retry).await
                }

                changed = self.connectivity_rx.changed(), if connectivity_open => {
                    if changed.is_err() {
                        debug!("Connectivity monitor dropped");
                        connectivity_open = false;
                        continue;
                    }
                    let state = *self.connectivity_rx.borrow_and_update();
                    if !state.is_online() {
                        continue;
                    }
                    drain(&self.coordinator, DrainTrigger::Connectivity).await
                }

                Some(trigger) = self.request_rx.recv() => {
                    drain(&self.coordinator, trigger).await
                }
            };

            // A cycle started elsewhere leaves the current deadline in place
            if report.outcome != DrainOutcome::AlreadyDraining {
                retry_at = report
                    .backoff_until()
                    .map(|until| Instant::now() + self.coordinator.time_until(until));
                if let Some(at) = retry_at {
                    debug!(
                        retry_in_ms = at.saturating_duration_since(Instant::now()).as_millis() as u64,
                        "Retry scheduled at backoff deadline"
                    );
                }
            }
        }

        info!("Sync scheduler stopped");
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn drain(coordinator: &SyncCoordinator, trigger: DrainTrigger) -> DrainReport {
    let report = coordinator.drain(trigger).await;
    if !report.evicted.is_empty() {
        warn!(
            %trigger,
            evicted = report.evicted.len(),
            "Operations evicted during drain"
        );
    }
    report
}
