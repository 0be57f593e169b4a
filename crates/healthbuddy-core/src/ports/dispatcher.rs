//! Remote operation dispatcher port (driven/secondary port)
//!
//! The dispatcher turns a queued operation into a concrete remote call.
//! Its transport details are owned by the adapter; the core only relies on
//! the classification contract below.
//!
//! ## Contract
//!
//! - Every call resolves to exactly one [`DispatchOutcome`] and never
//!   returns an error: transport errors are classified before they reach
//!   the coordinator.
//! - Every call is bounded by a timeout owned by the adapter; a timeout is
//!   a `TransientFailure`.

use crate::domain::{newtypes::LogicalPath, DispatchOutcome, QueuedOperation};

/// Port trait for executing queued operations against the remote authority
#[async_trait::async_trait]
pub trait IRemoteDispatcher: Send + Sync {
    /// Performs the remote call for `operation`
    ///
    /// The operation's idempotency key must accompany every attempt.
    async fn dispatch(&self, operation: &QueuedOperation) -> DispatchOutcome;

    /// Reads the remote's current value at `target`
    ///
    /// Used for opportunistic refreshes of the mirror while online.
    async fn fetch(&self, target: &LogicalPath) -> DispatchOutcome;
}
