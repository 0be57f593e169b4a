//! Domain error types
//!
//! This module defines error types specific to domain operations
//! (validation of identifiers and paths) and the sync error taxonomy
//! surfaced to domain services and the user-facing layer.

use thiserror::Error;

use super::newtypes::QueueId;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid entity identifier
    #[error("Invalid entity id: {0}")]
    InvalidEntityId(String),

    /// Invalid logical path format
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Unknown operation method
    #[error("Invalid operation method: {0}")]
    InvalidMethod(String),

    /// Invalid connectivity or state label
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// ID parsing error
    #[error("Invalid ID format: {0}")]
    InvalidId(String),
}

/// Sync error taxonomy
///
/// Only [`SyncError::LocalStorageFailure`] and [`SyncError::Domain`] are ever
/// returned synchronously to a domain service. The remote variants describe
/// what the coordinator observed and are carried by eviction notices; raw
/// transport errors never leave the coordinator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Mirror or queue I/O failed; the mutation was not queued
    #[error("Local storage failure: {0}")]
    LocalStorageFailure(String),

    /// Network error, 5xx or timeout; retried with backoff
    #[error("Transient remote failure: {0}")]
    TransientRemoteFailure(String),

    /// The remote rejected the operation (4xx); evicted without retry
    #[error("Permanent remote failure: {0}")]
    PermanentRemoteFailure(String),

    /// Retry cap exceeded on a transient failure; evicted
    #[error("Operation {queue_id} evicted after {retry_count} failed attempts: {last_error}")]
    QueuePoisoned {
        /// Queue id of the evicted operation
        queue_id: QueueId,
        /// Attempts made before eviction
        retry_count: u32,
        /// Last recorded failure
        last_error: String,
    },

    /// Invalid input detected before anything was written
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl SyncError {
    /// Wraps an adapter error as a local storage failure
    pub fn local(err: anyhow::Error) -> Self {
        SyncError::LocalStorageFailure(format!("{err:#}"))
    }

    /// Returns true for failures caused by the local store
    pub fn is_local(&self) -> bool {
        matches!(self, SyncError::LocalStorageFailure(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::InvalidPath("profile".to_string());
        assert_eq!(err.to_string(), "Invalid path: profile");

        let err = SyncError::QueuePoisoned {
            queue_id: QueueId::new(7),
            retry_count: 3,
            last_error: "timeout".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Operation 7 evicted after 3 failed attempts: timeout"
        );
    }

    #[test]
    fn test_local_wraps_context_chain() {
        let err = anyhow::anyhow!("disk I/O error").context("Failed to enqueue operation");
        let sync_err = SyncError::local(err);
        assert!(sync_err.is_local());
        assert_eq!(
            sync_err.to_string(),
            "Local storage failure: Failed to enqueue operation: disk I/O error"
        );
    }

    #[test]
    fn test_domain_error_converts() {
        let err: SyncError = DomainError::InvalidEntityId(String::new()).into();
        assert!(!err.is_local());
        assert_eq!(err.to_string(), "Invalid entity id: ");
    }
}
