//! Queued operation domain types
//!
//! A queued operation is one intended remote mutation, recorded at the same
//! moment the optimistic value lands in the mirror and kept in the outbound
//! queue until the remote confirms it or the coordinator evicts it.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::{DomainError, SyncError};
use super::mirror::EntityPayload;
use super::newtypes::{EntityId, IdempotencyKey, LogicalPath, QueueId};

// ============================================================================
// OperationMethod
// ============================================================================

/// Kind of mutation an operation applies at the remote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationMethod {
    /// Create a new resource (HTTP POST)
    Create,
    /// Replace a resource (HTTP PUT)
    Update,
    /// Partially modify a resource (HTTP PATCH)
    Patch,
}

impl OperationMethod {
    /// Returns the stable storage label
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationMethod::Create => "CREATE",
            OperationMethod::Update => "UPDATE",
            OperationMethod::Patch => "PATCH",
        }
    }

    /// Returns the HTTP verb this method maps to
    pub fn http_verb(&self) -> &'static str {
        match self {
            OperationMethod::Create => "POST",
            OperationMethod::Update => "PUT",
            OperationMethod::Patch => "PATCH",
        }
    }
}

impl Display for OperationMethod {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationMethod {
    type Err = DomainError;

    /// Accepts both the storage labels and the HTTP verbs
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CREATE" | "POST" => Ok(OperationMethod::Create),
            "UPDATE" | "PUT" => Ok(OperationMethod::Update),
            "PATCH" => Ok(OperationMethod::Patch),
            _ => Err(DomainError::InvalidMethod(s.to_string())),
        }
    }
}

// ============================================================================
// NewOperation
// ============================================================================

/// An operation about to be enqueued (no queue id assigned yet)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOperation {
    /// Mutation kind
    pub method: OperationMethod,
    /// Remote resource path
    pub target: LogicalPath,
    /// Mirror entry reconciled by the remote response
    pub entity_id: EntityId,
    /// Request body
    pub payload: EntityPayload,
    /// Key identifying this mutation across retries
    pub idempotency_key: IdempotencyKey,
}

impl NewOperation {
    /// Creates an operation with a fresh idempotency key
    pub fn new(
        method: OperationMethod,
        target: LogicalPath,
        entity_id: EntityId,
        payload: EntityPayload,
    ) -> Self {
        Self {
            method,
            target,
            entity_id,
            payload,
            idempotency_key: IdempotencyKey::new(),
        }
    }
}

// ============================================================================
// QueuedOperation
// ============================================================================

/// An operation persisted in the outbound queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedOperation {
    queue_id: QueueId,
    method: OperationMethod,
    target: LogicalPath,
    entity_id: EntityId,
    payload: EntityPayload,
    idempotency_key: IdempotencyKey,
    enqueued_at: DateTime<Utc>,
    retry_count: u32,
    last_error: Option<String>,
}

impl QueuedOperation {
    /// Creates a queued operation from a newly enqueued one
    pub fn enqueued(queue_id: QueueId, op: NewOperation, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            queue_id,
            method: op.method,
            target: op.target,
            entity_id: op.entity_id,
            payload: op.payload,
            idempotency_key: op.idempotency_key,
            enqueued_at,
            retry_count: 0,
            last_error: None,
        }
    }

    /// Restores a queued operation read back from storage
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        queue_id: QueueId,
        method: OperationMethod,
        target: LogicalPath,
        entity_id: EntityId,
        payload: EntityPayload,
        idempotency_key: IdempotencyKey,
        enqueued_at: DateTime<Utc>,
        retry_count: u32,
        last_error: Option<String>,
    ) -> Self {
        Self {
            queue_id,
            method,
            target,
            entity_id,
            payload,
            idempotency_key,
            enqueued_at,
            retry_count,
            last_error,
        }
    }

    /// Returns the queue id
    pub fn queue_id(&self) -> QueueId {
        self.queue_id
    }

    /// Returns the mutation kind
    pub fn method(&self) -> OperationMethod {
        self.method
    }

    /// Returns the remote resource path
    pub fn target(&self) -> &LogicalPath {
        &self.target
    }

    /// Returns the mirror entry this operation reconciles
    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    /// Returns the request body
    pub fn payload(&self) -> &EntityPayload {
        &self.payload
    }

    /// Returns the idempotency key
    pub fn idempotency_key(&self) -> IdempotencyKey {
        self.idempotency_key
    }

    /// Returns when the operation was enqueued
    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }

    /// Returns the number of failed attempts so far
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Returns the last recorded failure, if any
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl Display for QueuedOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {} ({})",
            self.queue_id, self.method, self.target, self.entity_id
        )
    }
}

// ============================================================================
// DispatchOutcome
// ============================================================================

/// Classified result of dispatching one operation to the remote
///
/// The dispatcher never returns an error past its boundary; every transport
/// problem is mapped onto one of these three outcomes.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// The remote applied the mutation and returned its canonical value
    Success(EntityPayload),
    /// Retryable failure (network, timeout, 5xx)
    TransientFailure(String),
    /// The remote will never accept this operation as-is (4xx)
    PermanentFailure(String),
}

impl DispatchOutcome {
    /// Returns true for [`DispatchOutcome::Success`]
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Success(_))
    }

    /// Returns the failure message, if any
    pub fn error_message(&self) -> Option<&str> {
        match self {
            DispatchOutcome::Success(_) => None,
            DispatchOutcome::TransientFailure(msg) | DispatchOutcome::PermanentFailure(msg) => {
                Some(msg)
            }
        }
    }

    /// Converts a failure into the matching [`SyncError`] variant
    pub fn to_error(&self) -> Option<SyncError> {
        match self {
            DispatchOutcome::Success(_) => None,
            DispatchOutcome::TransientFailure(msg) => {
                Some(SyncError::TransientRemoteFailure(msg.clone()))
            }
            DispatchOutcome::PermanentFailure(msg) => {
                Some(SyncError::PermanentRemoteFailure(msg.clone()))
            }
        }
    }
}
