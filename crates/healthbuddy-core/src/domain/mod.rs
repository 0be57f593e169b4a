//! Domain entities and business logic
//!
//! This module contains the core domain types for the sync engine:
//! - Newtypes for entity identifiers, logical paths and queue ids
//! - Mirror entries (latest known entity state)
//! - Queued operations (the outbound log)
//! - Connectivity, session and coordinator states
//! - Domain-specific error types

pub mod connectivity;
pub mod errors;
pub mod mirror;
pub mod newtypes;
pub mod operation;
pub mod state;

// Re-export commonly used types
pub use connectivity::ConnectivityState;
pub use errors::{DomainError, SyncError};
pub use mirror::{EntityPayload, MirrorEntry};
pub use newtypes::*;
pub use operation::{DispatchOutcome, NewOperation, OperationMethod, QueuedOperation};
pub use state::{CoordinatorState, SyncIndicator, SyncSessionState};
