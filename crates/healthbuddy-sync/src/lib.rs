//! HealthBuddy Sync - Offline-first mutation sync
//!
//! Provides:
//! - The connectivity monitor fed by the host platform
//! - The sync coordinator draining the outbound queue in order
//! - A scheduler turning connectivity, timer and enqueue events into drains
//! - The engine client used by domain services (optimistic local writes)
//! - Domain services for profile, goals, meals, hydration and biometrics
//!
//! ## Modules
//!
//! - [`backoff`] - retry cap and exponential backoff curve
//! - [`connectivity`] - online/offline state with change subscription
//! - [`coordinator`] - drain state machine (`Idle`, `Draining`, `Backoff`)
//! - [`scheduler`] - event loop driving the coordinator
//! - [`client`] - read-your-writes API over the mirror and queue
//! - [`notify`] - broadcast notification service
//! - [`engine`] - wiring of all of the above
//! - [`services`] - domain services

pub mod backoff;
pub mod client;
pub mod connectivity;
pub mod coordinator;
pub mod engine;
pub mod notify;
pub mod scheduler;
pub mod services;

pub use backoff::RetryPolicy;
pub use client::SyncClient;
pub use connectivity::ConnectivityMonitor;
pub use coordinator::{DrainOutcome, DrainReport, DrainTrigger, SyncCoordinator, SyncStatus};
pub use engine::SyncEngine;
pub use notify::BroadcastNotifier;
pub use scheduler::{DrainHandle, SyncScheduler};
