//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the sync core depends
//! on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IMirrorStore`] - Durable latest-value store per entity
//! - [`IOutboundQueue`] - Durable FIFO of pending mutations
//! - [`ILocalStore`] - Both of the above plus the coupled transactional writes
//! - [`IRemoteDispatcher`] - Executes queued operations against the remote
//! - [`INotificationService`] - User-facing eviction alerts
//! - [`IClock`] - Injectable time source for backoff scheduling

pub mod clock;
pub mod dispatcher;
pub mod local_store;
pub mod notification;

pub use clock::{IClock, ManualClock, SystemClock};
pub use dispatcher::IRemoteDispatcher;
pub use local_store::{EntryFilter, ILocalStore, IMirrorStore, IOutboundQueue};
pub use notification::{
    EvictionNotice, EvictionReason, INotificationService, Notification, NotificationPriority,
};
