//! HealthBuddy Core - Domain logic and port definitions
//!
//! This crate contains the hexagonal architecture core of the offline
//! mutation-sync engine:
//! - **Domain types** - `MirrorEntry`, `QueuedOperation`, `ConnectivityState`,
//!   coordinator and session states, the `SyncError` taxonomy
//! - **Port definitions** - Traits for adapters: `IMirrorStore`, `IOutboundQueue`,
//!   `ILocalStore`, `IRemoteDispatcher`, `INotificationService`, `IClock`
//! - **Configuration** - YAML-backed settings for storage, remote, sync and logging
//!
//! # Architecture
//!
//! The domain module holds plain data with no I/O. Ports define the trait
//! interfaces that the storage (`healthbuddy-cache`) and transport
//! (`healthbuddy-remote`) adapters implement, and that the coordinator in
//! `healthbuddy-sync` depends on.

pub mod config;
pub mod domain;
pub mod ports;
