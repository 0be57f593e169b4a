//! Engine wiring
//!
//! [`SyncEngine`] assembles the connectivity monitor, coordinator,
//! scheduler and client around a local store and a remote dispatcher, and
//! hands out the domain services.
//!
//! ```rust,ignore
//! let mut engine = SyncEngine::new(store, dispatcher, connectivity, clock, &config.sync, shutdown);
//! if let Some(scheduler) = engine.take_scheduler() {
//!     tokio::spawn(scheduler.run());
//! }
//!
//! engine.meals().create_manual_meal(Utc::now(), items).await?;
//! ```

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use healthbuddy_core::config::SyncConfig;
use healthbuddy_core::ports::{EvictionNotice, IClock, ILocalStore, IRemoteDispatcher, Notification};

use crate::backoff::RetryPolicy;
use crate::client::{ChangeFeed, SyncClient};
use crate::connectivity::ConnectivityMonitor;
use crate::coordinator::SyncCoordinator;
use crate::notify::BroadcastNotifier;
use crate::scheduler::SyncScheduler;
use crate::services::{BiometricsService, GoalsService, HydrationService, MealService, ProfileService};

/// A fully wired sync engine
pub struct SyncEngine {
    client: Arc<SyncClient>,
    coordinator: Arc<SyncCoordinator>,
    connectivity: ConnectivityMonitor,
    notifier: Arc<BroadcastNotifier>,
    scheduler: Option<SyncScheduler>,
}

impl SyncEngine {
    /// Wires the engine; the scheduler is created but not started
    pub fn new(
        store: Arc<dyn ILocalStore>,
        dispatcher: Arc<dyn IRemoteDispatcher>,
        connectivity: ConnectivityMonitor,
        clock: Arc<dyn IClock>,
        config: &SyncConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let notifier = Arc::new(BroadcastNotifier::new());
        let changes = ChangeFeed::new();

        let coordinator = Arc::new(
            SyncCoordinator::new(
                store.clone(),
                dispatcher.clone(),
                notifier.clone(),
                clock,
                connectivity.clone(),
                RetryPolicy::from(config),
            )
            .with_change_feed(changes.clone()),
        );

        let (scheduler, handle) = SyncScheduler::new(
            coordinator.clone(),
            &connectivity,
            config.periodic_interval(),
            shutdown,
        );

        let client = Arc::new(
            SyncClient::new(store, dispatcher, connectivity.clone(), changes)
                .with_drain_handle(handle),
        );

        Self {
            client,
            coordinator,
            connectivity,
            notifier,
            scheduler: Some(scheduler),
        }
    }

    /// Takes the scheduler so the host can spawn it; `None` once taken
    pub fn take_scheduler(&mut self) -> Option<SyncScheduler> {
        self.scheduler.take()
    }

    pub fn client(&self) -> &Arc<SyncClient> {
        &self.client
    }

    pub fn coordinator(&self) -> &Arc<SyncCoordinator> {
        &self.coordinator
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    /// Subscribes to user-facing notifications
    pub fn notifications(&self) -> broadcast::Receiver<Notification> {
        self.notifier.subscribe()
    }

    /// Subscribes to eviction notices
    pub fn evictions(&self) -> broadcast::Receiver<EvictionNotice> {
        self.notifier.subscribe_evictions()
    }

    pub fn profile(&self) -> ProfileService {
        ProfileService::new(self.client.clone())
    }

    pub fn goals(&self) -> GoalsService {
        GoalsService::new(self.client.clone())
    }

    pub fn meals(&self) -> MealService {
        MealService::new(self.client.clone())
    }

    pub fn hydration(&self) -> HydrationService {
        HydrationService::new(self.client.clone())
    }

    pub fn biometrics(&self) -> BiometricsService {
        BiometricsService::new(self.client.clone())
    }
}
