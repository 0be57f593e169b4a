//! CLI subcommands and the wiring they share

pub mod config;
pub mod mirror;
pub mod queue;
pub mod run;
pub mod status;
pub mod sync;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use healthbuddy_cache::{DatabasePool, SqliteLocalStore};
use healthbuddy_core::config::Config;
use healthbuddy_core::domain::ConnectivityState;
use healthbuddy_core::ports::SystemClock;
use healthbuddy_remote::{ApiClient, HttpDispatcher};
use healthbuddy_sync::{ConnectivityMonitor, SyncEngine};

use crate::reachability::ReachabilityCheck;

/// Configuration resolved from `--config` or the default location
#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: Config,
    pub config_path: PathBuf,
}

impl AppContext {
    /// Loads the configuration; a missing or unreadable file yields defaults
    pub fn load(config_override: Option<&Path>) -> Self {
        let config_path = config_override
            .map(Path::to_path_buf)
            .unwrap_or_else(Config::default_path);
        let config = Config::load_or_default(&config_path);
        Self {
            config,
            config_path,
        }
    }

    /// Opens (creating if needed) the local database
    pub async fn open_store(&self) -> Result<(DatabasePool, Arc<SqliteLocalStore>)> {
        let db_path = &self.config.storage.database_path;
        let pool = DatabasePool::new(db_path)
            .await
            .with_context(|| format!("Failed to open database at {}", db_path.display()))?;
        let store = Arc::new(SqliteLocalStore::new(pool.pool().clone()));
        info!(db_path = %db_path.display(), "Opened local store");
        Ok((pool, store))
    }

    /// Creates the API client for the configured remote
    pub fn api_client(&self) -> Result<ApiClient> {
        ApiClient::from_config(&self.config.remote).context("Invalid remote configuration")
    }

    /// Opens the store, checks the remote once and wires an engine
    pub async fn engine(&self, shutdown: CancellationToken) -> Result<EngineParts> {
        let (pool, store) = self.open_store().await?;
        let client = self.api_client()?;

        let connectivity = ConnectivityMonitor::new(ConnectivityState::Offline);
        let reachability = ReachabilityCheck::new(client.clone(), connectivity.clone());
        reachability.check().await;

        let engine = SyncEngine::new(
            store.clone(),
            Arc::new(HttpDispatcher::new(client)),
            connectivity,
            Arc::new(SystemClock),
            &self.config.sync,
            shutdown,
        );

        Ok(EngineParts {
            pool,
            store,
            engine,
            reachability,
        })
    }
}

/// Everything a command needs to talk to the engine
pub struct EngineParts {
    pub pool: DatabasePool,
    pub store: Arc<SqliteLocalStore>,
    pub engine: SyncEngine,
    pub reachability: ReachabilityCheck,
}
