//! Reachability check
//!
//! Hosts without a platform connectivity signal poll `GET /health` and feed
//! the result into the [`ConnectivityMonitor`]. Any failure, including a
//! timeout or an error status, counts as offline.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use healthbuddy_core::domain::ConnectivityState;
use healthbuddy_remote::ApiClient;
use healthbuddy_sync::ConnectivityMonitor;

/// Polls the remote health endpoint and reports connectivity
#[derive(Clone)]
pub struct ReachabilityCheck {
    client: ApiClient,
    monitor: ConnectivityMonitor,
}

impl ReachabilityCheck {
    pub fn new(client: ApiClient, monitor: ConnectivityMonitor) -> Self {
        Self { client, monitor }
    }

    /// Checks once and updates the monitor
    pub async fn check(&self) -> ConnectivityState {
        let state = match self.client.health().await {
            Ok(()) => ConnectivityState::Online,
            Err(e) => {
                debug!(base_url = self.client.base_url(), error = %e, "Health check failed");
                ConnectivityState::Offline
            }
        };
        self.monitor.set(state);
        state
    }

    /// Checks every `interval` until `shutdown` is cancelled
    pub async fn run(self, interval: Duration, shutdown: CancellationToken) {
        info!(interval_secs = interval.as_secs(), "Reachability check starting");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.check().await;
                }
            }
        }

        info!("Reachability check stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn check_for(server: &MockServer) -> (ReachabilityCheck, ConnectivityMonitor) {
        let client = ApiClient::new(server.uri(), Duration::from_secs(2)).unwrap();
        let monitor = ConnectivityMonitor::new(ConnectivityState::Offline);
        (ReachabilityCheck::new(client, monitor.clone()), monitor)
    }

    #[tokio::test]
    async fn test_healthy_remote_is_online() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let (check, monitor) = check_for(&server).await;
        assert_eq!(check.check().await, ConnectivityState::Online);
        assert!(monitor.is_online());
    }

    #[tokio::test]
    async fn test_error_status_is_offline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let (check, monitor) = check_for(&server).await;
        monitor.set(ConnectivityState::Online);
        assert_eq!(check.check().await, ConnectivityState::Offline);
        assert!(!monitor.is_online());
    }
}
