//! Shared test helpers for API integration tests
//!
//! Each helper returns a dispatcher pointing at a fresh wiremock server.

use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use wiremock::MockServer;

use healthbuddy_core::domain::{
    newtypes::{EntityId, EntityKind, LogicalPath, QueueId},
    NewOperation, OperationMethod, QueuedOperation,
};
use healthbuddy_remote::{ApiClient, HttpDispatcher};

/// Starts a mock server and returns a dispatcher with the given timeout
pub async fn setup_with_timeout(timeout: Duration) -> (MockServer, HttpDispatcher) {
    let server = MockServer::start().await;
    let client = ApiClient::new(server.uri(), timeout).expect("client");
    (server, HttpDispatcher::new(client))
}

/// Starts a mock server and returns a dispatcher with a 5 second timeout
pub async fn setup() -> (MockServer, HttpDispatcher) {
    setup_with_timeout(Duration::from_secs(5)).await
}

/// Builds a queued operation as the coordinator would see it
pub fn queued(method: OperationMethod, target: &str, payload: Value) -> QueuedOperation {
    let entity_id = match target {
        "/profile" | "/profile/baseline" => EntityId::profile(),
        "/goals" => EntityId::goals(),
        _ => EntityId::generate(EntityKind::Meal),
    };
    let op = NewOperation::new(
        method,
        LogicalPath::new(target).expect("valid path"),
        entity_id,
        payload,
    );
    QueuedOperation::enqueued(QueueId::new(1), op, Utc::now())
}
