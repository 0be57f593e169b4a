//! Opportunistic read and health check tests

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use healthbuddy_core::domain::{newtypes::LogicalPath, DispatchOutcome};
use healthbuddy_core::ports::IRemoteDispatcher;

use crate::common;

#[tokio::test]
async fn test_fetch_profile() {
    let (server, dispatcher) = common::setup().await;
    Mock::given(method("GET"))
        .and(path("/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "age": 37 })))
        .mount(&server)
        .await;

    let outcome = dispatcher
        .fetch(&LogicalPath::new("/profile").unwrap())
        .await;
    assert_eq!(outcome, DispatchOutcome::Success(json!({ "age": 37 })));
}

#[tokio::test]
async fn test_fetch_missing_is_permanent() {
    let (server, dispatcher) = common::setup().await;
    Mock::given(method("GET"))
        .and(path("/goals"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let outcome = dispatcher.fetch(&LogicalPath::new("/goals").unwrap()).await;
    assert!(matches!(outcome, DispatchOutcome::PermanentFailure(_)));
}

#[tokio::test]
async fn test_fetch_rejects_unknown_path() {
    let (_server, dispatcher) = common::setup().await;
    let outcome = dispatcher.fetch(&LogicalPath::new("/meals").unwrap()).await;
    assert!(matches!(outcome, DispatchOutcome::PermanentFailure(_)));
}

#[tokio::test]
async fn test_health_check() {
    let (server, dispatcher) = common::setup().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .mount(&server)
        .await;

    assert!(dispatcher.client().health().await.is_ok());

    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let err = dispatcher.client().health().await.unwrap_err();
    assert!(err.is_transient());
}
