//! Dispatch routing and classification tests

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, ResponseTemplate};

use healthbuddy_core::domain::{DispatchOutcome, OperationMethod};
use healthbuddy_core::ports::IRemoteDispatcher;
use healthbuddy_remote::{ApiClient, HttpDispatcher};

use crate::common;

#[tokio::test]
async fn test_update_goals_returns_server_value() {
    let (server, dispatcher) = common::setup().await;
    let op = common::queued(OperationMethod::Update, "/goals", json!({ "steps": 9000 }));

    Mock::given(method("PUT"))
        .and(path("/goals"))
        .and(body_json(json!({ "steps": 9000 })))
        .and(header("Idempotency-Key", op.idempotency_key().to_string().as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "id": "g1", "steps": 9000 })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let outcome = dispatcher.dispatch(&op).await;
    assert_eq!(
        outcome,
        DispatchOutcome::Success(json!({ "id": "g1", "steps": 9000 }))
    );
}

#[tokio::test]
async fn test_every_route_uses_its_http_verb() {
    let (server, dispatcher) = common::setup().await;

    let cases = [
        (OperationMethod::Create, "/profile", "POST"),
        (OperationMethod::Update, "/profile", "PUT"),
        (OperationMethod::Patch, "/profile/baseline", "PATCH"),
        (OperationMethod::Create, "/meals", "POST"),
        (OperationMethod::Create, "/meals/photo", "POST"),
        (OperationMethod::Update, "/meals/m-42", "PUT"),
        (OperationMethod::Create, "/hydration", "POST"),
        (OperationMethod::Create, "/biometrics/weight", "POST"),
    ];

    for (_, target, verb) in &cases {
        Mock::given(method(*verb))
            .and(path(*target))
            .and(header_exists("Idempotency-Key"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "ok": true })))
            .mount(&server)
            .await;
    }

    for (op_method, target, _) in cases {
        let op = common::queued(op_method, target, json!({}));
        let outcome = dispatcher.dispatch(&op).await;
        assert!(outcome.is_success(), "{op_method} {target}: {outcome:?}");
    }
}

#[tokio::test]
async fn test_no_content_echoes_payload() {
    let (server, dispatcher) = common::setup().await;
    Mock::given(method("POST"))
        .and(path("/hydration"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let payload = json!({ "amount_ml": 250 });
    let op = common::queued(OperationMethod::Create, "/hydration", payload.clone());
    assert_eq!(dispatcher.dispatch(&op).await, DispatchOutcome::Success(payload));
}

#[tokio::test]
async fn test_server_errors_are_transient() {
    for status in [500_u16, 502, 503, 408, 429] {
        let (server, dispatcher) = common::setup().await;
        Mock::given(method("PUT"))
            .and(path("/goals"))
            .respond_with(ResponseTemplate::new(status).set_body_string("busy"))
            .mount(&server)
            .await;

        let op = common::queued(OperationMethod::Update, "/goals", json!({}));
        let outcome = dispatcher.dispatch(&op).await;
        assert!(
            matches!(outcome, DispatchOutcome::TransientFailure(_)),
            "HTTP {status}: {outcome:?}"
        );
    }
}

#[tokio::test]
async fn test_client_errors_are_permanent() {
    for status in [400_u16, 404, 409, 422] {
        let (server, dispatcher) = common::setup().await;
        Mock::given(method("POST"))
            .and(path("/meals"))
            .respond_with(ResponseTemplate::new(status).set_body_string("invalid meal"))
            .mount(&server)
            .await;

        let op = common::queued(OperationMethod::Create, "/meals", json!({}));
        match dispatcher.dispatch(&op).await {
            DispatchOutcome::PermanentFailure(msg) => {
                assert!(msg.contains(&status.to_string()), "{msg}");
                assert!(msg.contains("invalid meal"), "{msg}");
            }
            other => panic!("HTTP {status}: unexpected {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_unknown_route_never_hits_network() {
    let (server, dispatcher) = common::setup().await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let op = common::queued(OperationMethod::Create, "/sleep", json!({}));
    assert_eq!(
        dispatcher.dispatch(&op).await,
        DispatchOutcome::PermanentFailure("Unknown sync path: /sleep".into())
    );

    let op = common::queued(OperationMethod::Patch, "/goals", json!({}));
    assert!(matches!(
        dispatcher.dispatch(&op).await,
        DispatchOutcome::PermanentFailure(_)
    ));
}

#[tokio::test]
async fn test_timeout_is_transient() {
    let (server, dispatcher) = common::setup_with_timeout(Duration::from_millis(200)).await;
    Mock::given(method("PUT"))
        .and(path("/goals"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let op = common::queued(OperationMethod::Update, "/goals", json!({}));
    match dispatcher.dispatch(&op).await {
        DispatchOutcome::TransientFailure(msg) => assert!(msg.contains("timed out"), "{msg}"),
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn test_unreachable_server_is_transient() {
    // Bind then release a port so nothing listens on it
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let client = ApiClient::new(format!("http://127.0.0.1:{port}"), Duration::from_secs(2)).unwrap();
    let dispatcher = HttpDispatcher::new(client);

    let op = common::queued(OperationMethod::Update, "/goals", json!({}));
    assert!(matches!(
        dispatcher.dispatch(&op).await,
        DispatchOutcome::TransientFailure(_)
    ));
}
