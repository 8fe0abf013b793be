//! Integration tests for the webhook endpoint.
//!
//! Drives `POST /webhook` through the full router against an in-memory
//! engine and checks both the HTTP response and what was stored.

use std::{sync::Arc, time::Duration};

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use saleshook_api::{create_router, AppState, AuthGuard};
use saleshook_testing::{
    fixed_now, MockEventStore, PayloadBuilder, TestClock, TestEnv, TEST_API_KEY,
};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app(env: &TestEnv) -> Router {
    let guard = AuthGuard::new(TEST_API_KEY).expect("test key is not blank");
    create_router(AppState::new(guard, env.store(), env.clock()), Duration::from_secs(30))
}

fn post(key: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut builder =
        Request::builder().method("POST").uri("/webhook").header("content-type", "application/json");
    if let Some(key) = key {
        builder = builder.header("X-API-Key", key);
    }
    builder.body(body.into()).expect("build request")
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("read body");
    let body = serde_json::from_slice(&bytes).expect("response is json");
    (status, body)
}

/// Happy path: both rows committed and a deterministic event id returned.
#[tokio::test]
async fn valid_sale_event_is_accepted_and_stored() {
    let env = TestEnv::new().await.expect("test env setup");

    let body = PayloadBuilder::new().to_bytes();
    let (status, response) = send(app(&env), post(Some(TEST_API_KEY), body)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["status"], "received");
    assert_eq!(response["message"], "Webhook processed successfully");
    assert_eq!(response["event_id"], "evt_20260203_6010");
    assert_eq!(response["processed_at"], "2026-02-03T12:00:00.000000Z");

    assert_eq!(env.audit_count_by_validity(true).await.unwrap(), 1);
    assert_eq!(env.data_count().await.unwrap(), 1);

    let stored = env.storage().sale_events.find_by_sale_id(6010).await.unwrap();
    assert_eq!(stored[0].status, "processo_finalizado");
    assert_eq!(stored[0].payload["dados_cliente"]["email"], "HERMSOU3SA@teste.com");
    assert_eq!(stored[0].payload["dados_cliente"]["conjuge"]["email"], "MCJ3ULIEN@teste.com");
}

#[tokio::test]
async fn invalid_email_is_rejected_with_its_location() {
    let env = TestEnv::new().await.expect("test env setup");

    let body = PayloadBuilder::new().set("/dados_cliente/email", json!("not-an-email")).to_bytes();
    let (status, response) = send(app(&env), post(Some(TEST_API_KEY), body)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["detail"], "Invalid payload (schema).");

    let errors = response["errors"].as_array().expect("errors array");
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0]["type"], "value_error");
    assert_eq!(errors[0]["loc"], json!(["body", "dados_cliente", "email"]));

    env.wait_for_audit_rows(1, Duration::from_secs(2)).await.unwrap();
    assert_eq!(env.audit_count_by_validity(false).await.unwrap(), 1);
    assert_eq!(env.data_count().await.unwrap(), 0);
}

#[tokio::test]
async fn missing_api_key_is_unauthorized_and_stores_nothing() {
    let env = TestEnv::new().await.expect("test env setup");

    let (status, response) = send(app(&env), post(None, PayloadBuilder::new().to_bytes())).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(response, json!({"detail": "Invalid API key."}));
    assert_eq!(env.audit_count().await.unwrap(), 0);
    assert_eq!(env.data_count().await.unwrap(), 0);
}

#[tokio::test]
async fn wrong_api_key_wins_over_invalid_body() {
    let env = TestEnv::new().await.expect("test env setup");

    let (status, _) = send(app(&env), post(Some("wrong"), "{not json")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(env.audit_count().await.unwrap(), 0);
}

#[tokio::test]
async fn unparseable_body_is_rejected_and_audited_raw() {
    let env = TestEnv::new().await.expect("test env setup");

    let (status, response) = send(app(&env), post(Some(TEST_API_KEY), "{not json")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(response["errors"][0]["type"], "json_invalid");
    assert_eq!(response["errors"][0]["loc"], json!(["body"]));

    env.wait_for_audit_rows(1, Duration::from_secs(2)).await.unwrap();
    let logged = env.storage().audit_log.recent(1).await.unwrap();
    assert!(!logged[0].valid);
    assert_eq!(logged[0].payload, json!({"_raw": "{not json"}));
    assert_eq!(env.data_count().await.unwrap(), 0);
}

#[tokio::test]
async fn commit_failure_returns_opaque_error_and_stores_nothing() {
    let env = TestEnv::new().await.expect("test env setup");
    env.reject_sale_event_inserts().await.unwrap();

    let (status, response) =
        send(app(&env), post(Some(TEST_API_KEY), PayloadBuilder::new().to_bytes())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response, json!({"detail": "Failed to persist webhook."}));
    assert_eq!(env.audit_count().await.unwrap(), 0);
    assert_eq!(env.data_count().await.unwrap(), 0);
}

#[tokio::test]
async fn resubmission_is_stored_twice() {
    let env = TestEnv::new().await.expect("test env setup");
    let body = PayloadBuilder::new().sale_id(42).to_bytes();

    for _ in 0..2 {
        let (status, response) = send(app(&env), post(Some(TEST_API_KEY), body.clone())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["event_id"], "evt_20260203_42");
    }

    assert_eq!(env.storage().sale_events.find_by_sale_id(42).await.unwrap().len(), 2);
    assert_eq!(env.audit_count().await.unwrap(), 2);
}

#[tokio::test]
async fn example_endpoint_serves_an_acceptable_body() {
    let env = TestEnv::new().await.expect("test env setup");

    let request =
        Request::builder().uri("/webhook/example").body(Body::empty()).expect("build request");
    let (status, example) = send(app(&env), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(example["id_venda"], 6010);

    let body = serde_json::to_vec(&example).unwrap();
    let (status, _) = send(app(&env), post(Some(TEST_API_KEY), body)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let env = TestEnv::new().await.expect("test env setup");

    let response = app(&env).oneshot(post(None, "{}")).await.unwrap();

    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn clock_advance_changes_event_date() {
    let env = TestEnv::new().await.expect("test env setup");
    env.clock.advance(Duration::from_secs(24 * 3600));

    let (_, response) = send(app(&env), post(Some(TEST_API_KEY), PayloadBuilder::new().to_bytes())).await;

    assert_eq!(response["event_id"], "evt_20260204_6010");
}

/// The response reports how the commit ended, however long it takes.
#[tokio::test]
async fn slow_commit_is_awaited_past_the_request_timeout() {
    let store = MockEventStore::new();
    store.delay_commits(Duration::from_millis(300)).await;
    let guard = AuthGuard::new(TEST_API_KEY).unwrap();
    let state =
        AppState::new(guard, Arc::new(store.clone()), Arc::new(TestClock::at(fixed_now())));
    let app = create_router(state, Duration::from_millis(50));

    let (status, response) =
        send(app, post(Some(TEST_API_KEY), PayloadBuilder::new().to_bytes())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response["event_id"], "evt_20260203_6010");
    assert_eq!(store.data_rows().await.len(), 1);
    assert_eq!(store.audit_rows().await.len(), 1);
}

#[tokio::test]
async fn slow_failing_commit_still_answers_500() {
    let store = MockEventStore::new();
    store.delay_commits(Duration::from_millis(300)).await;
    store.fail_commits("deadlock detected").await;
    let guard = AuthGuard::new(TEST_API_KEY).unwrap();
    let state = AppState::new(guard, Arc::new(store.clone()), Arc::new(TestClock::new()));
    let app = create_router(state, Duration::from_millis(50));

    let (status, response) =
        send(app, post(Some(TEST_API_KEY), PayloadBuilder::new().to_bytes())).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response, json!({"detail": "Failed to persist webhook."}));
    assert!(store.data_rows().await.is_empty());
}
