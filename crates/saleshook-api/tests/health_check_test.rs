//! Integration tests for the health endpoints.

use std::{sync::Arc, time::Duration};

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use saleshook_api::{create_router, AppState, AuthGuard};
use saleshook_testing::{MockEventStore, TestClock, TestEnv, TEST_API_KEY};
use serde_json::Value;
use tower::ServiceExt;

fn router(state: AppState) -> Router {
    create_router(state, Duration::from_secs(30))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn ephemeral_engine_reports_degraded() {
    let env = TestEnv::new().await.expect("test env setup");
    let guard = AuthGuard::new(TEST_API_KEY).unwrap();
    let app = router(AppState::new(guard, env.store(), env.clock()));

    let (status, body) = get(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["checks"]["database"]["status"], "up");
    assert_eq!(body["checks"]["database"]["backend"], "sqlite");
    assert_eq!(body["checks"]["database"]["ephemeral"], true);
    assert_eq!(body["timestamp"], "2026-02-03T12:00:00Z");
}

#[tokio::test]
async fn unreachable_store_is_service_unavailable() {
    let store = MockEventStore::new();
    store.fail_health_checks("connection refused").await;
    let guard = AuthGuard::new(TEST_API_KEY).unwrap();
    let state = AppState::new(guard, Arc::new(store), Arc::new(TestClock::new()));

    for uri in ["/health", "/ready"] {
        let (status, body) = get(router(state.clone()), uri).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unhealthy");
        assert_eq!(body["checks"]["database"]["message"], "Storage is not answering");
    }
}

#[tokio::test]
async fn liveness_does_not_touch_storage() {
    let store = MockEventStore::new();
    store.fail_health_checks("connection refused").await;
    let guard = AuthGuard::new(TEST_API_KEY).unwrap();
    let state = AppState::new(guard, Arc::new(store), Arc::new(TestClock::new()));

    let (status, body) = get(router(state), "/live").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "alive");
    assert_eq!(body["service"], "saleshook");
}
