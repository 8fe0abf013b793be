//! End-to-end tests over a real listener.
//!
//! Serves the full router on an ephemeral port and talks to it with an HTTP
//! client, the way the vendor does.

use std::{net::SocketAddr, time::Duration};

use anyhow::Result;
use saleshook_api::{create_router, AppState, AuthGuard};
use saleshook_testing::{PayloadBuilder, TestEnv, TEST_API_KEY};
use serde_json::{json, Value};

async fn spawn_server(env: &TestEnv) -> Result<SocketAddr> {
    let state = AppState::new(AuthGuard::new(TEST_API_KEY)?, env.store(), env.clock());
    let app = create_router(state, Duration::from_secs(30));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(addr)
}

/// A vendor delivery followed by a malformed retry.
#[tokio::test]
async fn delivery_then_malformed_retry() -> Result<()> {
    let env = TestEnv::new().await?;
    let addr = spawn_server(&env).await?;
    let client = reqwest::Client::new();
    let url = format!("http://{addr}/webhook");

    let response = client
        .post(&url)
        .header("X-API-Key", TEST_API_KEY)
        .json(&PayloadBuilder::new().status("contrato_assinado").build())
        .send()
        .await?;

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await?;
    assert_eq!(body["event_id"], "evt_20260203_6010");

    let response = client
        .post(&url)
        .header("X-API-Key", TEST_API_KEY)
        .header("content-type", "application/json")
        .body("{\"id_venda\": 6010")
        .send()
        .await?;

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await?;
    assert_eq!(body["errors"][0]["type"], "json_invalid");

    env.wait_for_audit_rows(2, Duration::from_secs(2)).await?;
    assert_eq!(env.audit_count_by_validity(true).await?, 1);
    assert_eq!(env.audit_count_by_validity(false).await?, 1);

    let stored = env.storage().sale_events.find_by_sale_id(6010).await?;
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].status, "contrato_assinado");

    Ok(())
}

#[tokio::test]
async fn every_response_is_json() -> Result<()> {
    let env = TestEnv::new().await?;
    let addr = spawn_server(&env).await?;
    let client = reqwest::Client::new();

    let unauthorized: Value =
        client.post(format!("http://{addr}/webhook")).json(&json!({})).send().await?.json().await?;
    assert_eq!(unauthorized, json!({"detail": "Invalid API key."}));

    let live: Value = client.get(format!("http://{addr}/live")).send().await?.json().await?;
    assert_eq!(live["status"], "alive");

    let example: Value =
        client.get(format!("http://{addr}/webhook/example")).send().await?.json().await?;
    assert_eq!(example["id_venda"], 6010);

    Ok(())
}
