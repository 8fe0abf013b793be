//! Webhook ingestion handler.
//!
//! Collects the API key header and raw body and hands them to the
//! [`IngestionPipeline`](crate::pipeline::IngestionPipeline). The body is
//! taken as bytes so that unparseable input still reaches validation and
//! the audit log.

use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use saleshook_core::example_body;
use serde_json::Value;
use tracing::instrument;

use crate::{auth::extract_api_key, pipeline::Inbound, AppState};

/// Receives a sale-status notification.
///
/// Returns 200 when both rows committed, 400 with ordered field errors when
/// the body fails the schema, 401 when the key is missing or wrong, and an
/// opaque 500 when the unit of work could not commit.
#[instrument(name = "receive_webhook", skip_all, fields(content_length = body.len()))]
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let inbound = Inbound { api_key: extract_api_key(&headers), body };
    state.pipeline.run(inbound).await.into_response()
}

/// Returns a complete, valid example request body.
pub async fn example_payload() -> Json<Value> {
    Json(example_body())
}
