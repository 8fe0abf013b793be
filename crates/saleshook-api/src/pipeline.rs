//! Per-request ingestion state machine.
//!
//! A request moves through [`Stage`]s, one transition function each:
//!
//! ```text
//! Authenticating ──▶ Done(Unauthorized)
//!       │
//!       ▼
//!   Validating ────▶ Done(Rejected)   + detached audit write
//!       │
//!       ▼
//!   Persisting ────▶ Done(Accepted) | Done(Failed)
//! ```
//!
//! Authentication happens before the body is inspected or storage touched.
//! The commit runs on its own task and is awaited, so a caller that gives
//! up mid-request cannot interrupt a unit of work halfway through.

use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::SecondsFormat;
use saleshook_core::{
    event_id, validate_body, AuditRow, Clock, DataRow, EventStore, FieldError, PathSegment,
    RejectedBody, ValidatedPayload,
};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn, Instrument};

use crate::auth::{AuthError, AuthGuard};

/// What the handler hands to the pipeline.
#[derive(Debug, Clone)]
pub struct Inbound {
    /// Value of the `X-API-Key` header, if present.
    pub api_key: Option<String>,
    /// Raw request body.
    pub body: Bytes,
}

/// Identifiers returned for an accepted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// `evt_<YYYYMMDD>_<sale_id>`.
    pub event_id: String,
    /// UTC commit time, RFC 3339 with a `Z` suffix.
    pub processed_at: String,
}

/// Result of the best-effort audit write for a rejected body.
///
/// Nothing depends on it; it is logged and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditWriteOutcome {
    /// The audit row was stored.
    Written,
    /// The write failed and was suppressed.
    Suppressed(String),
}

/// Terminal state of a request.
#[derive(Debug)]
pub enum Outcome {
    /// Both rows committed.
    Accepted(Receipt),
    /// The key was missing or wrong. Nothing was stored.
    Unauthorized,
    /// The body failed validation.
    Rejected {
        /// Ordered field errors.
        errors: Vec<FieldError>,
        /// The detached audit write. Awaiting it is optional.
        audit: JoinHandle<AuditWriteOutcome>,
    },
    /// The unit of work did not commit. Nothing was stored.
    Failed,
}

/// A request between transitions.
#[derive(Debug)]
pub enum Stage {
    /// Checking the API key.
    Authenticating(Inbound),
    /// Checking the body against the schema.
    Validating(Inbound),
    /// Writing both rows in one unit of work.
    Persisting(ValidatedPayload),
    /// Finished.
    Done(Outcome),
}

/// Runs requests from authentication to a terminal [`Outcome`].
pub struct IngestionPipeline {
    guard: AuthGuard,
    store: Arc<dyn EventStore>,
    clock: Arc<dyn Clock>,
}

impl IngestionPipeline {
    /// Creates a pipeline over the bound store.
    pub fn new(guard: AuthGuard, store: Arc<dyn EventStore>, clock: Arc<dyn Clock>) -> Self {
        Self { guard, store, clock }
    }

    /// Drives a request to completion.
    pub async fn run(&self, inbound: Inbound) -> Outcome {
        let mut stage = Stage::Authenticating(inbound);
        loop {
            stage = match stage {
                Stage::Done(outcome) => return outcome,
                other => self.advance(other).await,
            };
        }
    }

    /// Performs one transition. `Done` is returned unchanged.
    pub async fn advance(&self, stage: Stage) -> Stage {
        match stage {
            Stage::Authenticating(inbound) => self.authenticate(inbound),
            Stage::Validating(inbound) => self.validate(inbound),
            Stage::Persisting(payload) => self.persist(payload).await,
            done @ Stage::Done(_) => done,
        }
    }

    fn authenticate(&self, inbound: Inbound) -> Stage {
        match self.guard.verify(inbound.api_key.as_deref()) {
            Ok(()) => Stage::Validating(inbound),
            Err(e) => {
                debug!(reason = %e, "rejecting unauthenticated webhook");
                Stage::Done(Outcome::Unauthorized)
            },
        }
    }

    fn validate(&self, inbound: Inbound) -> Stage {
        match validate_body(&inbound.body) {
            Ok(payload) => Stage::Persisting(payload),
            Err(errors) => {
                info!(error_count = errors.len(), "webhook failed schema validation");
                let audit = self.record_rejected(&inbound.body);
                Stage::Done(Outcome::Rejected { errors, audit })
            },
        }
    }

    async fn persist(&self, payload: ValidatedPayload) -> Stage {
        let sale_id = payload.sale_id;
        let canonical = match payload.canonical_json() {
            Ok(canonical) => canonical,
            Err(e) => {
                error!(sale_id, error = %e, "failed to project validated payload");
                return Stage::Done(Outcome::Failed);
            },
        };

        let received_at = self.clock.now_utc();
        let audit = AuditRow::accepted(canonical.clone(), received_at);
        let data = DataRow::from_payload(&payload, canonical, received_at);

        let store = self.store.clone();
        let commit =
            tokio::spawn(async move { store.commit_event(audit, data).await }.in_current_span());

        match commit.await {
            Ok(Ok(())) => {
                let processed_at = self.clock.now_utc();
                let event_id = event_id(sale_id, processed_at);
                info!(sale_id, event_id = %event_id, "webhook committed");

                Stage::Done(Outcome::Accepted(Receipt {
                    event_id,
                    processed_at: processed_at.to_rfc3339_opts(SecondsFormat::Micros, true),
                }))
            },
            Ok(Err(e)) => {
                error!(sale_id, error = %e, "failed to commit webhook, rolled back");
                Stage::Done(Outcome::Failed)
            },
            Err(e) => {
                error!(sale_id, error = %e, "commit task did not complete");
                Stage::Done(Outcome::Failed)
            },
        }
    }

    fn record_rejected(&self, body: &[u8]) -> JoinHandle<AuditWriteOutcome> {
        let row = AuditRow::rejected(
            RejectedBody::from_bytes(body).into_audit_payload(),
            self.clock.now_utc(),
        );
        let store = self.store.clone();

        tokio::spawn(
            async move {
                match store.append_audit(row).await {
                    Ok(()) => {
                        debug!("recorded rejected webhook");
                        AuditWriteOutcome::Written
                    },
                    Err(e) => {
                        warn!(error = %e, "failed to record rejected webhook");
                        AuditWriteOutcome::Suppressed(e.to_string())
                    },
                }
            }
            .in_current_span(),
        )
    }
}

/// Body of a 200 response.
#[derive(Debug, Serialize)]
pub struct AcceptedResponse {
    /// Always `received`.
    pub status: &'static str,
    /// Human-readable confirmation.
    pub message: &'static str,
    /// Deterministic event identifier.
    pub event_id: String,
    /// UTC commit time.
    pub processed_at: String,
}

/// Body of a 400 response.
#[derive(Debug, Serialize)]
pub struct RejectedResponse {
    /// Summary line.
    pub detail: &'static str,
    /// Field errors, located from the request root (`["body", ...]`).
    pub errors: Vec<FieldError>,
}

impl IntoResponse for Outcome {
    fn into_response(self) -> Response {
        match self {
            Self::Accepted(receipt) => (
                StatusCode::OK,
                Json(AcceptedResponse {
                    status: "received",
                    message: "Webhook processed successfully",
                    event_id: receipt.event_id,
                    processed_at: receipt.processed_at,
                }),
            )
                .into_response(),
            Self::Unauthorized => AuthError::InvalidApiKey.into_response(),
            // Dropping the handle detaches the audit write.
            Self::Rejected { errors, audit: _ } => {
                let errors = errors
                    .into_iter()
                    .map(|mut e| {
                        e.loc.insert(0, PathSegment::from("body"));
                        e
                    })
                    .collect();

                (
                    StatusCode::BAD_REQUEST,
                    Json(RejectedResponse { detail: "Invalid payload (schema).", errors }),
                )
                    .into_response()
            },
            Self::Failed => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "detail": "Failed to persist webhook." })),
            )
                .into_response(),
        }
    }
}
