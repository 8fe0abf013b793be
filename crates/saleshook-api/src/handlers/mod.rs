//! HTTP request handlers.
//!
//! - `ingest` - the webhook endpoint and its example payload
//! - `health` - health, readiness and liveness probes
//!
//! Handlers only translate between HTTP and the ingestion pipeline; storage
//! access goes through the [`saleshook_core::EventStore`] held in
//! [`crate::AppState`].

pub mod health;
pub mod ingest;

pub use health::{health_check, liveness_check, readiness_check};
pub use ingest::{example_payload, receive_webhook};
