//! Saleshook HTTP API.
//!
//! Hosts the webhook endpoint and the [`IngestionPipeline`] behind it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::sync::Arc;

use saleshook_core::{Clock, EventStore};

pub mod auth;
pub mod config;
pub mod handlers;
pub mod pipeline;
pub mod server;

pub use auth::{AuthError, AuthGuard, MissingSecret};
pub use config::Config;
pub use pipeline::{IngestionPipeline, Outcome};
pub use server::{create_router, start_server};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Ingestion state machine.
    pub pipeline: Arc<IngestionPipeline>,
    /// Bound store, for health reporting.
    pub store: Arc<dyn EventStore>,
    /// Clock used for timestamps.
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Wires the pipeline over a bound store.
    pub fn new(guard: AuthGuard, store: Arc<dyn EventStore>, clock: Arc<dyn Clock>) -> Self {
        let pipeline = Arc::new(IngestionPipeline::new(guard, store.clone(), clock.clone()));
        Self { pipeline, store, clock }
    }
}
