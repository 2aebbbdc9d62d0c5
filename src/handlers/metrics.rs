//! Metrics endpoint handler for Prometheus scraping.
//!
//! Serves the default registry: the exporter's own metrics plus the
//! collector for the configured Redis instance, if any.

use axum::{extract::State, response::Response};
use tracing::{debug, instrument};

use crate::render::serve_registry;
use crate::state::SharedState;

/// Handler for the metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> Response {
    debug!("Processing metrics request");
    serve_registry(state.default_registry()).await
}
