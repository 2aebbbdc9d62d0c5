//! Health check endpoint handler.

use axum::response::IntoResponse;
use tracing::{debug, instrument};

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str = "Project: https://github.com/cansp-dev/herakles-redis-exporter — More info: https://www.herakles.now — Support: exporter@herakles.now";

/// Handler for the /health endpoint. Answers `ok` as long as the process
/// serves HTTP.
#[instrument]
pub async fn health_handler() -> impl IntoResponse {
    debug!("Processing /health request");
    "ok"
}
