//! Prometheus text exposition of a registry.
//!
//! Families are encoded one at a time. A family that fails to encode is
//! dropped from the body and logged; the remaining families are still sent.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use prometheus::{Encoder, Registry, TextEncoder};
use std::time::Instant;
use tracing::{debug, error, warn};

use crate::error::ExporterError;

/// Initial buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 64 * 1024;

/// Result of one render pass.
#[derive(Debug)]
pub struct Rendered {
    pub body: Vec<u8>,
    pub content_type: String,
    pub families: usize,
    pub failed_families: usize,
}

/// Gathers `registry` and encodes every family that can be encoded.
pub fn render_registry(registry: &Registry) -> Rendered {
    let families = registry.gather();
    let encoder = TextEncoder::new();

    let mut body = Vec::with_capacity(BUFFER_CAP);
    let mut scratch = Vec::new();
    let mut failed_families = 0usize;

    for family in &families {
        scratch.clear();
        match encoder.encode(std::slice::from_ref(family), &mut scratch) {
            Ok(()) => body.extend_from_slice(&scratch),
            Err(e) => {
                failed_families += 1;
                warn!("Skipping metric family that failed to encode: {}", e);
            }
        }
    }

    Rendered {
        body,
        content_type: encoder.format_type().to_string(),
        families: families.len(),
        failed_families,
    }
}

/// Renders `registry` on the blocking pool and turns it into a response.
///
/// Collectors run during gathering and may block on network I/O.
pub async fn serve_registry(registry: Registry) -> Response {
    let start = Instant::now();

    let rendered = match tokio::task::spawn_blocking(move || render_registry(&registry)).await {
        Ok(rendered) => rendered,
        Err(e) => {
            error!("Metrics rendering task failed: {}", e);
            return ExporterError::Render(e.to_string()).into_response();
        }
    };

    debug!(
        "Rendered {} families ({} failed), {} bytes in {:.3}ms",
        rendered.families,
        rendered.failed_families,
        rendered.body.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, rendered.content_type)],
        rendered.body,
    )
        .into_response()
}
