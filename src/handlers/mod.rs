//! HTTP endpoint handlers for the exporter.
//!
//! This module provides handlers for all HTTP endpoints:
//! - `/`: Landing page
//! - `/health`: Liveness check
//! - metrics path (default `/metrics`): Default registry
//! - `/scrape`: Ad-hoc scrape of a caller-specified target
//! - `/-/reload`: Password file reload
//!
//! When basic auth is configured, the metrics path, `/scrape` and
//! `/-/reload` require it.

pub mod health;
pub mod metrics;
pub mod reload;
pub mod root;
pub mod scrape;

use axum::{middleware, routing::get, Router};

use crate::auth::require_basic_auth;
use crate::state::SharedState;

// Re-export handlers
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use reload::reload_handler;
pub use root::root_handler;
pub use scrape::scrape_handler;

pub const SCRAPE_PATH: &str = "/scrape";
pub const RELOAD_PATH: &str = "/-/reload";
pub const HEALTH_PATH: &str = "/health";

/// Paths the metrics path must not shadow.
pub const RESERVED_PATHS: &[&str] = &["/", HEALTH_PATH, SCRAPE_PATH, RELOAD_PATH];

/// Builds the router for all exporter endpoints.
pub fn build_router(state: SharedState) -> Router {
    let metrics_path = state.metrics_path();

    let mut guarded = Router::new()
        .route(&metrics_path, get(metrics_handler))
        .route(SCRAPE_PATH, get(scrape_handler))
        .route(RELOAD_PATH, get(reload_handler).post(reload_handler));

    if let Some(gate) = state.basic_auth_gate() {
        guarded = guarded.route_layer(middleware::from_fn_with_state(gate, require_basic_auth));
    }

    Router::new()
        .route("/", get(root_handler))
        .route(HEALTH_PATH, get(health_handler))
        .merge(guarded)
        .with_state(state)
}
