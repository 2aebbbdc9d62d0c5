//! Ad-hoc scrape endpoint.
//!
//! `GET /scrape?target=<host:port>[&check-keys=...]` builds a collector for
//! one target in a registry of its own, gathers it once and returns the
//! result. Nothing built here outlives the request.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    response::{IntoResponse, Response},
};
use prometheus::Registry;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::collector::register_adhoc;
use crate::error::ExporterError;
use crate::options::ScrapeOverrides;
use crate::render::serve_registry;
use crate::state::SharedState;
use crate::target::{resolve_target, TargetError};

/// Query parameters accepted by `/scrape`.
#[derive(Debug, Default, Deserialize)]
pub struct ScrapeParams {
    pub target: Option<String>,
    #[serde(flatten)]
    pub overrides: ScrapeOverrides,
}

/// Handler for the `/scrape` endpoint.
#[instrument(skip_all)]
pub async fn scrape_handler(
    State(state): State<SharedState>,
    params: Result<Query<ScrapeParams>, QueryRejection>,
) -> Response {
    match prepare_scrape(&state, params) {
        Ok(registry) => serve_registry(registry).await,
        Err(err) => {
            if err.is_scrape_error() {
                state.target_scrape_request_errors.inc();
            }
            warn!("Rejected scrape request: {}", err);
            err.into_response()
        }
    }
}

/// Resolves the target, merges the overrides and registers a fresh
/// collector. Returns the request's own registry.
fn prepare_scrape(
    state: &SharedState,
    params: Result<Query<ScrapeParams>, QueryRejection>,
) -> Result<Registry, ExporterError> {
    let Query(params) = params.map_err(|e| TargetError::Query(e.body_text()))?;

    let target = resolve_target(params.target.as_deref())?;
    let options = state.scrape_options(&params.overrides);

    debug!(
        "Building ad-hoc collector for {} (overrides: {:?})",
        target, params.overrides
    );

    register_adhoc(state.factory.as_ref(), &target, &options)?;
    Ok(options.registry)
}
