//! Password file reload endpoint.

use axum::{extract::State, response::IntoResponse};
use tracing::{debug, error, instrument};

use crate::credentials::load_password_file;
use crate::error::ExporterError;
use crate::state::SharedState;

/// Handler for the reload endpoint.
///
/// The file is read and parsed before the shared state is touched; a failed
/// reload keeps the previous map.
#[instrument(skip(state))]
pub async fn reload_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let result = reload_password_file(&state);
    if result.is_err() {
        state.password_reload_errors.inc();
    }
    result
}

fn reload_password_file(state: &SharedState) -> Result<&'static str, ExporterError> {
    let path = state.password_file().ok_or(ExporterError::NoPasswordFile)?;

    debug!("Reloading password file {}", path.display());
    let map = load_password_file(&path).map_err(|e| {
        error!(
            "Error reloading redis passwords from file {}: {}",
            path.display(),
            e
        );
        e
    })?;

    state.replace_password_map(map);
    Ok("ok")
}
