//! Request-level errors and their HTTP mapping.
//!
//! Every failure is terminal for its request and is answered with a status
//! code and a plain-text message; nothing is retried.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::collector::CollectorError;
use crate::credentials::CredentialError;
use crate::target::TargetError;

#[derive(Debug, thiserror::Error)]
pub enum ExporterError {
    #[error(transparent)]
    Target(#[from] TargetError),

    #[error("failed to build collector for target: {0}")]
    Construction(#[from] CollectorError),

    #[error("There is no pwd file specified")]
    NoPasswordFile,

    #[error("failed to reload passwords file: {0}")]
    Reload(#[from] CredentialError),

    #[error("failed to render metrics: {0}")]
    Render(String),
}

impl ExporterError {
    pub fn status(&self) -> StatusCode {
        match self {
            ExporterError::Target(_)
            | ExporterError::Construction(_)
            | ExporterError::NoPasswordFile => StatusCode::BAD_REQUEST,
            ExporterError::Reload(_) | ExporterError::Render(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the error counts towards `target_scrape_request_errors_total`.
    pub fn is_scrape_error(&self) -> bool {
        matches!(
            self,
            ExporterError::Target(_) | ExporterError::Construction(_)
        )
    }
}

impl IntoResponse for ExporterError {
    fn into_response(self) -> Response {
        (
            self.status(),
            [("Content-Type", "text/plain; charset=utf-8")],
            format!("{}\n", self),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ExporterError::from(TargetError::Missing).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ExporterError::from(CollectorError::UnsupportedScheme("rediss".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ExporterError::NoPasswordFile.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ExporterError::Render("boom".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_missing_target_message() {
        let err = ExporterError::from(TargetError::Missing);
        assert!(err.is_scrape_error());
        assert_eq!(err.to_string(), "'target' parameter must be specified");
    }

    #[test]
    fn test_reload_errors_are_not_scrape_errors() {
        assert!(!ExporterError::NoPasswordFile.is_scrape_error());
    }
}
