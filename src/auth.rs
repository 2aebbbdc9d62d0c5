//! HTTP basic authentication for the exporter endpoints.
//!
//! Exactly one identity is configured. Supplied and expected values are
//! hashed with SHA-256 and the digests are compared in constant time, so the
//! response latency does not depend on how many leading characters match.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::debug;

/// Challenge sent with every 401.
pub const CHALLENGE: &str = r#"Basic realm="restricted", charset="UTF-8""#;

/// The exporter's own username/password pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicAuthCredentials {
    pub username: String,
    pub password: String,
}

impl BasicAuthCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for BasicAuthCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuthCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Verifies request credentials against the configured identity.
pub struct BasicAuthGate {
    username_digest: Vec<u8>,
    password_digest: Vec<u8>,
}

impl BasicAuthGate {
    pub fn new(credentials: &BasicAuthCredentials) -> Self {
        Self {
            username_digest: Sha256::digest(credentials.username.as_bytes()).to_vec(),
            password_digest: Sha256::digest(credentials.password.as_bytes()).to_vec(),
        }
    }

    /// Both digests are always compared; the results are combined without
    /// short-circuiting.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let username_digest = Sha256::digest(username.as_bytes());
        let password_digest = Sha256::digest(password.as_bytes());

        let username_match = username_digest.as_slice().ct_eq(&self.username_digest);
        let password_match = password_digest.as_slice().ct_eq(&self.password_digest);

        bool::from(username_match & password_match)
    }

    pub fn check_headers(&self, headers: &HeaderMap) -> bool {
        match parse_basic_auth(headers) {
            Some((username, password)) => self.verify(&username, &password),
            None => false,
        }
    }
}

/// Extracts `(username, password)` from an `Authorization: Basic ...` header.
pub fn parse_basic_auth(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, encoded) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

/// The 401 response carrying the authentication challenge.
pub fn unauthorized() -> Response {
    let mut response = (StatusCode::UNAUTHORIZED, "Unauthorized\n").into_response();
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static(CHALLENGE),
    );
    response
}

/// Middleware guarding a set of routes with [`BasicAuthGate`].
pub async fn require_basic_auth(
    State(gate): State<Arc<BasicAuthGate>>,
    request: Request,
    next: Next,
) -> Response {
    if gate.check_headers(request.headers()) {
        return next.run(request).await;
    }

    debug!("Rejected unauthenticated request to {}", request.uri().path());
    unauthorized()
}
