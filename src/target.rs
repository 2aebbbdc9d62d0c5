//! Resolution of user-supplied scrape targets.
//!
//! Targets arrive as a raw query parameter. They are normalized into a URL
//! that always carries a scheme and never carries user-info, so passwords
//! sent in the query string never reach a collector, a log line or a label.

use std::borrow::Cow;
use std::fmt;
use url::Url;

/// Scheme injected when the caller passes a bare `host:port`.
pub const DEFAULT_SCHEME: &str = "redis";

const SCHEME_SEPARATOR: &str = "://";

#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("'target' parameter must be specified")]
    Missing,

    #[error("Invalid 'target' parameter, parse err: {0}")]
    Invalid(#[from] url::ParseError),

    #[error("Invalid query string: {0}")]
    Query(String),

    #[error("Invalid 'target' parameter, unable to strip credentials")]
    Credentials,
}

/// A normalized connection URI without embedded credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    url: Url,
}

impl Target {
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn host(&self) -> Option<&str> {
        self.url.host_str().filter(|h| !h.is_empty())
    }

    pub fn port(&self) -> Option<u16> {
        self.url.port()
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// `scheme://host[:port]`, i.e. the target without database path or query.
    pub fn instance_alias(&self) -> Option<String> {
        let host = self.host()?;
        Some(match self.port() {
            Some(port) => format!("{}://{}:{}", self.scheme(), host, port),
            None => format!("{}://{}", self.scheme(), host),
        })
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolves the raw `target` query value into a [`Target`].
///
/// A default scheme is prepended when the value has no `://`; this is a
/// purely syntactic check, the URL parser does the actual validation.
pub fn resolve_target(raw: Option<&str>) -> Result<Target, TargetError> {
    let raw = match raw {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Err(TargetError::Missing),
    };

    let candidate = if raw.contains(SCHEME_SEPARATOR) {
        Cow::Borrowed(raw)
    } else {
        Cow::Owned(format!("{DEFAULT_SCHEME}{SCHEME_SEPARATOR}{raw}"))
    };

    let mut url = Url::parse(&candidate)?;

    if !url.username().is_empty() || url.password().is_some() {
        url.set_password(None)
            .and_then(|_| url.set_username(""))
            .map_err(|_| TargetError::Credentials)?;
    }

    Ok(Target { url })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_host_port_gets_default_scheme() {
        let target = resolve_target(Some("localhost:6379")).unwrap();
        assert_eq!(target.as_str(), "redis://localhost:6379");
        assert_eq!(target.host(), Some("localhost"));
        assert_eq!(target.port(), Some(6379));
    }

    #[test]
    fn test_explicit_scheme_kept() {
        let target = resolve_target(Some("valkey://10.0.0.5:6380")).unwrap();
        assert_eq!(target.scheme(), "valkey");
        assert_eq!(target.as_str(), "valkey://10.0.0.5:6380");
    }

    #[test]
    fn test_unix_socket_target() {
        let target = resolve_target(Some("unix:///run/redis/redis.sock")).unwrap();
        assert_eq!(target.scheme(), "unix");
        assert_eq!(target.host(), None);
        assert_eq!(target.path(), "/run/redis/redis.sock");
        assert_eq!(target.instance_alias(), None);
    }

    #[test]
    fn test_user_info_is_stripped() {
        let target = resolve_target(Some("redis://u:p@h:6379/2")).unwrap();
        assert_eq!(target.as_str(), "redis://h:6379/2");
        assert_eq!(target.instance_alias().as_deref(), Some("redis://h:6379"));

        let target = resolve_target(Some("admin:hunter2@cache-01:6379")).unwrap();
        assert_eq!(target.as_str(), "redis://cache-01:6379");

        let target = resolve_target(Some("redis://:only-password@cache-01")).unwrap();
        assert_eq!(target.as_str(), "redis://cache-01");
    }

    #[test]
    fn test_empty_and_missing() {
        assert!(matches!(resolve_target(None), Err(TargetError::Missing)));
        assert!(matches!(resolve_target(Some("")), Err(TargetError::Missing)));
    }

    #[test]
    fn test_invalid_port_is_reported_verbatim() {
        let err = resolve_target(Some("localhost:notaport")).unwrap_err();
        let diag = url::ParseError::InvalidPort.to_string();
        assert!(matches!(err, TargetError::Invalid(_)));
        assert!(err.to_string().contains(&diag), "got: {}", err);
    }
}
