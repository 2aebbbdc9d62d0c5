//! Exporter options and per-request overrides.
//!
//! [`Options`] is a plain value: cloning it yields an independent copy. The
//! shared instance lives in [`crate::state::ExporterState`]; scrape requests
//! work on a clone with a closed set of fields replaced from the query
//! string ([`ScrapeOverrides`]) and a fresh registry of their own.

use prometheus::Registry;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::BasicAuthCredentials;
use crate::credentials::CredentialMap;

pub const DEFAULT_NAMESPACE: &str = "redis";
pub const DEFAULT_METRICS_PATH: &str = "/metrics";
pub const DEFAULT_CHECK_KEYS_BATCH_SIZE: usize = 1000;
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(15);

/// Collector and HTTP options.
#[derive(Clone)]
pub struct Options {
    /// Metric name prefix.
    pub namespace: String,
    /// Comma separated `[db<N>=]<pattern>` list, keys found via SCAN.
    pub check_keys: String,
    /// Comma separated `[db<N>=]<key>` list, looked up directly.
    pub check_single_keys: String,
    pub check_streams: String,
    pub check_single_streams: String,
    /// Comma separated `[db<N>=]<pattern>` list, matching keys are counted.
    pub count_keys: String,
    pub check_keys_batch_size: usize,
    pub metrics_path: String,
    /// Registry collectors built from these options register into.
    pub registry: Registry,
    /// Per-target passwords, replaced as a whole on reload.
    pub password_map: Arc<CredentialMap>,
    pub password_file: Option<PathBuf>,
    pub redis_user: Option<String>,
    pub redis_password: Option<String>,
    /// Exporter-level HTTP basic auth identity.
    pub basic_auth: Option<BasicAuthCredentials>,
    pub connection_timeout: Duration,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            check_keys: String::new(),
            check_single_keys: String::new(),
            check_streams: String::new(),
            check_single_streams: String::new(),
            count_keys: String::new(),
            check_keys_batch_size: DEFAULT_CHECK_KEYS_BATCH_SIZE,
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
            registry: Registry::new(),
            password_map: Arc::new(CredentialMap::new()),
            password_file: None,
            redis_user: None,
            redis_password: None,
            basic_auth: None,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
        }
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("namespace", &self.namespace)
            .field("check_keys", &self.check_keys)
            .field("check_single_keys", &self.check_single_keys)
            .field("check_streams", &self.check_streams)
            .field("check_single_streams", &self.check_single_streams)
            .field("count_keys", &self.count_keys)
            .field("check_keys_batch_size", &self.check_keys_batch_size)
            .field("metrics_path", &self.metrics_path)
            .field("password_map", &self.password_map)
            .field("password_file", &self.password_file)
            .field("redis_user", &self.redis_user)
            .field("redis_password", &self.redis_password.as_ref().map(|_| "<redacted>"))
            .field("basic_auth", &self.basic_auth)
            .field("connection_timeout", &self.connection_timeout)
            .finish()
    }
}

/// Query parameters a scrape request may use to override [`Options`].
///
/// This is the complete list; nothing else in the options can be changed
/// from a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ScrapeOverrides {
    #[serde(rename = "check-keys")]
    pub check_keys: Option<String>,
    #[serde(rename = "check-single-keys")]
    pub check_single_keys: Option<String>,
    #[serde(rename = "check-streams")]
    pub check_streams: Option<String>,
    #[serde(rename = "check-single-streams")]
    pub check_single_streams: Option<String>,
    #[serde(rename = "count-keys")]
    pub count_keys: Option<String>,
}

impl ScrapeOverrides {
    /// Overwrites the matching fields of `options` for every parameter that
    /// is present and non-empty.
    pub fn apply_to(&self, options: &mut Options) {
        override_field(&mut options.check_keys, &self.check_keys);
        override_field(&mut options.check_single_keys, &self.check_single_keys);
        override_field(&mut options.check_streams, &self.check_streams);
        override_field(&mut options.check_single_streams, &self.check_single_streams);
        override_field(&mut options.count_keys, &self.count_keys);
    }
}

fn override_field(field: &mut String, value: &Option<String>) {
    if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
        *field = v.to_string();
    }
}

/// Builds the options for one ad-hoc scrape from a snapshot of the shared
/// options. The result owns a new, empty registry.
pub fn merge_scrape_options(base: Options, overrides: &ScrapeOverrides) -> Options {
    let mut options = base;
    overrides.apply_to(&mut options);
    options.registry = Registry::new();
    options
}
