//! Shared exporter state.
//!
//! This module defines the process-wide state handed to every HTTP handler:
//! the base options behind a single read/write lock, build metadata, the
//! collector factory and the exporter's own counters.

use prometheus::{IntCounter, IntGaugeVec, Opts, Registry};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use std::time::Instant;
use tracing::info;

use crate::auth::BasicAuthGate;
use crate::collector::CollectorFactory;
use crate::credentials::{CredentialMap, CredentialStore};
use crate::options::{merge_scrape_options, Options, ScrapeOverrides};

/// Type alias for shared exporter state.
pub type SharedState = Arc<ExporterState>;

/// Version and build metadata baked in at compile time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: &'static str,
    pub commit_sha: &'static str,
    pub build_date: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            commit_sha: option_env!("VERGEN_GIT_SHA").unwrap_or("unknown"),
            build_date: option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or("unknown"),
        }
    }
}

/// Process-wide state shared across requests.
pub struct ExporterState {
    options: RwLock<Options>,
    /// Live view of the password map for long-lived collectors.
    credentials: CredentialStore,
    pub build_info: BuildInfo,
    pub factory: Arc<dyn CollectorFactory>,
    pub target_scrape_request_errors: IntCounter,
    pub password_reload_errors: IntCounter,
    pub start_time: Instant,
}

impl ExporterState {
    /// Creates the state and registers the exporter's own metrics into the
    /// default registry carried by `options`.
    pub fn new(
        options: Options,
        build_info: BuildInfo,
        factory: Arc<dyn CollectorFactory>,
    ) -> Result<Self, prometheus::Error> {
        let namespace = options.namespace.clone();

        let target_scrape_request_errors = IntCounter::with_opts(
            Opts::new(
                "target_scrape_request_errors_total",
                "Errors in requests to the exporter's /scrape endpoint",
            )
            .namespace(namespace.clone())
            .subsystem("exporter"),
        )?;
        let password_reload_errors = IntCounter::with_opts(
            Opts::new(
                "password_reload_errors_total",
                "Failed attempts to reload the target password file",
            )
            .namespace(namespace.clone())
            .subsystem("exporter"),
        )?;
        let build_info_gauge = IntGaugeVec::new(
            Opts::new("build_info", "Exporter build information")
                .namespace(namespace)
                .subsystem("exporter"),
            &["version", "commit_sha", "build_date"],
        )?;
        build_info_gauge
            .with_label_values(&[build_info.version, build_info.commit_sha, build_info.build_date])
            .set(1);

        options
            .registry
            .register(Box::new(target_scrape_request_errors.clone()))?;
        options
            .registry
            .register(Box::new(password_reload_errors.clone()))?;
        options.registry.register(Box::new(build_info_gauge))?;

        let credentials = CredentialStore::new(Arc::clone(&options.password_map));

        Ok(Self {
            options: RwLock::new(options),
            credentials,
            build_info,
            factory,
            target_scrape_request_errors,
            password_reload_errors,
            start_time: Instant::now(),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Options> {
        self.options.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the shared options, taken under the read lock.
    pub fn options_snapshot(&self) -> Options {
        self.read().clone()
    }

    /// Options for one ad-hoc scrape: shared options with `overrides`
    /// applied and a new registry. The lock is released before merging.
    pub fn scrape_options(&self, overrides: &ScrapeOverrides) -> Options {
        let base = self.options_snapshot();
        merge_scrape_options(base, overrides)
    }

    pub fn default_registry(&self) -> Registry {
        self.read().registry.clone()
    }

    pub fn metrics_path(&self) -> String {
        self.read().metrics_path.clone()
    }

    pub fn password_file(&self) -> Option<PathBuf> {
        self.read().password_file.clone()
    }

    pub fn password_map(&self) -> Arc<CredentialMap> {
        Arc::clone(&self.read().password_map)
    }

    /// Handle that follows every [`replace_password_map`](Self::replace_password_map).
    pub fn credentials(&self) -> CredentialStore {
        self.credentials.clone()
    }

    pub fn basic_auth_gate(&self) -> Option<Arc<BasicAuthGate>> {
        self.read()
            .basic_auth
            .as_ref()
            .map(|creds| Arc::new(BasicAuthGate::new(creds)))
    }

    /// Swaps in a fully loaded credential map. The write lock is held only
    /// for the pointer swap.
    pub fn replace_password_map(&self, map: CredentialMap) {
        let map = Arc::new(map);
        let count = map.len();
        {
            let mut options = self.options.write().unwrap_or_else(PoisonError::into_inner);
            options.password_map = Arc::clone(&map);
            self.credentials.replace(map);
        }
        info!("Target password map replaced ({} entries)", count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::CollectorError;
    use crate::target::Target;
    use prometheus::core::Collector;

    struct NoopFactory;

    impl CollectorFactory for NoopFactory {
        fn build(&self, target: &Target, _: &Options) -> Result<Box<dyn Collector>, CollectorError> {
            Err(CollectorError::MissingEndpoint(target.to_string()))
        }
    }

    fn state() -> ExporterState {
        ExporterState::new(Options::default(), BuildInfo::current(), Arc::new(NoopFactory)).unwrap()
    }

    #[test]
    fn test_self_metrics_registered() {
        let state = state();
        state.target_scrape_request_errors.inc();

        let body = String::from_utf8(crate::render::render_registry(&state.default_registry()).body)
            .unwrap();
        assert!(body.contains("redis_exporter_target_scrape_request_errors_total 1"));
        assert!(body.contains("redis_exporter_build_info{"));
    }

    #[test]
    fn test_replace_password_map_swaps_whole_map() {
        let state = state();
        let before = state.password_map();
        assert!(before.is_empty());

        let map: CredentialMap = [("redis://a:6379".to_string(), "pw".to_string())]
            .into_iter()
            .collect();
        state.replace_password_map(map);

        let after = state.password_map();
        assert_eq!(after.get("redis://a:6379"), Some("pw"));
        assert_eq!(state.credentials().snapshot().get("redis://a:6379"), Some("pw"));
        // Readers holding the old snapshot keep seeing the old map.
        assert!(before.is_empty());
    }

    #[test]
    fn test_scrape_options_do_not_touch_shared_options() {
        let state = state();
        let overrides = ScrapeOverrides {
            check_keys: Some("foo:*".into()),
            ..Default::default()
        };

        let merged = state.scrape_options(&overrides);
        assert_eq!(merged.check_keys, "foo:*");
        assert_eq!(state.options_snapshot().check_keys, "");
        assert!(merged.registry.gather().is_empty());
    }
}
