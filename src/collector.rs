//! Construction of ad-hoc collectors.
//!
//! A scrape request gets its own collector, built against the resolved
//! target and the request's merged options, and registered into the
//! request's own registry. Nothing is cached or retried.

use prometheus::core::Collector;

use crate::options::Options;
use crate::target::Target;

/// Errors raised while building or registering a collector.
#[derive(Debug, thiserror::Error)]
pub enum CollectorError {
    #[error("unsupported target scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("target '{0}' has no host or socket path")]
    MissingEndpoint(String),

    #[error("invalid {option} value '{value}': {reason}")]
    InvalidOption {
        option: &'static str,
        value: String,
        reason: String,
    },

    #[error("failed to create metric: {0}")]
    Metric(#[source] prometheus::Error),

    #[error("failed to register collector: {0}")]
    Registration(#[source] prometheus::Error),
}

/// Builds a collector bound to one target.
///
/// Implementations must not touch `options.registry`; registration is done by
/// [`register_adhoc`] once the collector is fully built.
pub trait CollectorFactory: Send + Sync {
    fn build(
        &self,
        target: &Target,
        options: &Options,
    ) -> Result<Box<dyn Collector>, CollectorError>;
}

/// Builds exactly one collector and registers it into `options.registry`.
///
/// Either the collector ends up registered or the registry is left as it
/// was: construction has no side effects and registration is a single call.
pub fn register_adhoc(
    factory: &dyn CollectorFactory,
    target: &Target,
    options: &Options,
) -> Result<(), CollectorError> {
    let collector = factory.build(target, options)?;
    options
        .registry
        .register(collector)
        .map_err(CollectorError::Registration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::resolve_target;
    use prometheus::{Gauge, Opts};

    struct FixedName(&'static str);

    impl CollectorFactory for FixedName {
        fn build(&self, target: &Target, _: &Options) -> Result<Box<dyn Collector>, CollectorError> {
            let gauge = Gauge::with_opts(
                Opts::new(self.0, "test gauge").const_label("target", target.as_str()),
            )
            .map_err(CollectorError::Metric)?;
            Ok(Box::new(gauge))
        }
    }

    struct Failing;

    impl CollectorFactory for Failing {
        fn build(&self, target: &Target, _: &Options) -> Result<Box<dyn Collector>, CollectorError> {
            Err(CollectorError::UnsupportedScheme(target.scheme().to_string()))
        }
    }

    #[test]
    fn test_register_adhoc_registers_one_collector() {
        let options = Options::default();
        let target = resolve_target(Some("localhost:6379")).unwrap();

        register_adhoc(&FixedName("adhoc_up"), &target, &options).unwrap();
        assert_eq!(options.registry.gather().len(), 1);
    }

    #[test]
    fn test_failed_build_leaves_registry_empty() {
        let options = Options::default();
        let target = resolve_target(Some("localhost:6379")).unwrap();

        assert!(register_adhoc(&Failing, &target, &options).is_err());
        assert!(options.registry.gather().is_empty());
    }

    #[test]
    fn test_invalid_metric_name_is_construction_error() {
        let options = Options::default();
        let target = resolve_target(Some("localhost:6379")).unwrap();

        let err = register_adhoc(&FixedName("not a metric name"), &target, &options).unwrap_err();
        assert!(matches!(err, CollectorError::Metric(_)));
        assert!(options.registry.gather().is_empty());
    }
}
