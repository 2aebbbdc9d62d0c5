//! Configuration management for herakles-redis-exporter.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats.

use crate::cli::{Args, ConfigFormat, LogLevel};
use herakles_redis_exporter::handlers::RESERVED_PATHS;
use herakles_redis_exporter::options::{
    DEFAULT_CHECK_KEYS_BATCH_SIZE, DEFAULT_CONNECTION_TIMEOUT, DEFAULT_METRICS_PATH,
    DEFAULT_NAMESPACE,
};
use herakles_redis_exporter::{BasicAuthCredentials, CredentialMap, Options};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9121;

/// Enhanced configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,
    #[serde(alias = "web-telemetry-path")]
    pub metrics_path: Option<String>,

    // Logging
    #[serde(alias = "log-level")]
    pub log_level: Option<String>,

    // Redis connection
    #[serde(alias = "redis-addr")]
    pub redis_addr: Option<String>,
    #[serde(alias = "redis-user")]
    pub redis_user: Option<String>,
    #[serde(alias = "redis-password")]
    pub redis_password: Option<String>,
    #[serde(alias = "redis-password-file")]
    pub redis_password_file: Option<PathBuf>,
    #[serde(alias = "connection-timeout-ms")]
    pub connection_timeout_ms: Option<u64>,

    // Metrics collection
    pub namespace: Option<String>,
    #[serde(alias = "check-keys")]
    pub check_keys: Option<String>,
    #[serde(alias = "check-single-keys")]
    pub check_single_keys: Option<String>,
    #[serde(alias = "check-streams")]
    pub check_streams: Option<String>,
    #[serde(alias = "check-single-streams")]
    pub check_single_streams: Option<String>,
    #[serde(alias = "count-keys")]
    pub count_keys: Option<String>,
    #[serde(alias = "check-keys-batch-size")]
    pub check_keys_batch_size: Option<usize>,

    // HTTP basic auth
    #[serde(alias = "basic-auth-username")]
    pub basic_auth_username: Option<String>,
    #[serde(alias = "basic-auth-password")]
    pub basic_auth_password: Option<String>,

    // TLS/SSL Configuration
    #[serde(alias = "enable-tls")]
    pub enable_tls: Option<bool>,
    #[serde(alias = "tls-cert-path")]
    pub tls_cert_path: Option<String>,
    #[serde(alias = "tls-key-path")]
    pub tls_key_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: Some(DEFAULT_PORT),
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            metrics_path: Some(DEFAULT_METRICS_PATH.to_string()),
            log_level: Some("info".into()),
            redis_addr: None,
            redis_user: None,
            redis_password: None,
            redis_password_file: None,
            connection_timeout_ms: Some(DEFAULT_CONNECTION_TIMEOUT.as_millis() as u64),
            namespace: Some(DEFAULT_NAMESPACE.to_string()),
            check_keys: None,
            check_single_keys: None,
            check_streams: None,
            check_single_streams: None,
            count_keys: None,
            check_keys_batch_size: Some(DEFAULT_CHECK_KEYS_BATCH_SIZE),
            basic_auth_username: None,
            basic_auth_password: None,
            enable_tls: Some(false),
            tls_cert_path: None,
            tls_key_path: None,
        }
    }
}

impl Config {
    /// Effective log level; unparseable names fall back to `info`, they are
    /// rejected by [`validate_effective_config`] before logging starts.
    pub fn log_level(&self) -> LogLevel {
        self.log_level
            .as_deref()
            .and_then(|name| LogLevel::parse(name).ok())
            .unwrap_or(LogLevel::Info)
    }

    /// Builds the exporter options from the effective configuration.
    ///
    /// The password map is passed in separately since loading it touches
    /// the filesystem.
    pub fn to_options(&self, password_map: CredentialMap) -> Options {
        let defaults = Options::default();
        let basic_auth = match (&self.basic_auth_username, &self.basic_auth_password) {
            (Some(user), Some(pass)) => Some(BasicAuthCredentials::new(user, pass)),
            _ => None,
        };

        Options {
            namespace: self.namespace.clone().unwrap_or(defaults.namespace),
            check_keys: self.check_keys.clone().unwrap_or_default(),
            check_single_keys: self.check_single_keys.clone().unwrap_or_default(),
            check_streams: self.check_streams.clone().unwrap_or_default(),
            check_single_streams: self.check_single_streams.clone().unwrap_or_default(),
            count_keys: self.count_keys.clone().unwrap_or_default(),
            check_keys_batch_size: self
                .check_keys_batch_size
                .unwrap_or(defaults.check_keys_batch_size),
            metrics_path: self.metrics_path.clone().unwrap_or(defaults.metrics_path),
            registry: defaults.registry,
            password_map: Arc::new(password_map),
            password_file: self.redis_password_file.clone(),
            redis_user: self.redis_user.clone(),
            redis_password: self.redis_password.clone(),
            basic_auth,
            connection_timeout: self
                .connection_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.connection_timeout),
        }
    }
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    // Metrics path must be routable and must not shadow another endpoint
    if let Some(path) = cfg.metrics_path.as_deref() {
        if !path.starts_with('/') {
            return Err(format!("metrics_path must start with '/', got '{}'", path).into());
        }
        if RESERVED_PATHS.contains(&path) {
            return Err(format!("metrics_path '{}' collides with a built-in endpoint", path).into());
        }
    }

    // Basic auth: both or neither
    match (
        cfg.basic_auth_username.as_deref(),
        cfg.basic_auth_password.as_deref(),
    ) {
        (Some(_), None) => {
            return Err("basic_auth_username is set but basic_auth_password is not".into());
        }
        (None, Some(_)) => {
            return Err("basic_auth_password is set but basic_auth_username is not".into());
        }
        (Some(""), Some(_)) => {
            return Err("basic_auth_username must not be empty".into());
        }
        _ => {}
    }

    if let Some(level) = cfg.log_level.as_deref() {
        LogLevel::parse(level)?;
    }

    if cfg.check_keys_batch_size == Some(0) {
        return Err("check_keys_batch_size must be greater than 0".into());
    }

    if cfg.connection_timeout_ms == Some(0) {
        return Err("connection_timeout_ms must be greater than 0".into());
    }

    // TLS validation
    if cfg.enable_tls.unwrap_or(false) {
        let cert_path = cfg.tls_cert_path.as_deref();
        let key_path = cfg.tls_key_path.as_deref();

        match (cert_path, key_path) {
            (None, None) => {
                return Err(
                    "TLS is enabled but neither tls_cert_path nor tls_key_path are set".into(),
                );
            }
            (Some(_), None) => {
                return Err("TLS is enabled but tls_key_path is not set".into());
            }
            (None, Some(_)) => {
                return Err("TLS is enabled but tls_cert_path is not set".into());
            }
            (Some(cert), Some(key)) => {
                check_pem_file("certificate", cert)?;
                check_pem_file("private key", key)?;
            }
        }
    }

    Ok(())
}

fn check_pem_file(kind: &str, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let p = Path::new(path);
    if !p.exists() {
        return Err(format!("TLS {} file not found: {}", kind, path).into());
    }
    match fs::metadata(p) {
        Ok(meta) if meta.len() == 0 => Err(format!("TLS {} file is empty: {}", kind, path).into()),
        Err(e) => Err(format!("TLS {} file is not readable: {} ({})", kind, path, e).into()),
        Ok(_) => Ok(()),
    }
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    // Override with CLI args
    if let Some(bind_ip) = args.bind {
        config.bind = Some(bind_ip.to_string());
    }
    if let Some(cli_port) = args.port {
        config.port = Some(cli_port);
    }
    if let Some(path) = &args.web_telemetry_path {
        config.metrics_path = Some(path.clone());
    }
    if let Some(level) = args.log_level {
        config.log_level = Some(level.as_str().to_string());
    }

    // Redis connection
    override_opt(&mut config.redis_addr, &args.redis_addr);
    override_opt(&mut config.redis_user, &args.redis_user);
    override_opt(&mut config.redis_password, &args.redis_password);
    override_opt(&mut config.redis_password_file, &args.redis_password_file);
    override_opt(&mut config.connection_timeout_ms, &args.connection_timeout_ms);

    // Metrics collection
    override_opt(&mut config.namespace, &args.namespace);
    override_opt(&mut config.check_keys, &args.check_keys);
    override_opt(&mut config.check_single_keys, &args.check_single_keys);
    override_opt(&mut config.check_streams, &args.check_streams);
    override_opt(&mut config.check_single_streams, &args.check_single_streams);
    override_opt(&mut config.count_keys, &args.count_keys);
    override_opt(&mut config.check_keys_batch_size, &args.check_keys_batch_size);

    // Basic auth
    override_opt(&mut config.basic_auth_username, &args.basic_auth_username);
    override_opt(&mut config.basic_auth_password, &args.basic_auth_password);

    // TLS configuration: CLI wins if provided
    if args.enable_tls {
        config.enable_tls = Some(true);
    }
    if let Some(cert_path) = &args.tls_cert {
        config.tls_cert_path = Some(cert_path.to_string_lossy().to_string());
    }
    if let Some(key_path) = &args.tls_key {
        config.tls_key_path = Some(key_path.to_string_lossy().to_string());
    }

    Ok(config)
}

fn override_opt<T: Clone>(field: &mut Option<T>, cli: &Option<T>) {
    if cli.is_some() {
        field.clone_from(cli);
    }
}

/// Enhanced configuration loading with multiple format support
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            // Try default locations
            let defaults = [
                "/etc/herakles/redis-exporter.yaml",
                "/etc/herakles/redis-exporter.yml",
                "/etc/herakles/redis-exporter.json",
                "./herakles-redis-exporter.yaml",
                "./herakles-redis-exporter.yml",
                "./herakles-redis-exporter.json",
            ];

            match defaults.iter().find(|p| Path::new(p).exists()) {
                Some(p) => PathBuf::from(p),
                None => return Ok(Config::default()),
            }
        }
    };

    if !path.exists() {
        return Err(format!("config file not found: {}", path.display()).into());
    }

    let content = fs::read_to_string(&path)?;

    // Fields missing from the file keep their defaults
    let mut config = Config::default();
    let file: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => {
            let config: Config = serde_json::from_str(&content)?;
            info!("Loaded JSON configuration from: {}", path.display());
            config
        }
        Some("toml") => {
            let config: Config = toml::from_str(&content)?;
            info!("Loaded TOML configuration from: {}", path.display());
            config
        }
        _ => {
            // Default to YAML
            let config: Config = serde_yaml::from_str(&content)?;
            info!("Loaded YAML configuration from: {}", path.display());
            config
        }
    };
    config.merge_from(file);
    Ok(config)
}

impl Config {
    fn merge_from(&mut self, other: Config) {
        macro_rules! take {
            ($($field:ident),* $(,)?) => {
                $( if other.$field.is_some() { self.$field = other.$field; } )*
            };
        }
        take!(
            port,
            bind,
            metrics_path,
            log_level,
            redis_addr,
            redis_user,
            redis_password,
            redis_password_file,
            connection_timeout_ms,
            namespace,
            check_keys,
            check_single_keys,
            check_streams,
            check_single_streams,
            count_keys,
            check_keys_batch_size,
            basic_auth_username,
            basic_auth_password,
            enable_tls,
            tls_cert_path,
            tls_key_path,
        );
    }
}

/// Shows configuration in requested format
///
/// Secrets are masked in the output.
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    let mut shown = config.clone();
    for secret in [&mut shown.redis_password, &mut shown.basic_auth_password] {
        if secret.is_some() {
            *secret = Some("<redacted>".to_string());
        }
    }

    let output = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(&shown)?,
        ConfigFormat::Toml => toml::to_string_pretty(&shown)?,
        ConfigFormat::Yaml => serde_yaml::to_string(&shown)?,
    };

    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_effective_config(&Config::default()).is_ok());
    }

    #[test]
    fn metrics_path_must_be_absolute_and_free() {
        let mut cfg = Config {
            metrics_path: Some("metrics".into()),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());

        cfg.metrics_path = Some("/scrape".into());
        assert!(validate_effective_config(&cfg).is_err());

        cfg.metrics_path = Some("/prom".into());
        assert!(validate_effective_config(&cfg).is_ok());
    }

    #[test]
    fn basic_auth_requires_both_halves() {
        let cfg = Config {
            basic_auth_username: Some("admin".into()),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());

        let cfg = Config {
            basic_auth_password: Some("secret".into()),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let cfg = Config {
            check_keys_batch_size: Some(0),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn tls_without_files_is_rejected() {
        let cfg = Config {
            enable_tls: Some(true),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn partial_yaml_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "port: 9999\ncheck-keys: \"db1=user:*\"").unwrap();

        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.port, Some(9999));
        assert_eq!(cfg.check_keys.as_deref(), Some("db1=user:*"));
        assert_eq!(cfg.namespace.as_deref(), Some(DEFAULT_NAMESPACE));
        assert_eq!(cfg.metrics_path.as_deref(), Some(DEFAULT_METRICS_PATH));
    }

    #[test]
    fn log_level_from_file_unless_given_on_cli() {
        use clap::Parser;

        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "log_level: debug").unwrap();
        let path = file.path().to_str().unwrap();

        let args = Args::parse_from(["herakles-redis-exporter", "--config", path]);
        let cfg = resolve_config(&args).unwrap();
        assert_eq!(cfg.log_level(), LogLevel::Debug);

        let args = Args::parse_from([
            "herakles-redis-exporter",
            "--config",
            path,
            "--log-level",
            "off",
        ]);
        let cfg = resolve_config(&args).unwrap();
        assert_eq!(cfg.log_level(), LogLevel::Off);

        let args = Args::parse_from(["herakles-redis-exporter", "--no-config"]);
        assert_eq!(resolve_config(&args).unwrap().log_level(), LogLevel::Info);
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        let cfg = Config {
            log_level: Some("verbose".into()),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_err());

        let cfg = Config {
            log_level: Some("WARN".into()),
            ..Config::default()
        };
        assert!(validate_effective_config(&cfg).is_ok());
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        assert!(load_config(Some(Path::new("/nonexistent/exporter.yaml"))).is_err());
    }

    #[test]
    fn options_carry_basic_auth_only_when_complete() {
        let cfg = Config {
            basic_auth_username: Some("admin".into()),
            basic_auth_password: Some("secret".into()),
            check_keys: Some("foo:*".into()),
            ..Config::default()
        };
        let opts = cfg.to_options(CredentialMap::new());
        assert!(opts.basic_auth.is_some());
        assert_eq!(opts.check_keys, "foo:*");
        assert_eq!(opts.connection_timeout, DEFAULT_CONNECTION_TIMEOUT);

        let opts = Config::default().to_options(CredentialMap::new());
        assert!(opts.basic_auth.is_none());
    }
}
