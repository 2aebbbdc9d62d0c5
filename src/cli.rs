//! CLI arguments for herakles-redis-exporter.
//!
//! This module defines the command-line interface structure using the clap library.

use clap::{Parser, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;
use tracing::level_filters::LevelFilter;

/// Log level options for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Name as written on the command line and in config files.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Subscriber filter; `Off` disables every event.
    pub fn filter(&self) -> LevelFilter {
        match self {
            LogLevel::Off => LevelFilter::OFF,
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }

    /// Parses a level name, ignoring case.
    pub fn parse(name: &str) -> Result<Self, String> {
        <Self as ValueEnum>::from_str(name.trim(), true).map_err(|_| {
            format!(
                "invalid log_level '{}', expected one of off, error, warn, info, debug, trace",
                name
            )
        })
    }
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-redis-exporter",
    about = "Prometheus exporter for Redis with ad-hoc per-target scraping",
    long_about = "Prometheus exporter for Redis with ad-hoc per-target scraping.\n\n\
                  Serves metrics for a configured Redis instance on the metrics path and \
                  scrapes arbitrary targets on demand via /scrape?target=<host:port>.",
    author = "Michael Moll <exporter@herakles.now> - Herakles",
    version,
    after_help = "Project: https://github.com/cansp-dev/herakles-redis-exporter — More info: https://www.herakles.now — Support: exporter@herakles.now"
)]
pub struct Args {
    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level (overrides log_level from the config file; default: info)
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Redis instance served on the metrics path (e.g. redis://localhost:6379)
    #[arg(long)]
    pub redis_addr: Option<String>,

    /// Username used to authenticate against Redis
    #[arg(long)]
    pub redis_user: Option<String>,

    /// Password used when no per-target password is known
    #[arg(long)]
    pub redis_password: Option<String>,

    /// JSON file mapping targets to passwords (reloadable via /-/reload)
    #[arg(long)]
    pub redis_password_file: Option<PathBuf>,

    /// Namespace (prefix) for all metrics
    #[arg(long)]
    pub namespace: Option<String>,

    /// Path under which metrics are exposed
    #[arg(long)]
    pub web_telemetry_path: Option<String>,

    /// Comma separated [db<N>=]<pattern> list of keys to export sizes for (SCAN)
    #[arg(long)]
    pub check_keys: Option<String>,

    /// Comma separated [db<N>=]<key> list of keys to export sizes for
    #[arg(long)]
    pub check_single_keys: Option<String>,

    /// Comma separated [db<N>=]<pattern> list of streams to export lengths for (SCAN)
    #[arg(long)]
    pub check_streams: Option<String>,

    /// Comma separated [db<N>=]<stream> list of streams to export lengths for
    #[arg(long)]
    pub check_single_streams: Option<String>,

    /// Comma separated [db<N>=]<pattern> list of patterns to count keys for
    #[arg(long)]
    pub count_keys: Option<String>,

    /// COUNT hint passed to SCAN
    #[arg(long)]
    pub check_keys_batch_size: Option<usize>,

    /// Connection and command timeout towards Redis in milliseconds
    #[arg(long)]
    pub connection_timeout_ms: Option<u64>,

    /// Username for HTTP basic auth on the exporter endpoints
    #[arg(long)]
    pub basic_auth_username: Option<String>,

    /// Password for HTTP basic auth on the exporter endpoints
    #[arg(long)]
    pub basic_auth_password: Option<String>,

    /// Enable TLS/SSL for HTTPS
    #[arg(long)]
    pub enable_tls: bool,

    /// Path to TLS certificate file (PEM format)
    #[arg(long)]
    pub tls_cert: Option<PathBuf>,

    /// Path to TLS private key file (PEM format)
    #[arg(long)]
    pub tls_key: Option<PathBuf>,
}
