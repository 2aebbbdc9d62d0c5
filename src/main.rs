//! herakles-redis-exporter - version 0.1.0
//!
//! Prometheus exporter for Redis with ad-hoc per-target scraping.
//! This is the main entry point that resolves configuration and runs the server.

mod cli;
mod config;

use anyhow::Context;
use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use herakles_redis_exporter::{
    build_router, load_password_file, register_default_instance, resolve_target, BuildInfo,
    CredentialMap, ExporterState, RedisCollectorFactory,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tracing::{error, info, warn};

use cli::Args;
use config::{
    resolve_config, show_config, validate_effective_config, Config, DEFAULT_BIND_ADDR, DEFAULT_PORT,
};

/// Initializes tracing logging subsystem with configured log level.
fn setup_logging(config: &Config) {
    let level = config.log_level();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level.filter())
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }

    info!("Logging initialized with level: {:?}", level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Loads the target password file named in the config, if any.
fn initial_password_map(config: &Config) -> anyhow::Result<CredentialMap> {
    match &config.redis_password_file {
        Some(path) => {
            let map = load_password_file(path)
                .with_context(|| format!("loading target passwords from {}", path.display()))?;
            info!(
                "Loaded {} target passwords from {}",
                map.len(),
                path.display()
            );
            Ok(map)
        }
        None => Ok(CredentialMap::new()),
    }
}

/// Serves the configured instance on the metrics path.
fn export_configured_instance(state: &ExporterState, addr: &str) -> anyhow::Result<()> {
    let target = resolve_target(Some(addr)).context("invalid redis_addr")?;
    register_default_instance(state, &target)
        .with_context(|| format!("building collector for {}", target))?;
    info!("Exporting {} on {}", target, state.metrics_path());
    Ok(())
}

/// Waits for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    let config = load_validated_config(&args)?;

    setup_logging(&config);

    let password_map = initial_password_map(&config)?;
    let options = config.to_options(password_map);

    let state = Arc::new(ExporterState::new(
        options,
        BuildInfo::current(),
        Arc::new(RedisCollectorFactory),
    )?);

    if let Some(addr) = config.redis_addr.as_deref() {
        export_configured_instance(&state, addr)?;
    } else {
        warn!("No redis_addr configured, metrics path serves exporter metrics only");
    }

    let app = build_router(state);

    let bind_ip_str = config.bind.as_deref().unwrap_or(DEFAULT_BIND_ADDR);
    let port = config.port.unwrap_or(DEFAULT_PORT);
    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;

    let tls_paths = match (
        config.enable_tls.unwrap_or(false),
        config.tls_cert_path.as_deref(),
        config.tls_key_path.as_deref(),
    ) {
        (true, Some(cert), Some(key)) => Some((cert, key)),
        _ => None,
    };

    if let Some((cert_path, key_path)) = tls_paths {
        info!("Loading TLS certificate from: {}", cert_path);
        info!("Loading TLS private key from: {}", key_path);

        let tls_config = RustlsConfig::from_pem_file(cert_path, key_path)
            .await
            .map_err(|e| {
                error!("Failed to load TLS configuration: {}", e);
                e
            })?;

        info!(
            "herakles-redis-exporter listening on https://{}:{}",
            bind_ip_str, port
        );

        let server = axum_server::bind_rustls(addr, tls_config).serve(app.into_make_service());

        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("Server error: {}", e);
                    return Err(e.into());
                }
            }
            _ = shutdown_signal() => {
                info!("Shutdown signal received, exiting...");
            }
        }
    } else {
        let listener = TcpListener::bind(addr).await?;
        info!(
            "herakles-redis-exporter listening on http://{}:{}",
            bind_ip_str, port
        );

        let server = axum::serve(listener, app);

        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("Server error: {}", e);
                    return Err(e.into());
                }
            }
            _ = shutdown_signal() => {
                info!("Shutdown signal received, exiting...");
            }
        }
    }

    info!("herakles-redis-exporter stopped gracefully");
    Ok(())
}
