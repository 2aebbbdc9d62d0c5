//! Herakles Redis Exporter Library
//!
//! This library contains the request-serving core of the exporter: the
//! shared state, the HTTP handlers and the pieces a scrape request is built
//! from. The binary adds CLI/config handling, logging and the listener.
//!
//! # Features
//!
//! - **Ad-hoc scrapes**: `/scrape?target=...` builds a collector and a registry
//!   for one request only, so concurrent scrapes never share state
//! - **Closed override set**: five key options can be overridden per request,
//!   nothing else
//! - **Credential hygiene**: user-info is stripped from targets before use
//! - **Constant-time basic auth**: SHA-256 digests compared with `subtle`
//! - **Hot password reload**: the per-target password map is swapped atomically
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use herakles_redis_exporter::{build_router, BuildInfo, ExporterState, Options, RedisCollectorFactory};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let state = ExporterState::new(Options::default(), BuildInfo::current(), Arc::new(RedisCollectorFactory))?;
//! let app = build_router(Arc::new(state));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:9121").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod collector;
pub mod credentials;
pub mod error;
pub mod handlers;
pub mod options;
pub mod redis;
pub mod render;
pub mod state;
pub mod target;

// Re-export main types for convenience
pub use auth::{BasicAuthCredentials, BasicAuthGate};
pub use collector::{register_adhoc, CollectorError, CollectorFactory};
pub use credentials::{load_password_file, CredentialError, CredentialMap, CredentialStore};
pub use error::ExporterError;
pub use handlers::build_router;
pub use options::{Options, ScrapeOverrides};
pub use redis::{register_default_instance, RedisCollector, RedisCollectorFactory};
pub use render::{render_registry, serve_registry};
pub use state::{BuildInfo, ExporterState, SharedState};
pub use target::{resolve_target, Target, TargetError};
