//! Built-in Redis collector.
//!
//! [`RedisCollectorFactory`] validates everything up front (scheme, key
//! options, metric descriptors) so that construction either fully succeeds
//! or fails without side effects. The collector connects to Redis only when
//! its registry is gathered, once per gather.

pub mod client;
pub mod info;
pub mod keys;

use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, GaugeVec, Opts};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::collector::{CollectorError, CollectorFactory};
use crate::credentials::CredentialStore;
use crate::options::Options;
use crate::state::ExporterState;
use crate::target::Target;
use client::{ClientError, Connection};
use info::{parse_info, InfoSnapshot};
use keys::{parse_key_specs, KeySpec};

/// Port used when the target does not name one.
pub const DEFAULT_REDIS_PORT: u16 = 6379;

const NO_LABELS: [&str; 0] = [];

/// Numeric `INFO` fields exported as gauges: (field, metric name, help).
const INFO_GAUGES: &[(&str, &str, &str)] = &[
    ("uptime_in_seconds", "uptime_in_seconds", "Seconds since the server started"),
    ("connected_clients", "connected_clients", "Number of client connections"),
    ("blocked_clients", "blocked_clients", "Clients pending on a blocking call"),
    ("used_memory", "memory_used_bytes", "Bytes allocated by the server"),
    ("used_memory_rss", "memory_used_rss_bytes", "Resident set size of the server"),
    ("used_memory_peak", "memory_used_peak_bytes", "Peak memory allocated by the server"),
    ("maxmemory", "memory_max_bytes", "Configured maxmemory"),
    ("mem_fragmentation_ratio", "mem_fragmentation_ratio", "RSS to used memory ratio"),
    ("total_connections_received", "connections_received_total", "Connections accepted by the server"),
    ("total_commands_processed", "commands_processed_total", "Commands processed by the server"),
    ("instantaneous_ops_per_sec", "instantaneous_ops_per_sec", "Commands processed per second"),
    ("rejected_connections", "rejected_connections_total", "Connections rejected because of maxclients"),
    ("expired_keys", "expired_keys_total", "Key expiration events"),
    ("evicted_keys", "evicted_keys_total", "Keys evicted because of maxmemory"),
    ("keyspace_hits", "keyspace_hits_total", "Successful key lookups"),
    ("keyspace_misses", "keyspace_misses_total", "Failed key lookups"),
    ("connected_slaves", "connected_slaves", "Number of connected replicas"),
    ("rdb_changes_since_last_save", "rdb_changes_since_last_save", "Changes since the last dump"),
];

/// Where the collector connects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Tcp { host: String, port: u16 },
    Unix(PathBuf),
}

impl Endpoint {
    pub fn from_target(target: &Target) -> Result<Self, CollectorError> {
        match target.scheme() {
            "redis" | "valkey" => {
                let host = target
                    .host()
                    .ok_or_else(|| CollectorError::MissingEndpoint(target.to_string()))?;
                Ok(Endpoint::Tcp {
                    host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
                    port: target.port().unwrap_or(DEFAULT_REDIS_PORT),
                })
            }
            "unix" => match target.path() {
                "" | "/" => Err(CollectorError::MissingEndpoint(target.to_string())),
                path => Ok(Endpoint::Unix(PathBuf::from(path))),
            },
            other => Err(CollectorError::UnsupportedScheme(other.to_string())),
        }
    }

    fn connect(&self, timeout: Duration) -> Result<Connection, ClientError> {
        match self {
            Endpoint::Tcp { host, port } => Connection::connect_tcp(host, *port, timeout),
            Endpoint::Unix(path) => Connection::connect_unix(path, timeout),
        }
    }
}

/// Factory for [`RedisCollector`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct RedisCollectorFactory;

impl CollectorFactory for RedisCollectorFactory {
    fn build(
        &self,
        target: &Target,
        options: &Options,
    ) -> Result<Box<dyn Collector>, CollectorError> {
        Ok(Box::new(RedisCollector::new(target, options)?))
    }
}

/// Registers the long-lived collector for the configured instance into the
/// default registry. Unlike ad-hoc collectors it follows password reloads.
pub fn register_default_instance(
    state: &ExporterState,
    target: &Target,
) -> Result<(), CollectorError> {
    let collector =
        RedisCollector::new(target, &state.options_snapshot())?.with_credentials(state.credentials());
    state
        .default_registry()
        .register(Box::new(collector))
        .map_err(CollectorError::Registration)
}

/// Key-related options parsed once at construction.
#[derive(Debug, Default)]
struct KeyChecks {
    check_keys: Vec<KeySpec>,
    check_single_keys: Vec<KeySpec>,
    check_streams: Vec<KeySpec>,
    check_single_streams: Vec<KeySpec>,
    count_keys: Vec<KeySpec>,
}

impl KeyChecks {
    fn from_options(options: &Options) -> Result<Self, CollectorError> {
        Ok(Self {
            check_keys: parse_key_specs("check-keys", &options.check_keys)?,
            check_single_keys: parse_key_specs("check-single-keys", &options.check_single_keys)?,
            check_streams: parse_key_specs("check-streams", &options.check_streams)?,
            check_single_streams: parse_key_specs(
                "check-single-streams",
                &options.check_single_streams,
            )?,
            count_keys: parse_key_specs("count-keys", &options.count_keys)?,
        })
    }
}

struct RedisMetrics {
    up: Gauge,
    scrape_duration: Gauge,
    scrape_error: Gauge,
    instance_info: GaugeVec,
    info: Vec<(&'static str, GaugeVec)>,
    db_keys: GaugeVec,
    db_keys_expiring: GaugeVec,
    key_size: GaugeVec,
    keys_count: GaugeVec,
    stream_length: GaugeVec,
}

impl RedisMetrics {
    fn new(namespace: &str) -> Result<Self, prometheus::Error> {
        let opts = |name: &str, help: &str| Opts::new(name, help).namespace(namespace.to_string());

        let mut info = Vec::with_capacity(INFO_GAUGES.len());
        for (field, name, help) in INFO_GAUGES {
            info.push((*field, GaugeVec::new(opts(*name, *help), &NO_LABELS)?));
        }

        Ok(Self {
            up: Gauge::with_opts(opts("up", "Whether the Redis instance could be scraped"))?,
            scrape_duration: Gauge::with_opts(opts(
                "exporter_last_scrape_duration_seconds",
                "The last scrape duration",
            ))?,
            scrape_error: Gauge::with_opts(opts(
                "exporter_last_scrape_error",
                "Whether the last scrape failed (1) or succeeded (0)",
            ))?,
            instance_info: GaugeVec::new(
                opts("instance_info", "Information about the Redis instance"),
                &["role", "redis_version", "redis_mode"],
            )?,
            info,
            db_keys: GaugeVec::new(opts("db_keys", "Total number of keys by DB"), &["db"])?,
            db_keys_expiring: GaugeVec::new(
                opts("db_keys_expiring", "Total number of expiring keys by DB"),
                &["db"],
            )?,
            key_size: GaugeVec::new(
                opts("key_size", "The length or size of the checked key"),
                &["db", "key"],
            )?,
            keys_count: GaugeVec::new(
                opts("keys_count", "Count of keys matching the pattern"),
                &["db", "key"],
            )?,
            stream_length: GaugeVec::new(
                opts("stream_length", "The number of elements of the stream"),
                &["db", "stream"],
            )?,
        })
    }

    fn collectors(&self) -> Vec<&dyn Collector> {
        let mut collectors: Vec<&dyn Collector> = vec![
            &self.up,
            &self.scrape_duration,
            &self.scrape_error,
            &self.instance_info,
            &self.db_keys,
            &self.db_keys_expiring,
            &self.key_size,
            &self.keys_count,
            &self.stream_length,
        ];
        for (_, gauge) in &self.info {
            collectors.push(gauge);
        }
        collectors
    }

    /// Drops every labelled child so a gather only reports what it saw.
    fn reset(&self) {
        self.instance_info.reset();
        self.db_keys.reset();
        self.db_keys_expiring.reset();
        self.key_size.reset();
        self.keys_count.reset();
        self.stream_length.reset();
        for (_, gauge) in &self.info {
            gauge.reset();
        }
    }
}

/// Collects metrics from one Redis instance.
pub struct RedisCollector {
    target: Target,
    endpoint: Endpoint,
    user: Option<String>,
    credentials: CredentialStore,
    fallback_password: Option<String>,
    timeout: Duration,
    batch_size: usize,
    keys: KeyChecks,
    metrics: RedisMetrics,
    /// Held from `reset` until the families are collected.
    collect_lock: Mutex<()>,
}

impl RedisCollector {
    pub fn new(target: &Target, options: &Options) -> Result<Self, CollectorError> {
        let endpoint = Endpoint::from_target(target)?;
        let keys = KeyChecks::from_options(options)?;
        let metrics = RedisMetrics::new(&options.namespace).map_err(CollectorError::Metric)?;

        Ok(Self {
            target: target.clone(),
            endpoint,
            user: options.redis_user.clone(),
            credentials: CredentialStore::new(Arc::clone(&options.password_map)),
            fallback_password: options.redis_password.clone(),
            timeout: options.connection_timeout,
            batch_size: options.check_keys_batch_size.max(1),
            keys,
            metrics,
            collect_lock: Mutex::new(()),
        })
    }

    /// Reads passwords from `credentials` at every scrape instead of the
    /// snapshot taken at construction.
    pub fn with_credentials(mut self, credentials: CredentialStore) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Password for the next connection: per-target entry first, then the
    /// global fallback.
    fn password(&self) -> Option<String> {
        self.credentials
            .snapshot()
            .password_for(&self.target)
            .map(str::to_string)
            .or_else(|| self.fallback_password.clone())
    }

    fn scrape(&self) -> Result<(), ClientError> {
        let mut conn = self.endpoint.connect(self.timeout)?;

        if let Some(password) = self.password() {
            conn.auth(self.user.as_deref(), &password)?;
        }

        let info = parse_info(&conn.query_string(&["INFO", "ALL"])?);
        self.record_info(&info);
        self.record_keys(&mut conn)
    }

    fn record_info(&self, info: &InfoSnapshot) {
        for (field, gauge) in &self.metrics.info {
            if let Some(value) = info.number(field) {
                gauge.with_label_values(&NO_LABELS).set(value);
            }
        }

        self.metrics
            .instance_info
            .with_label_values(&[
                info.get("role").unwrap_or(""),
                info.get("redis_version").unwrap_or(""),
                info.get("redis_mode").unwrap_or(""),
            ])
            .set(1.0);

        for entry in &info.keyspace {
            let db = format!("db{}", entry.db);
            self.metrics
                .db_keys
                .with_label_values(&[db.as_str()])
                .set(entry.keys as f64);
            self.metrics
                .db_keys_expiring
                .with_label_values(&[db.as_str()])
                .set(entry.expires as f64);
        }
    }

    fn record_keys(&self, conn: &mut Connection) -> Result<(), ClientError> {
        for spec in &self.keys.count_keys {
            tolerate(self.count_keys(conn, spec), spec)?;
        }
        for spec in &self.keys.check_keys {
            tolerate(self.check_key_pattern(conn, spec), spec)?;
        }
        for spec in &self.keys.check_single_keys {
            tolerate(self.check_single_key(conn, spec.db, &spec.key), spec)?;
        }
        for spec in &self.keys.check_streams {
            tolerate(self.check_stream_pattern(conn, spec), spec)?;
        }
        for spec in &self.keys.check_single_streams {
            tolerate(self.check_single_stream(conn, spec.db, &spec.key), spec)?;
        }
        Ok(())
    }

    fn count_keys(&self, conn: &mut Connection, spec: &KeySpec) -> Result<(), ClientError> {
        conn.select(spec.db)?;
        let found = conn.scan(&spec.key, self.batch_size)?;
        self.metrics
            .keys_count
            .with_label_values(&[format!("db{}", spec.db).as_str(), spec.key.as_str()])
            .set(found.len() as f64);
        Ok(())
    }

    fn check_key_pattern(&self, conn: &mut Connection, spec: &KeySpec) -> Result<(), ClientError> {
        conn.select(spec.db)?;
        for key in conn.scan(&spec.key, self.batch_size)? {
            self.record_key_size(conn, spec.db, &key)?;
        }
        Ok(())
    }

    fn check_single_key(&self, conn: &mut Connection, db: u32, key: &str) -> Result<(), ClientError> {
        conn.select(db)?;
        self.record_key_size(conn, db, key)
    }

    /// Expects `db` to be selected already.
    fn record_key_size(&self, conn: &mut Connection, db: u32, key: &str) -> Result<(), ClientError> {
        if let Some(size) = key_size(conn, key)? {
            self.metrics
                .key_size
                .with_label_values(&[format!("db{db}").as_str(), key])
                .set(size as f64);
        }
        Ok(())
    }

    fn check_stream_pattern(&self, conn: &mut Connection, spec: &KeySpec) -> Result<(), ClientError> {
        conn.select(spec.db)?;
        for key in conn.scan(&spec.key, self.batch_size)? {
            self.record_stream_length(conn, spec.db, &key)?;
        }
        Ok(())
    }

    fn check_single_stream(&self, conn: &mut Connection, db: u32, key: &str) -> Result<(), ClientError> {
        conn.select(db)?;
        self.record_stream_length(conn, db, key)
    }

    fn record_stream_length(&self, conn: &mut Connection, db: u32, key: &str) -> Result<(), ClientError> {
        if conn.query_string(&["TYPE", key])? != "stream" {
            debug!("Key {} in db{} is not a stream, skipping", key, db);
            return Ok(());
        }
        let len = conn.query_int(&["XLEN", key])?;
        self.metrics
            .stream_length
            .with_label_values(&[format!("db{db}").as_str(), key])
            .set(len as f64);
        Ok(())
    }
}

/// Size of `key` according to its type, `None` if it does not exist.
fn key_size(conn: &mut Connection, key: &str) -> Result<Option<i64>, ClientError> {
    let command = match conn.query_string(&["TYPE", key])?.as_str() {
        "string" => "STRLEN",
        "list" => "LLEN",
        "set" => "SCARD",
        "zset" => "ZCARD",
        "hash" => "HLEN",
        "stream" => "XLEN",
        _ => return Ok(None),
    };
    conn.query_int(&[command, key]).map(Some)
}

/// Keeps going after per-key failures; only lost connections end the scrape.
fn tolerate(result: Result<(), ClientError>, spec: &KeySpec) -> Result<(), ClientError> {
    match result {
        Err(ClientError::Io(e)) => Err(ClientError::Io(e)),
        Err(e) => {
            warn!("Key check for db{}={} failed: {}", spec.db, spec.key, e);
            Ok(())
        }
        Ok(()) => Ok(()),
    }
}

impl Collector for RedisCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.metrics
            .collectors()
            .into_iter()
            .flat_map(|c| c.desc())
            .collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let _guard = self
            .collect_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let start = Instant::now();
        self.metrics.reset();

        match self.scrape() {
            Ok(()) => {
                self.metrics.up.set(1.0);
                self.metrics.scrape_error.set(0.0);
            }
            Err(e) => {
                warn!("Scrape of {} failed: {}", self.target, e);
                self.metrics.up.set(0.0);
                self.metrics.scrape_error.set(1.0);
            }
        }

        self.metrics
            .scrape_duration
            .set(start.elapsed().as_secs_f64());
        debug!(
            "Scraped {} in {:.3}ms",
            self.target,
            start.elapsed().as_secs_f64() * 1000.0
        );

        self.metrics
            .collectors()
            .into_iter()
            .flat_map(|c| c.collect())
            .collect()
    }
}
