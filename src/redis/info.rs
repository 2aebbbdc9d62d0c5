//! Parsing of the `INFO` command output.

use ahash::AHashMap as HashMap;
use once_cell::sync::Lazy;
use regex::Regex;

/// Matches keyspace lines such as `db0:keys=12,expires=3,avg_ttl=0`.
static KEYSPACE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^db(\d+):keys=(\d+),expires=(\d+)").expect("static regex is valid")
});

/// Keys per logical database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyspaceEntry {
    pub db: u32,
    pub keys: u64,
    pub expires: u64,
}

#[derive(Debug, Default)]
pub struct InfoSnapshot {
    fields: HashMap<String, String>,
    pub keyspace: Vec<KeyspaceEntry>,
}

impl InfoSnapshot {
    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    /// Numeric value of `field`, if present and parseable.
    pub fn number(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(|v| v.trim().parse::<f64>().ok())
    }
}

pub fn parse_info(text: &str) -> InfoSnapshot {
    let mut snapshot = InfoSnapshot::default();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if let Some(caps) = KEYSPACE_RE.captures(line) {
            let (Ok(db), Ok(keys), Ok(expires)) = (
                caps[1].parse::<u32>(),
                caps[2].parse::<u64>(),
                caps[3].parse::<u64>(),
            ) else {
                continue;
            };
            snapshot.keyspace.push(KeyspaceEntry { db, keys, expires });
            continue;
        }

        if let Some((key, value)) = line.split_once(':') {
            snapshot.fields.insert(key.to_string(), value.to_string());
        }
    }

    snapshot
}
