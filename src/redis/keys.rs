//! Key, stream and key-count specifications.
//!
//! All five key options share one syntax: a comma separated list of
//! `[db<N>=]<key>` items. Items without a database prefix refer to db 0;
//! empty items are ignored.

use crate::collector::CollectorError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpec {
    pub db: u32,
    /// Exact key name or SCAN glob pattern, depending on the option.
    pub key: String,
}

/// Parses one option value. `option` names the option in error messages.
pub fn parse_key_specs(option: &'static str, raw: &str) -> Result<Vec<KeySpec>, CollectorError> {
    let mut specs = Vec::new();

    for item in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let spec = match item.split_once('=') {
            None => KeySpec {
                db: 0,
                key: item.to_string(),
            },
            Some((db, key)) => {
                let db_index = db.trim().trim_start_matches("db");
                let db = db_index.parse::<u32>().map_err(|_| CollectorError::InvalidOption {
                    option,
                    value: item.to_string(),
                    reason: format!("invalid database index '{}'", db.trim()),
                })?;
                let key = key.trim();
                if key.is_empty() {
                    return Err(CollectorError::InvalidOption {
                        option,
                        value: item.to_string(),
                        reason: "empty key".to_string(),
                    });
                }
                KeySpec {
                    db,
                    key: key.to_string(),
                }
            }
        };
        specs.push(spec);
    }

    Ok(specs)
}
