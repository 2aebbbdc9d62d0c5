//! Per-target Redis credentials.
//!
//! The password file is a flat JSON object mapping a target alias (usually the
//! target URI, e.g. `redis://cache-01:6379`) to the password used when the
//! exporter connects to it. A loaded [`CredentialMap`] is never modified;
//! reloading produces a new map that replaces the old one wholesale.

use ahash::AHashMap as HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

use crate::target::Target;

/// Errors raised while loading a password file.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("unable to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Immutable alias -> secret mapping.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CredentialMap {
    entries: HashMap<String, String>,
}

impl CredentialMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, alias: &str) -> Option<&str> {
        self.entries.get(alias).map(String::as_str)
    }

    /// Looks up the password for a resolved target.
    ///
    /// The full target string is tried first, then the `scheme://host:port`
    /// form so that one entry covers every database path on an instance.
    pub fn password_for(&self, target: &Target) -> Option<&str> {
        if let Some(pwd) = self.get(target.as_str()) {
            return Some(pwd);
        }
        target
            .instance_alias()
            .and_then(|alias| self.get(&alias))
    }
}

impl FromIterator<(String, String)> for CredentialMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

// Never print secrets.
impl fmt::Debug for CredentialMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut aliases: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        aliases.sort_unstable();
        f.debug_struct("CredentialMap")
            .field("aliases", &aliases)
            .finish()
    }
}

/// Shared handle to the current [`CredentialMap`].
///
/// Clones share the same slot. Readers take a snapshot; [`replace`] swaps the
/// whole map so a reader never sees a partially loaded one.
///
/// [`replace`]: CredentialStore::replace
#[derive(Clone, Default)]
pub struct CredentialStore {
    current: Arc<RwLock<Arc<CredentialMap>>>,
}

impl CredentialStore {
    pub fn new(map: Arc<CredentialMap>) -> Self {
        Self {
            current: Arc::new(RwLock::new(map)),
        }
    }

    pub fn snapshot(&self) -> Arc<CredentialMap> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn replace(&self, map: Arc<CredentialMap>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = map;
    }
}

impl fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CredentialStore").field(&self.snapshot()).finish()
    }
}

/// Reads and parses a JSON password file.
pub fn load_password_file(path: &Path) -> Result<CredentialMap, CredentialError> {
    let content = fs::read_to_string(path).map_err(|source| CredentialError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let entries: std::collections::HashMap<String, String> = serde_json::from_str(&content)
        .map_err(|source| CredentialError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    debug!(
        "Loaded {} target password(s) from {}",
        entries.len(),
        path.display()
    );

    Ok(entries.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::resolve_target;
    use std::io::Write;

    #[test]
    fn test_load_password_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"redis://cache-01:6379": "s3cret", "redis://cache-02:6379/2": "other"}}"#
        )
        .unwrap();

        let map = load_password_file(file.path()).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("redis://cache-01:6379"), Some("s3cret"));
    }

    #[test]
    fn test_load_password_file_rejects_non_object() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"["redis://cache-01:6379"]"#).unwrap();

        let err = load_password_file(file.path()).unwrap_err();
        assert!(matches!(err, CredentialError::Parse { .. }));
    }

    #[test]
    fn test_load_password_file_missing() {
        let err = load_password_file(Path::new("/nonexistent/pwd.json")).unwrap_err();
        assert!(matches!(err, CredentialError::Read { .. }));
    }

    #[test]
    fn test_password_for_falls_back_to_instance_alias() {
        let map: CredentialMap = [("redis://cache-01:6379".to_string(), "pw".to_string())]
            .into_iter()
            .collect();

        let exact = resolve_target(Some("cache-01:6379")).unwrap();
        assert_eq!(map.password_for(&exact), Some("pw"));

        let with_db = resolve_target(Some("redis://cache-01:6379/3")).unwrap();
        assert_eq!(map.password_for(&with_db), Some("pw"));

        let unknown = resolve_target(Some("cache-02:6379")).unwrap();
        assert_eq!(map.password_for(&unknown), None);
    }

    #[test]
    fn test_store_clones_see_replacement() {
        let store = CredentialStore::new(Arc::new(
            [("redis://a:6379".to_string(), "old".to_string())]
                .into_iter()
                .collect(),
        ));
        let reader = store.clone();
        let before = reader.snapshot();

        store.replace(Arc::new(
            [("redis://a:6379".to_string(), "new".to_string())]
                .into_iter()
                .collect(),
        ));

        assert_eq!(reader.snapshot().get("redis://a:6379"), Some("new"));
        assert_eq!(before.get("redis://a:6379"), Some("old"));
    }

    #[test]
    fn test_debug_hides_secrets() {
        let map: CredentialMap = [("redis://a:6379".to_string(), "topsecret".to_string())]
            .into_iter()
            .collect();
        let printed = format!("{:?}", map);
        assert!(printed.contains("redis://a:6379"));
        assert!(!printed.contains("topsecret"));
    }
}
