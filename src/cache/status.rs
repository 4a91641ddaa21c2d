//! Read-only cache introspection
//!
//! Nothing here refreshes or mutates the cache, and status collection
//! cannot fail: unreadable metadata shows up as `degraded`.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::store::{AGE_UNKNOWN, CacheStore};
use crate::env::exposed_name;
use crate::error::{CacheError, StoreError};

/// Point-in-time health of the cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStatus {
    /// A snapshot file is present
    pub exists: bool,
    /// The snapshot is within its TTL right now
    pub valid_now: bool,
    /// A snapshot is present but its metadata is missing or unreadable
    pub degraded: bool,
    pub secret_count: usize,
    /// [`AGE_UNKNOWN`] when there is no usable metadata
    pub age: Duration,
    /// Zero once stale
    pub remaining: Duration,
    pub fetched_at: Option<DateTime<Utc>>,
    pub ttl: Duration,
    pub cache_dir: PathBuf,
}

/// One cached key and whether the current environment carries it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyPresence {
    /// Variable name, including the configured prefix
    pub key: String,
    pub loaded_into_environment: bool,
}

/// Build a status report from the store's metadata
pub fn collect(store: &CacheStore, ttl: Duration) -> CacheStatus {
    let exists = store.exists();

    let (metadata, degraded) = match store.metadata() {
        Ok(meta) => (Some(meta), false),
        Err(e) => {
            if exists {
                log::debug!("Cache metadata unusable: {}", e);
            }
            (None, exists)
        }
    };
    let metadata = metadata.filter(|_| exists);

    let age = metadata.as_ref().map(|m| m.age()).unwrap_or(AGE_UNKNOWN);
    let valid_now = age < ttl;

    CacheStatus {
        exists,
        valid_now,
        degraded,
        secret_count: metadata.as_ref().map(|m| m.entry_count).unwrap_or(0),
        age,
        remaining: if valid_now { ttl - age } else { Duration::ZERO },
        fetched_at: metadata.map(|m| m.fetched_at),
        ttl,
        cache_dir: store.dir().to_path_buf(),
    }
}

/// Cross-reference cached keys against an environment.
///
/// A key counts as loaded when the variable is set to the cached value.
/// An empty cache yields an empty list.
pub fn loaded_keys(
    store: &CacheStore,
    prefix: &str,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Vec<KeyPresence>, CacheError> {
    let snapshot = match store.read() {
        Ok(snapshot) => snapshot,
        Err(StoreError::NotFound) => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    Ok(snapshot
        .entries
        .iter()
        .map(|entry| {
            let key = exposed_name(prefix, &entry.key);
            let loaded_into_environment = env(&key).is_some_and(|v| v == entry.value);
            KeyPresence {
                key,
                loaded_into_environment,
            }
        })
        .collect())
}

/// Render a duration as `1h 2m 3s`, dropping leading zero units
pub fn format_duration(duration: Duration) -> String {
    if duration == AGE_UNKNOWN {
        return "unknown".to_string();
    }
    let secs = duration.as_secs();
    let (hours, mins, secs) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{}h {}m {}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::store::CacheSnapshot;
    use crate::source::SecretEntry;
    use tempfile::TempDir;

    fn store_with(entries: Vec<SecretEntry>, age: Duration) -> (CacheStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path());
        store
            .replace(&CacheSnapshot {
                fetched_at: Utc::now() - chrono::Duration::from_std(age).unwrap(),
                entries,
            })
            .unwrap();
        (store, dir)
    }

    #[test]
    fn test_status_empty() {
        let dir = TempDir::new().unwrap();
        let status = collect(&CacheStore::new(dir.path()), Duration::from_secs(60));

        assert!(!status.exists);
        assert!(!status.valid_now);
        assert!(!status.degraded);
        assert_eq!(status.secret_count, 0);
        assert_eq!(status.age, AGE_UNKNOWN);
        assert_eq!(status.remaining, Duration::ZERO);
        assert!(status.fetched_at.is_none());
    }

    #[test]
    fn test_status_fresh() {
        let (store, _dir) = store_with(
            vec![SecretEntry::new("A", "1"), SecretEntry::new("B", "2")],
            Duration::from_secs(30),
        );
        let status = collect(&store, Duration::from_secs(60));

        assert!(status.exists);
        assert!(status.valid_now);
        assert!(!status.degraded);
        assert_eq!(status.secret_count, 2);
        assert!(status.age >= Duration::from_secs(30));
        assert!(status.remaining <= Duration::from_secs(30));
        assert!(status.fetched_at.is_some());
    }

    #[test]
    fn test_status_stale() {
        let (store, _dir) = store_with(vec![SecretEntry::new("A", "1")], Duration::from_secs(90));
        let status = collect(&store, Duration::from_secs(60));

        assert!(status.exists);
        assert!(!status.valid_now);
        assert_eq!(status.remaining, Duration::ZERO);
        assert_eq!(status.secret_count, 1);
    }

    #[test]
    fn test_status_corrupt_metadata_is_degraded() {
        let (store, _dir) = store_with(vec![SecretEntry::new("A", "1")], Duration::ZERO);
        std::fs::write(store.metadata_path(), b"{{{").unwrap();

        let status = collect(&store, Duration::from_secs(60));
        assert!(status.exists);
        assert!(status.degraded);
        assert!(!status.valid_now);
        assert_eq!(status.age, AGE_UNKNOWN);
    }

    #[test]
    fn test_loaded_keys_cross_reference() {
        let (store, _dir) = store_with(
            vec![
                SecretEntry::new("A", "1"),
                SecretEntry::new("B", "2"),
                SecretEntry::new("C", "3"),
            ],
            Duration::ZERO,
        );
        let env = |name: &str| match name {
            "APP_A" => Some("1".to_string()),
            "APP_B" => Some("stale".to_string()),
            _ => None,
        };

        let keys = loaded_keys(&store, "APP_", env).unwrap();
        assert_eq!(
            keys,
            vec![
                KeyPresence {
                    key: "APP_A".to_string(),
                    loaded_into_environment: true
                },
                KeyPresence {
                    key: "APP_B".to_string(),
                    loaded_into_environment: false
                },
                KeyPresence {
                    key: "APP_C".to_string(),
                    loaded_into_environment: false
                },
            ]
        );
    }

    #[test]
    fn test_loaded_keys_empty_cache() {
        let dir = TempDir::new().unwrap();
        let keys = loaded_keys(&CacheStore::new(dir.path()), "", |_| None).unwrap();
        assert!(keys.is_empty());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(5)), "5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(86_399)), "23h 59m 59s");
        assert_eq!(format_duration(AGE_UNKNOWN), "unknown");
    }
}
