//! On-disk snapshot storage
//!
//! Two files live in the cache directory: the snapshot (every secret plus
//! its fetch time) and a small metadata file used for age checks without
//! reading any secret. Both are replaced via temp file + rename, so a
//! reader sees either the old file or the new one, never a mix.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::{METADATA_FILE, SNAPSHOT_FILE};
use crate::error::StoreError;
use crate::source::SecretEntry;

/// Age reported when there is no usable snapshot
pub const AGE_UNKNOWN: Duration = Duration::MAX;

type Result<T> = std::result::Result<T, StoreError>;

/// Every secret fetched by one successful remote call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub fetched_at: DateTime<Utc>,
    pub entries: Vec<SecretEntry>,
}

impl CacheSnapshot {
    /// Snapshot stamped with the current time
    pub fn new(entries: Vec<SecretEntry>) -> Self {
        Self {
            fetched_at: Utc::now(),
            entries,
        }
    }

    pub fn get(&self, key: &str) -> Option<&SecretEntry> {
        self.entries.iter().find(|e| e.key == key)
    }
}

/// Freshness data written after the snapshot it describes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub fetched_at: DateTime<Utc>,
    pub entry_count: usize,
}

impl CacheMetadata {
    /// Time since the fetch; a timestamp in the future counts as zero
    pub fn age(&self) -> Duration {
        Utc::now()
            .signed_duration_since(self.fetched_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// File-backed cache store rooted at one directory
#[derive(Debug, Clone)]
pub struct CacheStore {
    dir: PathBuf,
}

impl CacheStore {
    /// Store rooted at `dir`. Nothing is touched until the first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    /// Whether a snapshot file is present (readable or not)
    pub fn exists(&self) -> bool {
        self.snapshot_path().is_file()
    }

    /// Load freshness metadata
    pub fn metadata(&self) -> Result<CacheMetadata> {
        let bytes = match fs::read(self.metadata_path()) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(StoreError::NotFound),
            Err(e) => return Err(StoreError::io("Failed to read cache metadata", e)),
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Corrupt(format!("metadata: {}", e)))
    }

    /// Time since the last successful fetch, or [`AGE_UNKNOWN`]
    pub fn age(&self) -> Duration {
        if !self.exists() {
            return AGE_UNKNOWN;
        }
        match self.metadata() {
            Ok(meta) => meta.age(),
            Err(e) => {
                log::debug!("Treating cache as stale: {}", e);
                AGE_UNKNOWN
            }
        }
    }

    /// True iff a snapshot exists, its metadata is readable, and age < ttl
    pub fn is_valid(&self, ttl: Duration) -> bool {
        self.age() < ttl
    }

    /// Time left before the snapshot goes stale, if it is still valid
    pub fn remaining(&self, ttl: Duration) -> Option<Duration> {
        let age = self.age();
        (age < ttl).then(|| ttl - age)
    }

    /// Atomically replace the snapshot, then its metadata.
    ///
    /// If the metadata write fails, the new snapshot is already in place
    /// while the metadata is old or missing. The snapshot then reads as
    /// older than it is (or of unknown age), so the next load refetches.
    pub fn replace(&self, snapshot: &CacheSnapshot) -> Result<()> {
        self.ensure_dir()?;

        let mut bytes = serde_json::to_vec(snapshot)
            .map_err(|e| StoreError::Io(format!("Failed to encode snapshot: {}", e)))?;
        let written = self.write_atomic(&self.snapshot_path(), &bytes);
        bytes.zeroize();
        written?;

        // Only reached once the snapshot is in place
        let metadata = CacheMetadata {
            fetched_at: snapshot.fetched_at,
            entry_count: snapshot.entries.len(),
        };
        let meta_bytes = serde_json::to_vec(&metadata)
            .map_err(|e| StoreError::Io(format!("Failed to encode metadata: {}", e)))?;
        self.write_atomic(&self.metadata_path(), &meta_bytes)?;

        log::debug!(
            "Cached {} secrets in {}",
            snapshot.entries.len(),
            self.dir.display()
        );
        Ok(())
    }

    /// Load the current snapshot
    pub fn read(&self) -> Result<CacheSnapshot> {
        let mut bytes = match fs::read(self.snapshot_path()) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(StoreError::NotFound),
            Err(e) => return Err(StoreError::io("Failed to read snapshot", e)),
        };
        let parsed = serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Corrupt(format!("snapshot: {}", e)));
        bytes.zeroize();
        parsed
    }

    /// Overwrite the snapshot in place, then remove both files.
    ///
    /// Returns whether a snapshot was present.
    pub fn clear(&self) -> Result<bool> {
        remove_if_present(&self.metadata_path())?;

        let snapshot_path = self.snapshot_path();
        if !snapshot_path.exists() {
            return Ok(false);
        }
        scrub(&snapshot_path)?;
        remove_if_present(&snapshot_path)?;

        log::debug!("Cleared cache in {}", self.dir.display());
        Ok(true)
    }

    /// Create the cache directory and restrict it to the owner
    pub(crate) fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| StoreError::io("Failed to create cache dir", e))?;
        restrict_permissions(&self.dir, 0o700)
    }

    /// Write to a temp file in the same directory and rename it into place
    fn write_atomic(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let mut tmp = tempfile::Builder::new()
            .prefix(".credcache-")
            .suffix(".tmp")
            .tempfile_in(&self.dir)
            .map_err(|e| StoreError::io("Failed to create temp file", e))?;
        restrict_permissions(tmp.path(), 0o600)?;

        tmp.write_all(bytes)
            .map_err(|e| StoreError::io("Failed to write temp file", e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| StoreError::io("Failed to sync temp file", e))?;

        tmp.persist(path)
            .map_err(|e| StoreError::io("Failed to move cache file into place", e.error))?;
        restrict_permissions(path, 0o600)
    }
}

/// Zero out a file's contents before it is unlinked
fn scrub(path: &Path) -> Result<()> {
    let len = fs::metadata(path)
        .map_err(|e| StoreError::io("Failed to stat snapshot", e))?
        .len();
    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| StoreError::io("Failed to open snapshot for scrubbing", e))?;

    let zeros = vec![0u8; len as usize];
    file.write_all(&zeros)
        .and_then(|_| file.sync_all())
        .map_err(|e| StoreError::io("Failed to scrub snapshot", e))
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::io("Failed to remove cache file", e)),
    }
}

#[cfg(unix)]
pub(crate) fn restrict_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| StoreError::io("Failed to set permissions", e))
}

#[cfg(not(unix))]
pub(crate) fn restrict_permissions(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
