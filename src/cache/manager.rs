//! Cache lifecycle: staleness checks, refreshes, and lookups
//!
//! Expiry is lazy. Every entry point compares the snapshot age against the
//! TTL when it runs; nothing wakes up on a timer. At most one remote fetch
//! runs per manager at a time, and callers that queue up behind a fetch
//! take its result instead of starting another one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::lock::RefreshLock;
use super::status::{self, CacheStatus, KeyPresence};
use super::store::{CacheSnapshot, CacheStore};
use crate::config::CacheConfig;
use crate::credentials::CredentialProvider;
use crate::error::{CacheError, FetchError, StoreError};
use crate::source::{SecretEntry, SecretSource};

/// Extra time to wait for another process's refresh beyond its fetch timeout
const LOCK_GRACE: Duration = Duration::from_secs(30);

/// What a refresh call ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Fetched from the remote source and replaced the snapshot
    Fetched,
    /// Snapshot was still within its TTL; nothing fetched
    StillValid,
    /// Another caller's refresh finished while this one waited
    Joined,
}

/// Result of a successful refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub outcome: RefreshOutcome,
    pub secret_count: usize,
    /// Time left before the snapshot goes stale
    pub remaining: Duration,
}

/// Snapshot served by a load, with how it was obtained
#[derive(Debug)]
pub struct LoadedSecrets {
    pub snapshot: CacheSnapshot,
    /// A remote fetch was attempted while serving this load
    pub refresh_attempted: bool,
    /// Set when a refresh failed and an expired snapshot was served instead
    pub stale_error: Option<CacheError>,
}

/// Orchestrates the cache store and the secret source for one cache directory
pub struct CacheManager<S, C> {
    config: CacheConfig,
    store: CacheStore,
    source: S,
    credentials: C,
    /// Outcome of the latest refresh, guarded so only one runs at a time
    flight: Mutex<Option<Result<RefreshReport, CacheError>>>,
    /// Bumped each time a refresh completes
    generation: AtomicU64,
}

impl<S: SecretSource, C: CredentialProvider> CacheManager<S, C> {
    pub fn new(config: CacheConfig, source: S, credentials: C) -> Self {
        let store = CacheStore::new(config.cache_dir.clone());
        Self {
            config,
            store,
            source,
            credentials,
            flight: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// All cached secrets, refreshing first if the snapshot is stale or missing
    pub async fn load(&self) -> Result<Vec<SecretEntry>, CacheError> {
        let loaded = self.load_detailed().await?;
        Ok(loaded.snapshot.entries)
    }

    /// Like [`load`](Self::load), but reports whether a refresh ran and
    /// whether an expired snapshot was served after a failed refresh
    pub async fn load_detailed(&self) -> Result<LoadedSecrets, CacheError> {
        if self.store.is_valid(self.config.ttl) {
            match self.store.read() {
                Ok(snapshot) => {
                    return Ok(LoadedSecrets {
                        snapshot,
                        refresh_attempted: false,
                        stale_error: None,
                    });
                }
                Err(StoreError::Corrupt(msg)) => {
                    log::warn!("Discarding corrupt cache: {}", msg);
                    self.store.clear()?;
                }
                // Cleared between the validity check and the read
                Err(StoreError::NotFound) => {}
                Err(e) => return Err(e.into()),
            }
        }

        match self.refresh(false).await {
            Ok(report) => Ok(LoadedSecrets {
                snapshot: self.store.read()?,
                refresh_attempted: report.outcome != RefreshOutcome::StillValid,
                stale_error: None,
            }),
            Err(err) => match self.store.read() {
                Ok(snapshot) => {
                    log::warn!(
                        "Refresh failed ({}); using secrets fetched at {}",
                        err,
                        snapshot.fetched_at.to_rfc3339()
                    );
                    Ok(LoadedSecrets {
                        snapshot,
                        refresh_attempted: true,
                        stale_error: Some(err),
                    })
                }
                Err(_) => Err(err),
            },
        }
    }

    /// Refresh the snapshot from the remote source.
    ///
    /// Without `force`, a snapshot that is still within its TTL is left
    /// alone and reported as [`RefreshOutcome::StillValid`]. On failure the
    /// existing snapshot is kept untouched.
    pub async fn refresh(&self, force: bool) -> Result<RefreshReport, CacheError> {
        if !force && let Some(report) = self.still_valid() {
            return Ok(report);
        }

        let observed = self.generation.load(Ordering::SeqCst);
        let mut last = self.flight.lock().await;

        if self.generation.load(Ordering::SeqCst) != observed
            && let Some(outcome) = last.clone()
        {
            log::debug!("Joined a refresh that finished while waiting");
            return outcome.map(|report| RefreshReport {
                outcome: RefreshOutcome::Joined,
                ..report
            });
        }

        if !force && let Some(report) = self.still_valid() {
            return Ok(report);
        }

        let result = self.fetch_and_replace().await;
        *last = Some(result.clone());
        self.generation.fetch_add(1, Ordering::SeqCst);
        result
    }

    /// Value of one secret.
    ///
    /// `key` may be the raw secret key or its exposed name including the
    /// configured prefix. A key missing from a cached snapshot triggers one
    /// refresh before `NotFound` is reported.
    pub async fn get(&self, key: &str) -> Result<String, CacheError> {
        let loaded = self.load_detailed().await?;
        if let Some(value) = self.lookup(&loaded.snapshot, key) {
            return Ok(value);
        }
        if loaded.refresh_attempted {
            return Err(CacheError::NotFound(key.to_string()));
        }

        log::debug!("'{}' not in cache, refreshing once", key);
        if let Err(e) = self.refresh(true).await {
            log::warn!("Refresh for '{}' failed: {}", key, e);
            return Err(CacheError::NotFound(key.to_string()));
        }

        let snapshot = self.store.read()?;
        self.lookup(&snapshot, key)
            .ok_or_else(|| CacheError::NotFound(key.to_string()))
    }

    /// Securely erase the cache. Returns whether anything was cached.
    pub fn clear(&self) -> Result<bool, CacheError> {
        Ok(self.store.clear()?)
    }

    /// Read-only health report; never refreshes
    pub fn status(&self) -> CacheStatus {
        status::collect(&self.store, self.config.ttl)
    }

    /// Cached keys, flagged by whether this process's environment has them loaded
    pub fn list_loaded_keys(&self) -> Result<Vec<KeyPresence>, CacheError> {
        status::loaded_keys(&self.store, &self.config.key_prefix, |name| {
            std::env::var(name).ok()
        })
    }

    fn lookup(&self, snapshot: &CacheSnapshot, key: &str) -> Option<String> {
        let unprefixed = key
            .strip_prefix(self.config.key_prefix.as_str())
            .filter(|_| !self.config.key_prefix.is_empty());

        snapshot
            .get(key)
            .or_else(|| unprefixed.and_then(|k| snapshot.get(k)))
            .map(|entry| entry.value.clone())
    }

    fn still_valid(&self) -> Option<RefreshReport> {
        let remaining = self.store.remaining(self.config.ttl)?;
        let secret_count = self.store.metadata().ok()?.entry_count;
        Some(RefreshReport {
            outcome: RefreshOutcome::StillValid,
            secret_count,
            remaining,
        })
    }

    /// Runs with the in-process flight lock held
    async fn fetch_and_replace(&self) -> Result<RefreshReport, CacheError> {
        let credentials = self.credentials.resolve()?;

        let before = self.store.metadata().ok().map(|m| m.fetched_at);
        let wait = self.config.timeout.saturating_add(LOCK_GRACE);
        let lock = RefreshLock::acquire(&self.store, wait).await?;
        if let Ok(meta) = self.store.metadata()
            && Some(meta.fetched_at) != before
            && meta.age() < self.config.ttl
        {
            log::debug!("Another process refreshed the cache while we waited");
            return Ok(RefreshReport {
                outcome: RefreshOutcome::Joined,
                secret_count: meta.entry_count,
                remaining: self.config.ttl.saturating_sub(meta.age()),
            });
        }

        log::info!("Fetching secrets for project {}", credentials.project_id);
        let timeout = self.config.timeout;
        let entries = tokio::time::timeout(
            timeout,
            self.source
                .fetch(&credentials.project_id, &credentials.token, timeout),
        )
        .await
        .map_err(|_| FetchError::Timeout(timeout))??;

        let snapshot = CacheSnapshot::new(entries);
        self.store
            .replace(&snapshot)
            .map_err(CacheError::Persist)?;
        drop(lock);

        log::info!("Cached {} secrets", snapshot.entries.len());
        Ok(RefreshReport {
            outcome: RefreshOutcome::Fetched,
            secret_count: snapshot.entries.len(),
            remaining: self.config.ttl,
        })
    }
}

impl<S, C> CacheManager<S, C>
where
    S: SecretSource + 'static,
    C: CredentialProvider + 'static,
{
    /// Start a refresh on a detached task if auto-refresh is enabled.
    ///
    /// The task goes through [`refresh`](Self::refresh), so a foreground
    /// caller refreshing at the same time shares its fetch.
    pub fn spawn_background_refresh(
        self: &Arc<Self>,
    ) -> Option<JoinHandle<Result<RefreshReport, CacheError>>> {
        if !self.config.auto_refresh {
            return None;
        }

        let manager = Arc::clone(self);
        Some(tokio::spawn(async move {
            let result = manager.refresh(false).await;
            match &result {
                Ok(report) => log::debug!("Background refresh: {:?}", report.outcome),
                Err(e) => log::warn!("Background refresh failed: {}", e),
            }
            result
        }))
    }
}
