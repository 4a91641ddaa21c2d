//! Advisory lock serializing refreshes across processes
//!
//! Several shells can share one cache directory. The lock is an OS file
//! lock on a persistent `refresh.lock`, so it is released by the kernel when
//! the holder exits, however it exits. Waiters reuse the snapshot the
//! holder wrote.

use std::fs::{File, OpenOptions};
use std::time::Duration;

use fs4::fs_std::FileExt;

use super::LOCK_FILE;
use super::store::{CacheStore, restrict_permissions};
use crate::error::StoreError;

/// Held refresh lock; closing the file releases it
#[derive(Debug)]
pub struct RefreshLock {
    _file: File,
}

impl RefreshLock {
    /// Wait up to `wait` for the refresh lock of `store`
    pub async fn acquire(store: &CacheStore, wait: Duration) -> Result<Self, StoreError> {
        store.ensure_dir()?;
        let path = store.dir().join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| StoreError::io("Failed to open refresh lock", e))?;
        restrict_permissions(&path, 0o600)?;

        // A lock taken after we give up is dropped with the task's result
        let locking = tokio::task::spawn_blocking(move || file.lock_exclusive().map(|()| file));
        match tokio::time::timeout(wait, locking).await {
            Ok(Ok(Ok(file))) => {
                log::debug!("Holding refresh lock {}", path.display());
                Ok(Self { _file: file })
            }
            Ok(Ok(Err(e))) => Err(StoreError::io("Failed to take refresh lock", e)),
            Ok(Err(e)) => Err(StoreError::Io(format!("Refresh lock task failed: {}", e))),
            Err(_) => Err(StoreError::Io(format!(
                "Timed out after {:?} waiting for another refresh to finish",
                wait
            ))),
        }
    }
}
