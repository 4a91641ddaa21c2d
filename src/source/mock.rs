//! Mock secret source for testing
//!
//! Counts calls, can be slowed down, and can be primed with errors so
//! tests can observe exactly how often the cache reaches the remote side.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{SecretEntry, SecretSource};
use crate::credentials::AccessToken;
use crate::error::FetchError;

/// Mock source returning a configurable secret list.
///
/// # Example
/// ```ignore
/// let source = MockSecretSource::new().with_entries(vec![SecretEntry::new("A", "1")]);
/// source.push_error(FetchError::Timeout(Duration::from_secs(30)));
/// ```
#[derive(Clone, Default)]
pub struct MockSecretSource {
    /// Entries returned on success
    entries: Arc<Mutex<Vec<SecretEntry>>>,
    /// Errors returned before any success, consumed one per call
    errors: Arc<Mutex<Vec<FetchError>>>,
    /// Artificial latency per call
    delay: Arc<Mutex<Option<Duration>>>,
    /// Number of fetch calls made
    calls: Arc<AtomicUsize>,
    /// Scopes requested, in call order
    scopes: Arc<Mutex<Vec<String>>>,
}

impl MockSecretSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(self, entries: Vec<SecretEntry>) -> Self {
        self.set_entries(entries);
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock().unwrap() = Some(delay);
        self
    }

    /// Replace what later fetches return (simulates a remote change)
    pub fn set_entries(&self, entries: Vec<SecretEntry>) {
        *self.entries.lock().unwrap() = entries;
    }

    /// Queue an error for the next fetch
    pub fn push_error(&self, error: FetchError) {
        self.errors.lock().unwrap().push(error);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn scopes(&self) -> Vec<String> {
        self.scopes.lock().unwrap().clone()
    }
}

#[async_trait]
impl SecretSource for MockSecretSource {
    async fn fetch(
        &self,
        scope: &str,
        _credential: &AccessToken,
        timeout: Duration,
    ) -> Result<Vec<SecretEntry>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.scopes.lock().unwrap().push(scope.to_string());

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            if delay >= timeout {
                tokio::time::sleep(timeout).await;
                return Err(FetchError::Timeout(timeout));
            }
            tokio::time::sleep(delay).await;
        }

        let queued = {
            let mut errors = self.errors.lock().unwrap();
            if errors.is_empty() {
                None
            } else {
                Some(errors.remove(0))
            }
        };
        if let Some(err) = queued {
            return Err(err);
        }

        Ok(self.entries.lock().unwrap().clone())
    }
}
