//! Remote secret sources
//!
//! A source lists every secret in one project (scope) using an access
//! token. Sources never touch the disk; persisting is the cache store's job.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::credentials::AccessToken;
use crate::error::FetchError;

pub mod command;
pub mod http;
#[cfg(test)]
pub mod mock;

pub use command::CommandSource;
pub use http::HttpSource;
#[cfg(test)]
pub use mock::MockSecretSource;

/// One cached secret
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SecretEntry {
    pub key: String,
    pub value: String,
}

impl SecretEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Debug for SecretEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretEntry")
            .field("key", &self.key)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// A source of secrets for one project
#[async_trait]
pub trait SecretSource: Send + Sync {
    /// List every secret in `scope`.
    ///
    /// Either the full, validated list is returned or an error; a partial
    /// list is never reported as success.
    async fn fetch(
        &self,
        scope: &str,
        credential: &AccessToken,
        timeout: Duration,
    ) -> Result<Vec<SecretEntry>, FetchError>;
}

#[async_trait]
impl<S: SecretSource + ?Sized> SecretSource for Box<S> {
    async fn fetch(
        &self,
        scope: &str,
        credential: &AccessToken,
        timeout: Duration,
    ) -> Result<Vec<SecretEntry>, FetchError> {
        (**self).fetch(scope, credential, timeout).await
    }
}

/// Wire shape of one secret. Extra fields in the payload are ignored.
#[derive(Deserialize)]
struct RawSecret {
    key: String,
    value: String,
}

/// Parse a secret-manager payload into entries.
///
/// The payload must be a JSON array of objects with string `key` and
/// `value` fields. Duplicate keys keep the position of their first
/// occurrence and the value of their last.
pub fn parse_entries(payload: &[u8]) -> Result<Vec<SecretEntry>, FetchError> {
    let raw: Vec<RawSecret> = serde_json::from_slice(payload)
        .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;

    let mut entries: Vec<SecretEntry> = Vec::with_capacity(raw.len());
    for secret in raw {
        if secret.key.is_empty() {
            return Err(FetchError::MalformedResponse(
                "secret with an empty key".to_string(),
            ));
        }
        match entries.iter_mut().find(|e| e.key == secret.key) {
            Some(existing) => {
                log::warn!("Duplicate secret key '{}', keeping the last value", secret.key);
                existing.value.zeroize();
                existing.value = secret.value;
            }
            None => entries.push(SecretEntry::new(secret.key, secret.value)),
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entries_preserves_order() {
        let payload = br#"[
            {"id": "1", "key": "DB_URL", "value": "postgres://x", "note": ""},
            {"id": "2", "key": "API_KEY", "value": "abc"}
        ]"#;

        let entries = parse_entries(payload).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], SecretEntry::new("DB_URL", "postgres://x"));
        assert_eq!(entries[1], SecretEntry::new("API_KEY", "abc"));
    }

    #[test]
    fn test_parse_entries_empty_array() {
        let entries = parse_entries(b"[]").unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_parse_entries_rejects_object() {
        let err = parse_entries(br#"{"key": "A", "value": "1"}"#).unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_entries_rejects_non_string_value() {
        let err = parse_entries(br#"[{"key": "A", "value": 1}]"#).unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_entries_rejects_missing_value() {
        let err = parse_entries(br#"[{"key": "A"}]"#).unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_entries_rejects_empty_key() {
        let err = parse_entries(br#"[{"key": "", "value": "1"}]"#).unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_entries_rejects_garbage() {
        let err = parse_entries(b"Error: something went wrong").unwrap_err();
        assert!(matches!(err, FetchError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_entries_duplicate_keys_last_value_wins() {
        let payload = br#"[
            {"key": "A", "value": "1"},
            {"key": "B", "value": "2"},
            {"key": "A", "value": "3"}
        ]"#;

        let entries = parse_entries(payload).unwrap();
        assert_eq!(
            entries,
            vec![SecretEntry::new("A", "3"), SecretEntry::new("B", "2")]
        );
    }

    #[test]
    fn test_secret_entry_debug_redacts_value() {
        let entry = SecretEntry::new("TOKEN", "hunter2");
        let debug = format!("{:?}", entry);
        assert!(debug.contains("TOKEN"));
        assert!(!debug.contains("hunter2"));
    }
}
