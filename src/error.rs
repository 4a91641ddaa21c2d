//! Error types for credcache

use std::time::Duration;
use thiserror::Error;

/// Result type alias for credcache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type for the application
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Operation failed: {0}")]
    Other(String),
}

/// Errors from the remote secret source
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Access token rejected by the secret manager")]
    Unauthenticated,

    #[error("Project not found or not accessible with this access token")]
    Unauthorized,

    #[error("Secret fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed secret payload: {0}")]
    MalformedResponse(String),

    #[error("Secret manager unreachable: {0}")]
    Unreachable(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            FetchError::Unreachable("Failed to connect to secret manager".to_string())
        } else {
            FetchError::Unreachable(err.to_string())
        }
    }
}

/// Errors from the on-disk cache store
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("No cached secrets")]
    NotFound,

    #[error("Cache is corrupt: {0}")]
    Corrupt(String),

    #[error("Cache I/O error: {0}")]
    Io(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Could not determine a cache directory")]
    NoCacheDir,
}

impl StoreError {
    /// Wrap an I/O error with context, keeping permission failures distinct
    pub fn io(context: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                StoreError::PermissionDenied(format!("{}: {}", context, err))
            }
            _ => StoreError::Io(format!("{}: {}", context, err)),
        }
    }
}

/// Errors from the cache lifecycle, tagged by the stage that failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Access token not found. Set BWS_ACCESS_TOKEN or store it in the system keychain.")]
    CredentialMissing,

    #[error("Project id not found. Set BWS_PROJECT_ID or pass --project.")]
    ScopeMissing,

    #[error("Credential lookup failed: {0}")]
    Credential(String),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Failed to persist secrets: {0}")]
    Persist(StoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Secret not found: {0}")]
    NotFound(String),
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
