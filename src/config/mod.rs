//! Configuration management for credcache
//!
//! The YAML file is optional. Values found there are overridden by CLI
//! flags and environment variables, then frozen into a [`CacheConfig`].

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result, StoreError};

/// Default time-to-live for a cached snapshot (24 hours)
pub const DEFAULT_TTL_SECONDS: u64 = 86_400;

/// Default bound on one remote fetch
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 30;

/// Configuration file contents
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_seconds: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_refresh: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub silent: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_prefix: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    /// Default project to fetch secrets for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub credentials: CredentialConfig,
}

/// Which secret source to use and how to reach it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    /// Run the secret manager's CLI
    Command {
        #[serde(default = "default_program")]
        program: String,
        /// Arguments; `{scope}` is replaced with the project id
        #[serde(default = "default_args")]
        args: Vec<String>,
    },
    /// Call an HTTP endpoint directly
    Http { url: String },
}

fn default_program() -> String {
    "bws".to_string()
}

fn default_args() -> Vec<String> {
    ["secret", "list", "{scope}", "--output", "json"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for SourceConfig {
    fn default() -> Self {
        SourceConfig::Command {
            program: default_program(),
            args: default_args(),
        }
    }
}

/// Where credentials are looked up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialConfig {
    #[serde(default = "default_token_env")]
    pub token_env: String,

    #[serde(default = "default_project_env")]
    pub project_env: String,

    /// Keychain service name; `None` disables the keychain lookup
    #[serde(default = "default_keyring_service")]
    pub keyring_service: Option<String>,
}

fn default_token_env() -> String {
    "BWS_ACCESS_TOKEN".to_string()
}

fn default_project_env() -> String {
    "BWS_PROJECT_ID".to_string()
}

fn default_keyring_service() -> Option<String> {
    Some("credcache".to_string())
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            token_env: default_token_env(),
            project_env: default_project_env(),
            keyring_service: default_keyring_service(),
        }
    }
}

/// Runtime settings for one cache instance, immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub auto_refresh: bool,
    pub silent: bool,
    pub key_prefix: String,
    pub timeout: Duration,
    pub cache_dir: PathBuf,
}

impl CacheConfig {
    /// Defaults rooted at a specific cache directory
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_TTL_SECONDS),
            auto_refresh: true,
            silent: true,
            key_prefix: String::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            cache_dir: cache_dir.into(),
        }
    }

    /// Platform cache location (~/.cache/credcache on Linux)
    pub fn default_cache_dir() -> std::result::Result<PathBuf, StoreError> {
        let base = dirs::cache_dir().ok_or(StoreError::NoCacheDir)?;
        Ok(base.join("credcache"))
    }
}

/// Overrides collected from CLI flags and environment variables
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub ttl_seconds: Option<u64>,
    pub timeout_seconds: Option<u64>,
    pub key_prefix: Option<String>,
    pub cache_dir: Option<PathBuf>,
    pub project_id: Option<String>,
    pub no_auto_refresh: bool,
    pub verbose: bool,
}

impl Config {
    /// Get the default config file path
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::Invalid(
            "Could not determine home directory".to_string(),
        ))?;

        Ok(home.join(".credcache").join("config.yaml"))
    }

    /// Load from an explicit path, or from the default path if it exists
    pub fn load_at(path: Option<&str>) -> Result<Self> {
        match path {
            Some(p) => Self::load_from(Path::new(p)),
            None => {
                let default = Self::default_path()?;
                if default.exists() {
                    Self::load_from(&default)
                } else {
                    log::debug!("No config file at {}, using defaults", default.display());
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()).into());
        }

        let contents = std::fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;

        Ok(config)
    }

    /// Freeze file values and overrides into runtime settings
    pub fn resolve(&self, overrides: &Overrides) -> Result<CacheConfig> {
        let ttl_seconds = overrides
            .ttl_seconds
            .or(self.ttl_seconds)
            .unwrap_or(DEFAULT_TTL_SECONDS);
        if ttl_seconds == 0 {
            return Err(ConfigError::Invalid("ttl_seconds must be greater than 0".to_string()).into());
        }

        let timeout_seconds = overrides
            .timeout_seconds
            .or(self.timeout_seconds)
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS);
        if timeout_seconds == 0 {
            return Err(
                ConfigError::Invalid("timeout_seconds must be greater than 0".to_string()).into(),
            );
        }

        let cache_dir = match overrides.cache_dir.clone().or_else(|| self.cache_dir.clone()) {
            Some(dir) => dir,
            None => CacheConfig::default_cache_dir().map_err(|e| ConfigError::Invalid(e.to_string()))?,
        };

        Ok(CacheConfig {
            ttl: Duration::from_secs(ttl_seconds),
            auto_refresh: !overrides.no_auto_refresh && self.auto_refresh.unwrap_or(true),
            silent: !overrides.verbose && self.silent.unwrap_or(true),
            key_prefix: overrides
                .key_prefix
                .clone()
                .or_else(|| self.key_prefix.clone())
                .unwrap_or_default(),
            timeout: Duration::from_secs(timeout_seconds),
            cache_dir,
        })
    }

    /// Project id from overrides first, then the file
    pub fn project_id(&self, overrides: &Overrides) -> Option<String> {
        overrides.project_id.clone().or_else(|| self.project_id.clone())
    }
}
