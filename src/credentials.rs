//! Access token and project id resolution
//!
//! Credentials come from the environment first and the system keychain
//! second. credcache only reads them; it never creates or rotates tokens.

use std::fmt;

use keyring::{Entry, Error as KeyringError};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::CredentialConfig;
use crate::error::CacheError;

/// Keychain account holding the access token
const KEYCHAIN_TOKEN_USER: &str = "access-token";

/// Keychain account holding the default project id
const KEYCHAIN_PROJECT_USER: &str = "project-id";

/// Secret-manager access token, wiped from memory on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for handing to the secret manager
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// Resolved inputs for one fetch
#[derive(Debug, Clone)]
pub struct Credentials {
    pub project_id: String,
    pub token: AccessToken,
}

/// Resolves the project id and access token right before a fetch
pub trait CredentialProvider: Send + Sync {
    fn resolve(&self) -> Result<Credentials, CacheError>;
}

type EnvLookup = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Environment-then-keychain credential resolution
pub struct EnvKeychainCredentials {
    config: CredentialConfig,
    project_override: Option<String>,
    env: EnvLookup,
}

impl EnvKeychainCredentials {
    /// Resolve against the process environment
    pub fn new(config: CredentialConfig, project_override: Option<String>) -> Self {
        Self::with_env(config, project_override, |name| std::env::var(name).ok())
    }

    /// Resolve against a custom environment lookup
    pub fn with_env(
        config: CredentialConfig,
        project_override: Option<String>,
        env: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            config,
            project_override,
            env: Box::new(env),
        }
    }

    fn env_value(&self, name: &str) -> Option<String> {
        (self.env)(name).filter(|v| !v.trim().is_empty())
    }

    fn keychain_value(&self, user: &str) -> Result<Option<String>, CacheError> {
        let Some(service) = self.config.keyring_service.as_deref() else {
            return Ok(None);
        };

        let entry = Entry::new(service, user).map_err(map_keyring_error)?;
        keychain_lookup(entry.get_password())
    }

    fn resolve_token(&self) -> Result<AccessToken, CacheError> {
        if let Some(token) = self.env_value(&self.config.token_env) {
            log::debug!("Access token taken from ${}", self.config.token_env);
            return Ok(AccessToken::new(token));
        }
        if let Some(token) = self.keychain_value(KEYCHAIN_TOKEN_USER)? {
            log::debug!("Access token taken from the system keychain");
            return Ok(AccessToken::new(token));
        }
        Err(CacheError::CredentialMissing)
    }

    fn resolve_project(&self) -> Result<String, CacheError> {
        if let Some(project) = self
            .project_override
            .as_deref()
            .filter(|p| !p.trim().is_empty())
        {
            return Ok(project.to_string());
        }
        if let Some(project) = self.env_value(&self.config.project_env) {
            return Ok(project);
        }
        self.keychain_value(KEYCHAIN_PROJECT_USER)?
            .ok_or(CacheError::ScopeMissing)
    }
}

impl CredentialProvider for EnvKeychainCredentials {
    fn resolve(&self) -> Result<Credentials, CacheError> {
        let token = self.resolve_token()?;
        let project_id = self.resolve_project()?;
        Ok(Credentials { project_id, token })
    }
}

/// Only a missing entry means "not stored"; any other keychain failure
/// is reported so it is not mistaken for an absent credential
fn keychain_lookup(result: Result<String, KeyringError>) -> Result<Option<String>, CacheError> {
    match result {
        Ok(value) if !value.trim().is_empty() => Ok(Some(value)),
        Ok(_) | Err(KeyringError::NoEntry) => Ok(None),
        Err(err) => {
            log::warn!("Keychain lookup failed: {}", err);
            Err(map_keyring_error(err))
        }
    }
}

fn map_keyring_error(err: KeyringError) -> CacheError {
    CacheError::Credential(format!("Keychain error: {}", err))
}
