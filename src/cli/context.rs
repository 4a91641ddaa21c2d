//! Command execution context
//!
//! Loads the config file, merges the global flags into it, and builds the
//! cache manager every cache-touching command runs against.

use std::sync::Arc;

use crate::cache::CacheManager;
use crate::cli::OutputFormat;
use crate::cli::args::GlobalOptions;
use crate::config::{Config, SourceConfig};
use crate::credentials::EnvKeychainCredentials;
use crate::error::{CacheError, Result};
use crate::source::{CommandSource, HttpSource, SecretSource};

/// Cache manager as wired up for the CLI
pub type SecretCache = CacheManager<Box<dyn SecretSource>, EnvKeychainCredentials>;

/// Context for command execution
pub struct CommandContext {
    /// Shared so a background refresh task can hold it too
    pub cache: Arc<SecretCache>,
    /// Output format preference
    pub format: OutputFormat,
    /// Flags as given, for re-invoking ourselves
    pub opts: GlobalOptions,
}

impl CommandContext {
    /// Build the context from the config file and global flags.
    ///
    /// # Errors
    /// Returns error if the config file cannot be read or holds invalid
    /// values, or if the configured source cannot be set up.
    pub fn new(opts: &GlobalOptions) -> Result<Self> {
        let config = Config::load_at(opts.config_ref())?;
        let overrides = opts.overrides();
        let cache_config = config.resolve(&overrides)?;

        let source = build_source(&config.source)?;
        let credentials =
            EnvKeychainCredentials::new(config.credentials.clone(), config.project_id(&overrides));

        log::debug!(
            "Cache at {} (ttl {:?}, timeout {:?})",
            cache_config.cache_dir.display(),
            cache_config.ttl,
            cache_config.timeout
        );

        Ok(Self {
            cache: Arc::new(CacheManager::new(cache_config, source, credentials)),
            format: opts.format,
            opts: opts.clone(),
        })
    }

    /// Whether success messages should be suppressed
    pub fn silent(&self) -> bool {
        self.cache.config().silent
    }
}

fn build_source(config: &SourceConfig) -> Result<Box<dyn SecretSource>> {
    Ok(match config {
        SourceConfig::Command { program, args } => {
            Box::new(CommandSource::new(program.clone(), args.clone()))
        }
        SourceConfig::Http { url } => {
            Box::new(HttpSource::new(url.clone()).map_err(CacheError::from)?)
        }
    })
}
