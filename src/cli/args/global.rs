//! Global CLI options shared across all commands
//!
//! Collects the global flags once so handlers take a single argument, and
//! turns them into config overrides.

use std::path::PathBuf;

use crate::cli::{Cli, OutputFormat};
use crate::config::Overrides;

/// Global CLI options passed to all command handlers.
///
/// # Precedence
///
/// CLI flag > environment variable > config file > default. This struct
/// captures the CLI/env layer; the file is merged in `CommandContext`.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    /// Output format (pretty, table, json)
    pub format: OutputFormat,

    /// Custom config file path (defaults to ~/.credcache/config.yaml)
    pub config: Option<String>,

    /// Cache directory override
    pub cache_dir: Option<PathBuf>,

    /// Project id override
    pub project: Option<String>,

    /// TTL override in seconds
    pub ttl: Option<u64>,

    /// Fetch timeout override in seconds
    pub timeout: Option<u64>,

    /// Variable name prefix override
    pub prefix: Option<String>,

    /// Disable the background refresh trigger
    pub no_auto_refresh: bool,

    /// Report successes as well as failures
    pub verbose: bool,
}

impl GlobalOptions {
    /// Create GlobalOptions from a parsed CLI struct.
    pub fn from_cli(cli: &Cli) -> Self {
        Self {
            format: cli.format,
            config: cli.config.clone(),
            cache_dir: cli.cache_dir.clone(),
            project: cli.project.clone(),
            ttl: cli.ttl,
            timeout: cli.timeout,
            prefix: cli.prefix.clone(),
            no_auto_refresh: cli.no_auto_refresh,
            verbose: cli.verbose,
        }
    }

    /// Get config path as `Option<&str>`.
    pub fn config_ref(&self) -> Option<&str> {
        self.config.as_deref()
    }

    /// Config overrides carried by these flags
    pub fn overrides(&self) -> Overrides {
        Overrides {
            ttl_seconds: self.ttl,
            timeout_seconds: self.timeout,
            key_prefix: self.prefix.clone(),
            cache_dir: self.cache_dir.clone(),
            project_id: self.project.clone(),
            no_auto_refresh: self.no_auto_refresh,
            verbose: self.verbose,
        }
    }

    /// Re-render the flags for a child `credcache` process
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(ref config) = self.config {
            args.extend(["--config".to_string(), config.clone()]);
        }
        if let Some(ref dir) = self.cache_dir {
            args.extend(["--cache-dir".to_string(), dir.display().to_string()]);
        }
        if let Some(ref project) = self.project {
            args.extend(["--project".to_string(), project.clone()]);
        }
        if let Some(ttl) = self.ttl {
            args.extend(["--ttl".to_string(), ttl.to_string()]);
        }
        if let Some(timeout) = self.timeout {
            args.extend(["--timeout".to_string(), timeout.to_string()]);
        }
        if let Some(ref prefix) = self.prefix {
            args.extend(["--prefix".to_string(), prefix.clone()]);
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_from_options() {
        let opts = GlobalOptions {
            ttl: Some(60),
            prefix: Some("APP_".to_string()),
            project: Some("proj".to_string()),
            verbose: true,
            ..GlobalOptions::default()
        };

        let overrides = opts.overrides();
        assert_eq!(overrides.ttl_seconds, Some(60));
        assert_eq!(overrides.key_prefix.as_deref(), Some("APP_"));
        assert_eq!(overrides.project_id.as_deref(), Some("proj"));
        assert!(overrides.verbose);
        assert!(!overrides.no_auto_refresh);
    }

    #[test]
    fn test_to_args_round_trips_set_flags_only() {
        let opts = GlobalOptions {
            cache_dir: Some(PathBuf::from("/tmp/cc")),
            ttl: Some(30),
            ..GlobalOptions::default()
        };

        assert_eq!(
            opts.to_args(),
            vec!["--cache-dir", "/tmp/cc", "--ttl", "30"]
        );
        assert!(GlobalOptions::default().to_args().is_empty());
    }

    #[test]
    fn test_config_ref() {
        let opts = GlobalOptions {
            config: Some("/custom/path".to_string()),
            ..GlobalOptions::default()
        };
        assert_eq!(opts.config_ref(), Some("/custom/path"));
        assert_eq!(GlobalOptions::default().config_ref(), None);
    }
}
