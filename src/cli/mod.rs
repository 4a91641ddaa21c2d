//! CLI command definitions and handlers

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::engine::ArgValueCandidates;
pub use clap_complete::Shell;

pub mod args;
pub mod cache;
pub mod completions;
pub mod context;
pub mod secret;
pub mod status;

pub use args::OutputFormat;
pub use context::CommandContext;

/// credcache - keeps a project's secrets cached locally and exposes them
/// as environment variables
#[derive(Parser, Debug)]
#[command(name = "credcache")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (pretty, table, json)
    #[arg(
        long,
        global = true,
        env = "CREDCACHE_FORMAT",
        default_value = "pretty",
        hide_env = true,
        hide_possible_values = true
    )]
    pub format: OutputFormat,

    /// Override config file location
    #[arg(long, global = true, env = "CREDCACHE_CONFIG", hide_env = true)]
    pub config: Option<String>,

    /// Override cache directory
    #[arg(long, global = true, env = "CREDCACHE_DIR", hide_env = true)]
    pub cache_dir: Option<PathBuf>,

    /// Project to fetch secrets for
    #[arg(long, global = true, env = "CREDCACHE_PROJECT_ID", hide_env = true)]
    pub project: Option<String>,

    /// Seconds a snapshot stays valid
    #[arg(long, global = true, env = "CREDCACHE_TTL", hide_env = true)]
    pub ttl: Option<u64>,

    /// Seconds allowed for one fetch
    #[arg(long, global = true, env = "CREDCACHE_TIMEOUT", hide_env = true)]
    pub timeout: Option<u64>,

    /// Prefix for exposed variable names
    #[arg(long, global = true, env = "CREDCACHE_PREFIX", hide_env = true)]
    pub prefix: Option<String>,

    /// Never start a background refresh
    #[arg(long, global = true, env = "CREDCACHE_NO_AUTO_REFRESH", hide_env = true)]
    pub no_auto_refresh: bool,

    /// Report successful operations, not just failures
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true, env = "CREDCACHE_DEBUG", hide_env = true)]
    pub debug: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch secrets if the cache is stale or missing
    Refresh {
        /// Refetch even if the cache is still valid
        #[arg(long)]
        force: bool,

        /// Suppress success output
        #[arg(long)]
        silent: bool,

        /// Refresh in a detached process and return immediately
        #[arg(long)]
        background: bool,
    },

    /// Print export lines for all cached secrets
    #[command(after_help = "\
Usage in a shell profile:
  eval \"$(credcache load)\"")]
    Load,

    /// Show cache health
    Status,

    /// Securely erase the cache
    Clear,

    /// List cached keys and whether they are loaded in this shell
    List,

    /// Print one secret's value
    Get {
        /// Secret name, with or without the configured prefix
        #[arg(add = ArgValueCandidates::new(completions::complete_secret_keys))]
        key: String,
    },

    /// Run a command with the cached secrets in its environment
    Exec {
        /// Command and arguments
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Print the cache directory
    Path,

    /// Generate shell completions
    #[command(after_help = "\
Static completions (subcommands/flags only):
  bash:   credcache completion bash > /etc/bash_completion.d/credcache
  zsh:    credcache completion zsh > \"${fpath[1]}/_credcache\"
  fish:   credcache completion fish > ~/.config/fish/completions/credcache.fish

Dynamic completions (includes cached secret names for `get`):
  bash:   echo 'source <(COMPLETE=bash credcache)' >> ~/.bashrc
  zsh:    echo 'source <(COMPLETE=zsh credcache)' >> ~/.zshrc
  fish:   echo 'COMPLETE=fish credcache | source' >> ~/.config/fish/config.fish")]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
