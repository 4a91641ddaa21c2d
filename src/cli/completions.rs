//! Shell completions
//!
//! Static scripts come from `credcache completion <shell>`. Dynamic
//! completion (`COMPLETE=<shell> credcache`) additionally offers secret
//! names for `get`, read from the local snapshot only. Completion never
//! fetches and never prints errors.

use std::path::PathBuf;

use clap::CommandFactory;
use clap_complete::engine::CompletionCandidate;

use crate::cache::CacheStore;
use crate::cli::{Cli, Shell};
use crate::config::{Config, Overrides};
use crate::env::exposed_name;
use crate::error::Result;

/// Write a static completion script to stdout
pub fn generate(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    clap_complete::generate(shell, &mut cmd, name, &mut std::io::stdout());
    Ok(())
}

/// Cached secret names, as exposed with the configured prefix.
///
/// Flags are not parsed yet at completion time, so only the environment
/// and the config file are consulted.
pub fn complete_secret_keys() -> Vec<CompletionCandidate> {
    let env = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
    let overrides = Overrides {
        cache_dir: env("CREDCACHE_DIR").map(PathBuf::from),
        key_prefix: env("CREDCACHE_PREFIX"),
        ..Overrides::default()
    };

    let Ok(config) = Config::load_at(env("CREDCACHE_CONFIG").as_deref()) else {
        return vec![];
    };
    let Ok(cache_config) = config.resolve(&overrides) else {
        return vec![];
    };
    let Ok(snapshot) = CacheStore::new(cache_config.cache_dir.clone()).read() else {
        return vec![];
    };

    snapshot
        .entries
        .iter()
        .map(|entry| CompletionCandidate::new(exposed_name(&cache_config.key_prefix, &entry.key)))
        .collect()
}
