//! Secret access commands: load, get, exec

use tokio::process::Command;

use crate::cli::{CommandContext, OutputFormat};
use crate::env;
use crate::error::{Error, Result};

/// Print export lines for `eval "$(credcache load)"`.
///
/// The background trigger starts first; a load that needs a refresh
/// shares its fetch rather than running a second one.
pub async fn load(ctx: &CommandContext) -> Result<()> {
    let background = ctx.cache.spawn_background_refresh();

    let loaded = ctx.cache.load_detailed().await;
    if let Some(handle) = background
        && let Err(e) = handle.await
    {
        log::debug!("Background refresh task ended abnormally: {}", e);
    }
    let loaded = loaded?;

    let prefix = &ctx.cache.config().key_prefix;
    match ctx.format {
        OutputFormat::Json => {
            let vars: serde_json::Map<String, serde_json::Value> = loaded
                .snapshot
                .entries
                .iter()
                .map(|entry| {
                    (
                        env::exposed_name(prefix, &entry.key),
                        serde_json::Value::String(entry.value.clone()),
                    )
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&vars)?);
        }
        _ => print!("{}", env::render_exports(&loaded.snapshot.entries, prefix)),
    }

    if !ctx.silent() && loaded.stale_error.is_none() {
        eprintln!("Loaded {} secrets", loaded.snapshot.entries.len());
    }

    Ok(())
}

/// Print one secret's raw value
pub async fn get(ctx: &CommandContext, key: &str) -> Result<()> {
    let value = ctx.cache.get(key).await?;
    println!("{}", value);
    Ok(())
}

/// Run a command with the cached secrets in its environment.
///
/// Exits with the child's status when it fails.
pub async fn exec(ctx: &CommandContext, command: &[String]) -> Result<()> {
    let Some((program, args)) = command.split_first() else {
        return Err(Error::Other("No command given".to_string()));
    };

    let entries = ctx.cache.load().await?;

    let mut child = Command::new(program);
    child.args(args);
    let count = env::apply(&entries, &ctx.cache.config().key_prefix, &mut child);
    drop(entries);
    log::debug!("Running '{}' with {} secrets", program, count);

    let status = child
        .status()
        .await
        .map_err(|e| Error::Other(format!("Failed to run '{}': {}", program, e)))?;

    if !status.success() {
        std::process::exit(status.code().unwrap_or(1));
    }
    Ok(())
}
