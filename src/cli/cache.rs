//! Cache management commands: refresh, clear, path

use std::io::IsTerminal;
use std::process::Stdio;
use std::time::Duration;

use colored::Colorize;
use indicatif::ProgressBar;

use crate::cache::{RefreshOutcome, RefreshReport};
use crate::cache::status::format_duration;
use crate::cli::{CommandContext, OutputFormat};
use crate::error::Result;

/// Refresh the cache, or hand the refresh to a detached child process
pub async fn refresh(ctx: &CommandContext, force: bool, silent: bool, background: bool) -> Result<()> {
    if background {
        return spawn_detached(ctx, force);
    }

    let silent = silent || ctx.silent();
    let spinner = (!silent && std::io::stderr().is_terminal()).then(|| {
        let pb = ProgressBar::new_spinner();
        pb.set_message("Fetching secrets...");
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    });

    let result = ctx.cache.refresh(force).await;
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }
    let report = result?;

    match ctx.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "outcome": outcome_name(report.outcome),
                "secret_count": report.secret_count,
                "remaining_seconds": report.remaining.as_secs(),
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        _ if silent => {}
        _ => eprintln!("{} {}", "✓".green(), describe(&report)),
    }

    Ok(())
}

/// Securely erase the cache
pub fn clear(ctx: &CommandContext) -> Result<()> {
    let removed = ctx.cache.clear()?;

    match ctx.format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "removed": removed,
                "success": true,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        _ => {
            if removed {
                println!("Cleared cached secrets");
            } else {
                println!("Cache was already empty");
            }
        }
    }

    Ok(())
}

/// Show cache path
pub fn path(ctx: &CommandContext) -> Result<()> {
    println!("{}", ctx.cache.store().dir().display());
    Ok(())
}

fn outcome_name(outcome: RefreshOutcome) -> &'static str {
    match outcome {
        RefreshOutcome::Fetched => "fetched",
        RefreshOutcome::StillValid => "still_valid",
        RefreshOutcome::Joined => "joined",
    }
}

fn describe(report: &RefreshReport) -> String {
    let expires = format_duration(report.remaining);
    match report.outcome {
        RefreshOutcome::Fetched => format!(
            "Cached {} secrets (valid for {})",
            report.secret_count, expires
        ),
        RefreshOutcome::StillValid => format!(
            "Cache still valid: {} secrets, expires in {}",
            report.secret_count, expires
        ),
        RefreshOutcome::Joined => format!(
            "Cache refreshed by another caller: {} secrets, expires in {}",
            report.secret_count, expires
        ),
    }
}

/// Re-run ourselves as `refresh --silent` without waiting on it
fn spawn_detached(ctx: &CommandContext, force: bool) -> Result<()> {
    let config = ctx.cache.config();
    if !config.auto_refresh {
        log::debug!("Auto-refresh disabled; not starting a background refresh");
        return Ok(());
    }
    if !force && ctx.cache.store().is_valid(config.ttl) {
        log::debug!("Cache still valid; not starting a background refresh");
        return Ok(());
    }

    let exe = std::env::current_exe()?;
    let mut command = std::process::Command::new(exe);
    command
        .args(ctx.opts.to_args())
        .args(["refresh", "--silent"])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    if force {
        command.arg("--force");
    }

    let child = command.spawn()?;
    log::debug!("Background refresh started (pid {})", child.id());
    Ok(())
}
