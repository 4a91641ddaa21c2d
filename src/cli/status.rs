//! Status and key listing commands

use colored::Colorize;
use tabled::settings::object::Rows;
use tabled::settings::{Alignment, Style};
use tabled::{Table, Tabled};

use crate::cache::status::format_duration;
use crate::cache::{AGE_UNKNOWN, CacheStatus, KeyPresence};
use crate::cli::{CommandContext, OutputFormat};
use crate::error::Result;
use crate::output::{self, Formattable, json::format_json};

/// Show cache health
pub fn run(ctx: &CommandContext) -> Result<()> {
    let status = ctx.cache.status();

    match ctx.format {
        OutputFormat::Json => println!("{}", format_json(&status_json(&status))?),
        OutputFormat::Table => println!("{}", render_table(&status_rows(&status))),
        OutputFormat::Pretty => print_pretty(&status),
    }

    Ok(())
}

/// List cached keys and whether this shell has them loaded
pub fn list(ctx: &CommandContext) -> Result<()> {
    let keys = ctx.cache.list_loaded_keys()?;
    output::print(keys.as_slice(), ctx.format)
}

const NO_SECRETS: &str = "No secrets cached.";

/// Rounded table, header row centered
fn render_table<T: Tabled>(rows: &[T]) -> String {
    Table::new(rows)
        .with(Style::rounded())
        .modify(Rows::first(), Alignment::center())
        .to_string()
}

fn print_pretty(status: &CacheStatus) {
    println!("{}\n", "Secret Cache Status".bold());
    println!("Location: {}", status.cache_dir.display().to_string().cyan());
    println!();

    if !status.exists {
        println!("{} No secrets cached", "○".dimmed());
        println!("  → Run 'credcache refresh' to fetch");
        return;
    }

    if status.degraded {
        println!(
            "{} Cache metadata unreadable (will refetch on next load)",
            "⚠".yellow()
        );
    } else if status.valid_now {
        println!(
            "{} Cache valid (expires in {})",
            "✓".green(),
            format_duration(status.remaining)
        );
    } else {
        println!(
            "{} Cache stale (will refresh on next load)",
            "✗".red()
        );
    }

    println!("  Secrets:  {}", status.secret_count);
    println!("  Age:      {}", format_duration(status.age));
    println!("  TTL:      {}", format_duration(status.ttl));
    if let Some(fetched_at) = status.fetched_at {
        println!(
            "  Fetched:  {}",
            fetched_at
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
        );
    }
}

fn status_json(status: &CacheStatus) -> serde_json::Value {
    serde_json::json!({
        "exists": status.exists,
        "valid_now": status.valid_now,
        "degraded": status.degraded,
        "secret_count": status.secret_count,
        "age_seconds": (status.age != AGE_UNKNOWN).then(|| status.age.as_secs()),
        "remaining_seconds": status.remaining.as_secs(),
        "fetched_at": status.fetched_at.map(|t| t.to_rfc3339()),
        "ttl_seconds": status.ttl.as_secs(),
        "cache_dir": status.cache_dir.display().to_string(),
    })
}

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "FIELD")]
    field: &'static str,
    #[tabled(rename = "VALUE")]
    value: String,
}

fn status_rows(status: &CacheStatus) -> Vec<FieldRow> {
    let row = |field, value: String| FieldRow { field, value };
    vec![
        row("exists", status.exists.to_string()),
        row("valid_now", status.valid_now.to_string()),
        row("degraded", status.degraded.to_string()),
        row("secret_count", status.secret_count.to_string()),
        row("age", format_duration(status.age)),
        row("remaining", format_duration(status.remaining)),
        row(
            "fetched_at",
            status
                .fetched_at
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string()),
        ),
        row("ttl", format_duration(status.ttl)),
        row("cache_dir", status.cache_dir.display().to_string()),
    ]
}

#[derive(Tabled)]
struct KeyRow {
    #[tabled(rename = "KEY")]
    key: String,
    #[tabled(rename = "LOADED")]
    loaded: &'static str,
}

impl Formattable for [KeyPresence] {
    fn format(&self, format: OutputFormat) -> Result<String> {
        match format {
            OutputFormat::Json => Ok(format_json(self)?),
            OutputFormat::Table => {
                if self.is_empty() {
                    return Ok(NO_SECRETS.to_string());
                }
                let rows: Vec<KeyRow> = self
                    .iter()
                    .map(|k| KeyRow {
                        key: k.key.clone(),
                        loaded: if k.loaded_into_environment { "yes" } else { "no" },
                    })
                    .collect();
                Ok(render_table(&rows))
            }
            OutputFormat::Pretty => {
                if self.is_empty() {
                    return Ok(NO_SECRETS.to_string());
                }
                Ok(self
                    .iter()
                    .map(|k| {
                        let mark = if k.loaded_into_environment {
                            "✓".green()
                        } else {
                            "○".dimmed()
                        };
                        format!("{} {}", mark, k.key)
                    })
                    .collect::<Vec<_>>()
                    .join("\n"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    fn empty_status() -> CacheStatus {
        CacheStatus {
            exists: false,
            valid_now: false,
            degraded: false,
            secret_count: 0,
            age: AGE_UNKNOWN,
            remaining: Duration::ZERO,
            fetched_at: None,
            ttl: Duration::from_secs(3600),
            cache_dir: PathBuf::from("/tmp/credcache"),
        }
    }

    #[test]
    fn test_status_json_empty_cache() {
        let json = status_json(&empty_status());
        assert_eq!(json["exists"], false);
        assert!(json["age_seconds"].is_null());
        assert!(json["fetched_at"].is_null());
        assert_eq!(json["ttl_seconds"], 3600);
        assert_eq!(json["cache_dir"], "/tmp/credcache");
    }

    #[test]
    fn test_status_rows_cover_every_field() {
        let rows = status_rows(&empty_status());
        assert_eq!(rows.len(), 9);
        assert_eq!(rows[4].value, "unknown");
        assert_eq!(rows[6].value, "-");
    }

    #[test]
    fn test_key_listing_formats() {
        let keys = vec![
            KeyPresence {
                key: "APP_DB".to_string(),
                loaded_into_environment: true,
            },
            KeyPresence {
                key: "APP_API".to_string(),
                loaded_into_environment: false,
            },
        ];

        let table = keys.as_slice().format(OutputFormat::Table).unwrap();
        assert!(table.contains('╭'));
        assert!(table.contains("KEY"));
        assert!(table.contains("APP_DB"));
        assert!(table.contains("yes"));
        assert!(table.contains("no"));

        let json = keys.as_slice().format(OutputFormat::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["data"][0]["key"], "APP_DB");
        assert_eq!(parsed["data"][1]["loaded_into_environment"], false);

        let empty: Vec<KeyPresence> = Vec::new();
        for format in [OutputFormat::Pretty, OutputFormat::Table] {
            assert_eq!(empty.as_slice().format(format).unwrap(), NO_SECRETS);
        }
    }
}
