//! Providers command implementation.

use crate::config::load_config;
use crate::error::Result;
use colored::Colorize;
use serde::Serialize;

#[derive(Serialize)]
struct ProviderRow<'a> {
    tag: &'a str,
    format: &'a str,
    field_count: usize,
    has_lobby: bool,
    live_path: &'a str,
    archive_path: &'a str,
}

/// List the built-in providers merged with those in `config.json`.
///
/// # Errors
///
/// Returns an error if the config file cannot be parsed.
pub fn execute(json: bool) -> Result<()> {
    let settings = load_config()?.sync_settings(None)?;

    let rows: Vec<ProviderRow<'_>> = settings
        .providers
        .iter()
        .map(|p| ProviderRow {
            tag: &p.tag,
            format: p.format.as_str(),
            field_count: p.field_count(),
            has_lobby: p.has_lobby(),
            live_path: &p.live_path,
            archive_path: &p.archive_path,
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string(&rows)?);
        return Ok(());
    }

    println!("{} {}", "Base URL:".bold(), settings.base_url);
    for row in &rows {
        println!(
            "{:<6} {:<6} fields={} {}",
            row.tag.cyan().bold(),
            row.format,
            row.field_count,
            if row.has_lobby { "lobby" } else { "" }
        );
        println!("       live    {}", row.live_path.dimmed());
        println!("       archive {}", row.archive_path.dimmed());
    }
    Ok(())
}
