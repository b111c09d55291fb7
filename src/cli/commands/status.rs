//! Status command implementation.

use crate::config::resolve_db_path;
use crate::error::{Error, Result};
use crate::model::SyncCheckpoint;
use crate::storage::{Event, EventType, SourceCount, SqliteStorage};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

use super::sync::format_ts;

/// Output for status command.
#[derive(Serialize)]
struct StatusOutput {
    database: String,
    checkpoints: Vec<SyncCheckpoint>,
    matches: Vec<SourceCount>,
    recent_passes: Vec<Event>,
}

/// Execute status command.
///
/// Read-only: never creates the database.
///
/// # Errors
///
/// Returns `NotInitialized` if there is no database yet.
pub fn execute(db_path: Option<&PathBuf>, limit: u32, json: bool) -> Result<()> {
    let db_path = resolve_db_path(db_path.map(PathBuf::as_path))
        .ok_or_else(|| Error::Config("Could not determine database path".into()))?;

    if !db_path.exists() {
        return Err(Error::NotInitialized { path: db_path });
    }

    let storage = SqliteStorage::open(&db_path)?;
    let output = StatusOutput {
        database: db_path.display().to_string(),
        checkpoints: storage.latest_checkpoints()?,
        matches: storage.match_counts()?,
        recent_passes: storage.recent_passes(None, limit)?,
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{}", "logsync status".cyan().bold());
    println!("{}", output.database.dimmed());
    println!();

    println!("{}", "Checkpoints".bold());
    if output.checkpoints.is_empty() {
        println!("  {}", "none yet".dimmed());
    }
    for cp in &output.checkpoints {
        println!(
            "  {:<6} {} .. {}",
            cp.provider,
            format_ts(cp.window_start),
            format_ts(cp.window_end)
        );
    }
    println!();

    println!("{}", "Matches".bold());
    if output.matches.is_empty() {
        println!("  {}", "none yet".dimmed());
    }
    for count in &output.matches {
        let latest = count.latest_start.map_or_else(|| "-".to_string(), format_ts);
        println!("  {:<6} {:>10}  latest {latest}", count.source_type, count.matches);
    }

    if !output.recent_passes.is_empty() {
        println!();
        println!("{}", "Recent passes".bold());
        for event in &output.recent_passes {
            let kind = match event.event_type {
                EventType::PassCompleted => "completed".green(),
                EventType::PassPartial => "partial".yellow(),
                EventType::PassCancelled => "cancelled".yellow(),
                EventType::PassFailed | EventType::CheckpointAppended => "failed".red(),
            };
            let when = chrono::DateTime::from_timestamp_millis(event.created_at)
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_default();
            println!("  {:<6} {kind:<10} {when} {}", event.entity_id, event.actor.dimmed());
            if let Some(ref comment) = event.comment {
                println!("         {comment}");
            }
        }
    }

    Ok(())
}
