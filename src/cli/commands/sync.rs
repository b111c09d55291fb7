//! Sync command implementation.
//!
//! Each provider runs its own pass on its own database connection; the
//! passes share one HTTP client and one cancellation flag. Ctrl-C sets the
//! flag, so every walk stops before its next bucket and checkpoints what it
//! already wrote.

use crate::config::{load_config, resolve_db_path, SyncSettings};
use crate::error::{Error, Result};
use crate::model::feed_time;
use crate::storage::SqliteStorage;
use crate::sync::{HttpBucketFetcher, PassReport, SyncEngine};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Execute the sync command.
///
/// # Errors
///
/// Returns `UnknownProvider` before any pass starts if a tag is not
/// configured, and `PassFailed` (or `Cancelled`) after all passes finished
/// if any of them did not reach its end.
pub fn execute(
    providers: &[String],
    db_path: Option<&PathBuf>,
    timeout: Option<u64>,
    json: bool,
) -> Result<()> {
    let settings = load_config()?.sync_settings(timeout)?;
    let db_path = prepare_db_path(db_path)?;

    let tags = if providers.is_empty() {
        settings.providers.tags()
    } else {
        for tag in providers {
            settings.providers.get(tag)?;
        }
        providers.to_vec()
    };

    let rt = runtime()?;
    let reports = rt.block_on(catch_up_all(&settings, &db_path, tags))?;

    print_reports(&reports, json)?;
    check_reports(&reports)
}

/// Resolve the database path and make sure its directory exists.
pub(crate) fn prepare_db_path(db_path: Option<&PathBuf>) -> Result<PathBuf> {
    let path = resolve_db_path(db_path.map(PathBuf::as_path))
        .ok_or_else(|| Error::Config("Could not determine database path".into()))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(path)
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to start async runtime: {e}")))
}

/// Set `cancel` on the first Ctrl-C.
pub(crate) fn cancel_on_interrupt(cancel: Arc<AtomicBool>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current bucket");
            cancel.store(true, Ordering::SeqCst);
        }
    });
}

async fn catch_up_all(
    settings: &SyncSettings,
    db_path: &Path,
    tags: Vec<String>,
) -> Result<Vec<PassReport>> {
    let cancel = Arc::new(AtomicBool::new(false));
    cancel_on_interrupt(Arc::clone(&cancel));

    let fetcher = HttpBucketFetcher::new(&settings.base_url, settings.timeout)?;
    let mut passes = JoinSet::new();

    for tag in tags {
        let storage = SqliteStorage::open(db_path)?;
        let mut engine = SyncEngine::new(fetcher.clone(), storage, settings.providers.clone())
            .with_cancel_flag(Arc::clone(&cancel))
            .with_lookback_days(settings.lookback_days);

        debug!(provider = %tag, "Spawning catch-up pass");
        passes.spawn(async move { engine.run_catch_up(&tag).await });
    }

    let mut reports = Vec::new();
    while let Some(joined) = passes.join_next().await {
        let report = joined.map_err(|e| Error::Other(format!("Sync task failed: {e}")))??;
        reports.push(report);
    }
    reports.sort_by(|a, b| a.provider.cmp(&b.provider));
    Ok(reports)
}

/// Turn unsuccessful reports into the command's error.
pub(crate) fn check_reports(reports: &[PassReport]) -> Result<()> {
    let failed: Vec<&PassReport> = reports.iter().filter(|r| !r.success).collect();
    if failed.is_empty() {
        return Ok(());
    }
    if failed.iter().all(|r| r.cancelled) {
        return Err(Error::Cancelled);
    }
    Err(Error::PassFailed {
        providers: failed.iter().map(|r| r.provider.clone()).collect(),
    })
}

pub(crate) fn print_reports(reports: &[PassReport], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(reports)?);
        return Ok(());
    }

    for report in reports {
        print_report(report);
    }
    Ok(())
}

fn print_report(report: &PassReport) {
    let state = if report.success {
        "ok".green()
    } else if report.cancelled {
        "cancelled".yellow()
    } else {
        "failed".red()
    };

    println!("{} {} [{}]", "Provider".cyan().bold(), report.provider.bold(), state);
    println!(
        "  Window:     {} .. {}",
        format_ts(report.window_start),
        format_ts(report.checkpoint_end)
    );

    let fell_back = report.buckets.iter().filter(|b| b.fell_back).count();
    if fell_back > 0 {
        println!("  Buckets:    {} ({fell_back} hourly fallback)", report.buckets.len());
    } else {
        println!("  Buckets:    {}", report.buckets.len());
    }
    println!(
        "  Records:    {} new, {} duplicate",
        report.records_written, report.duplicates
    );
    if report.warnings > 0 {
        println!("  Dropped:    {} lines", report.warnings.to_string().yellow());
    }
    if let Some(ref bucket) = report.failed_bucket {
        println!("  Failed at:  {bucket}");
    }
    if let Some(ref error) = report.error {
        println!("  Error:      {}", error.red());
    }
    if !report.checkpoint_appended {
        println!("  {}", "Checkpoint unchanged".dimmed());
    }
    println!("  {}", report.run_id.dimmed());
}

/// Feed wall-clock rendering of epoch seconds.
pub(crate) fn format_ts(ts: i64) -> String {
    feed_time(ts).map_or_else(
        |_| ts.to_string(),
        |t| t.format("%Y-%m-%d %H:%M %:z").to_string(),
    )
}
