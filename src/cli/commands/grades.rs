//! Grades command implementation.

use crate::config::load_config;
use crate::error::Result;
use crate::grades::{GradeWatcher, HttpGradeFeed, HttpRankRefresher, PollReport, SeenKeys};
use colored::Colorize;
use std::time::Duration;
use tracing::{info, warn};

use super::sync::runtime;

/// Poll the grade-change feed once, or every `interval` seconds until Ctrl-C.
///
/// In the loop a failed poll is logged and retried on the next tick.
///
/// # Errors
///
/// Returns an error if the clients cannot be built, or if a single poll
/// fails.
pub fn execute(interval: Option<u64>, timeout: Option<u64>, json: bool) -> Result<()> {
    let config = load_config()?;
    let sync = config.sync_settings(timeout)?;
    let settings = config.grade_settings();

    let feed = HttpGradeFeed::new(&settings.feed_url, sync.timeout)?;
    let refresher = HttpRankRefresher::new(&settings.rank_url, settings.rank_timeout)?;
    let mut watcher = GradeWatcher::new(feed, refresher, SeenKeys::new(settings.margin));

    let rt = runtime()?;
    rt.block_on(async {
        let Some(secs) = interval else {
            let report = watcher.poll().await?;
            return print_poll(&report, json);
        };

        let period = Duration::from_secs(secs.max(1));
        info!(feed = %settings.feed_url, every_secs = period.as_secs(), "Watching grade changes");
        loop {
            match watcher.poll().await {
                Ok(report) => print_poll(&report, json)?,
                Err(e) => warn!(error = %e, "Grade feed poll failed"),
            }

            tokio::select! {
                () = tokio::time::sleep(period) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, stopping grade watcher");
                    return Ok(());
                }
            }
        }
    })
}

fn print_poll(report: &PollReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
        return Ok(());
    }

    println!(
        "{} {} observed, {} new, {} refreshed",
        "Grades".cyan().bold(),
        report.observed,
        report.new,
        report.refreshed
    );
    if report.failed > 0 {
        println!(
            "  {} {}",
            format!("{} failed:", report.failed).red(),
            report.failed_players.join(", ")
        );
    }
    Ok(())
}
