//! Backfill command implementation.

use crate::cli::BackfillArgs;
use crate::config::load_config;
use crate::error::{Error, Result};
use crate::model::bucket::at_feed_wall_clock;
use crate::storage::SqliteStorage;
use crate::sync::{HttpBucketFetcher, SyncEngine};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use super::sync::{cancel_on_interrupt, check_reports, prepare_db_path, print_reports, runtime};

/// Execute the backfill command.
///
/// # Errors
///
/// Returns `InvalidArgument` for an unparsable time, `InvalidWindow` unless
/// `--from` is before `--to`, and `PassFailed` if the walk stopped early.
pub fn execute(
    args: &BackfillArgs,
    db_path: Option<&PathBuf>,
    timeout: Option<u64>,
    json: bool,
) -> Result<()> {
    let start = parse_time(&args.from)?;
    let end = parse_time(&args.to)?;
    if start >= end {
        return Err(Error::InvalidWindow { start, end });
    }

    let settings = load_config()?.sync_settings(timeout)?;
    settings.providers.get(&args.provider)?;
    let db_path = prepare_db_path(db_path)?;

    let fetcher = HttpBucketFetcher::new(&settings.base_url, settings.timeout)?;
    let storage = SqliteStorage::open(&db_path)?;

    let rt = runtime()?;
    let report = rt.block_on(async {
        let cancel = Arc::new(AtomicBool::new(false));
        cancel_on_interrupt(Arc::clone(&cancel));

        let mut engine = SyncEngine::new(fetcher, storage, settings.providers.clone())
            .with_cancel_flag(cancel)
            .with_lookback_days(settings.lookback_days);
        engine.run_explicit(&args.provider, start, end).await
    })?;

    let reports = [report];
    print_reports(&reports, json)?;
    check_reports(&reports)
}

/// Parse a command-line time into epoch seconds.
///
/// Dates and minute-precision times without a zone are read on the feed's
/// UTC+9 wall clock.
pub(crate) fn parse_time(input: &str) -> Result<i64> {
    let s = input.trim();
    let invalid = || Error::InvalidArgument(format!("unrecognized time: {input}"));

    if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
        return s.parse::<i64>().map_err(|_| invalid());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp());
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M") {
        return Ok(at_feed_wall_clock(naive).timestamp());
    }

    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0).ok_or_else(invalid)?;
        return Ok(at_feed_wall_clock(midnight).timestamp());
    }

    Err(invalid())
}
