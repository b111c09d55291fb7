//! The sync engine.
//!
//! A pass resumes from the provider's latest checkpoint, walks the feed
//! bucket by bucket in chronological order and appends a new checkpoint once
//! the walk ends. Past days are fetched as one daily archive each; when an
//! archive is not yet published the day is fetched hour by hour from the live
//! files instead. The current day is always walked hourly.
//!
//! A failing bucket stops the walk. Every bucket before it was written, so
//! the pass still checkpoints up to the end of the last good bucket and the
//! next pass resumes there.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{
    feed_time, hour_floor, FetchMode, ProviderSpec, Providers, SyncCheckpoint, TimeBucket,
};
use crate::parse::{parse, ParsedBucket};

use super::clock::{Clock, SystemClock};
use super::fetch::BucketFetcher;
use super::store::{CheckpointStore, RecordSink};
use super::types::{
    new_run_id, BucketSummary, FetchOutcome, PassReport, WalkFailure, WalkProgress,
};

/// The live file of the current hour may still be growing.
pub const SAFETY_MARGIN_SECS: i64 = 3600;

/// A resumed walk re-reads the hour before the checkpoint.
pub const REWIND_SECS: i64 = 3600;

/// First-run lookback when a provider has no checkpoint.
pub const DEFAULT_LOOKBACK_DAYS: i64 = 3;

const SECS_PER_HOUR: i64 = 3600;

/// Where a walk resuming at `resume_end` begins.
#[must_use]
pub const fn walk_start(resume_end: i64) -> i64 {
    let rewound = resume_end - REWIND_SECS;
    hour_floor(if rewound > 0 { rewound } else { 0 })
}

/// Orchestrates fetch, parse, write and checkpoint for one store.
pub struct SyncEngine<F, S> {
    fetcher: F,
    store: S,
    providers: Providers,
    clock: Arc<dyn Clock>,
    cancel: Arc<AtomicBool>,
    lookback_days: i64,
}

/// Bookkeeping of a walk in progress.
struct Walk {
    buckets: Vec<BucketSummary>,
    last_good: Option<i64>,
    current: Option<TimeBucket>,
}

impl Walk {
    fn complete(&mut self, summary: BucketSummary, end: i64) {
        self.buckets.push(summary);
        self.last_good = Some(end);
        self.current = None;
    }
}

impl<F, S> SyncEngine<F, S>
where
    F: BucketFetcher,
    S: CheckpointStore + RecordSink,
{
    pub fn new(fetcher: F, store: S, providers: Providers) -> Self {
        Self {
            fetcher,
            store,
            providers,
            clock: Arc::new(SystemClock),
            cancel: Arc::new(AtomicBool::new(false)),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Share a cancellation flag. Once set, the walk stops before its next
    /// bucket.
    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    #[must_use]
    pub fn with_lookback_days(mut self, days: i64) -> Self {
        self.lookback_days = days;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Catch up a provider from its latest checkpoint to now.
    ///
    /// A provider without a checkpoint starts `lookback_days` before now.
    /// A successful pass appends one checkpoint even when it found nothing
    /// new, ending no earlier than the one it resumed from. A failed pass
    /// appends only if it completed a bucket past the resume point.
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown provider or when the store cannot be
    /// read or the checkpoint cannot be appended. Fetch and write failures
    /// inside the walk are reported in the returned [`PassReport`].
    pub async fn run_catch_up(&mut self, tag: &str) -> Result<PassReport> {
        self.providers.get(tag)?;

        let checkpoint = if let Some(cp) = self.store.load_latest(tag)? {
            cp
        } else {
            let seed = SyncCheckpoint::seed(tag, self.clock.now(), self.lookback_days);
            info!(
                provider = tag,
                lookback_days = self.lookback_days,
                "No checkpoint, seeding first window"
            );
            seed
        };

        let resume_end = checkpoint.window_end;
        info!(provider = tag, resume_end, "Starting catch-up pass");
        let outcome = self.sync(tag, resume_end, None).await;
        self.finish(tag, resume_end, outcome, |success, reached| {
            if success {
                Some(reached.max(resume_end))
            } else {
                (reached > resume_end).then_some(reached)
            }
        })
    }

    /// Sync an explicit `[start, end)` window.
    ///
    /// A checkpoint is appended only when the window connects to the stored
    /// history and reaches past its end, so a backfill never rewinds
    /// catch-up and never skips a gap.
    ///
    /// # Errors
    ///
    /// Returns `InvalidWindow` unless `start < end`, plus the errors of
    /// [`Self::run_catch_up`].
    pub async fn run_explicit(&mut self, tag: &str, start: i64, end: i64) -> Result<PassReport> {
        if start >= end {
            return Err(Error::InvalidWindow { start, end });
        }
        self.providers.get(tag)?;

        let latest = self.store.load_latest(tag)?.map(|cp| cp.window_end);
        let window_start = walk_start(start);
        info!(provider = tag, start, end, "Starting explicit pass");

        let outcome = self.sync(tag, start, Some(end)).await;
        let baseline = latest.unwrap_or(start);
        self.finish(tag, baseline, outcome, |_, reached| {
            let advances = match latest {
                Some(latest_end) => window_start <= latest_end && reached > latest_end,
                None => reached > start,
            };
            advances.then_some(reached)
        })
    }

    /// Walk from `resume_end` (minus the rewind) up to `hard_end`, or now.
    ///
    /// On success returns the new checkpoint end. On failure returns where
    /// the walk stopped and the end of the last bucket it completed.
    pub async fn sync(
        &mut self,
        tag: &str,
        resume_end: i64,
        hard_end: Option<i64>,
    ) -> std::result::Result<WalkProgress, WalkFailure> {
        let window_start = walk_start(resume_end);
        let mut walk = Walk {
            buckets: Vec::new(),
            last_good: None,
            current: None,
        };

        let result = match self.providers.get(tag).cloned() {
            Ok(provider) => self.walk(&provider, window_start, hard_end, &mut walk).await,
            Err(e) => Err(e),
        };

        match result {
            Ok(end) => Ok(WalkProgress {
                window_start,
                end,
                buckets: walk.buckets,
            }),
            Err(error) => Err(WalkFailure {
                window_start,
                last_good_end: walk.last_good,
                failed_bucket: walk.current.map(|b| b.to_string()),
                error,
                buckets: walk.buckets,
            }),
        }
    }

    async fn walk(
        &mut self,
        provider: &ProviderSpec,
        window_start: i64,
        hard_end: Option<i64>,
        walk: &mut Walk,
    ) -> Result<i64> {
        let now = self.clock.now() - SAFETY_MARGIN_SECS;
        let now_hour = hour_floor(now);
        let today = feed_time(now)?.date_naive();
        let target = hard_end.unwrap_or(now);
        let mut cursor = window_start;

        while cursor < target {
            self.check_cancelled()?;
            let date = feed_time(cursor)?.date_naive();

            if date > today {
                break;
            }

            if date == today {
                let last_hour = if target >= now {
                    now_hour
                } else {
                    hour_floor(target - 1)
                };

                while cursor <= last_hour {
                    self.check_cancelled()?;
                    let bucket = TimeBucket::hourly(feed_time(cursor)?);
                    walk.current = Some(bucket);

                    match self.fetcher.fetch(provider, &bucket, FetchMode::Live).await? {
                        FetchOutcome::Found(text) => {
                            let parsed = parse(provider, &text, &bucket);
                            let summary =
                                self.store_bucket(&bucket, FetchMode::Live, false, &parsed)?;
                            walk.complete(summary, bucket.end_ts());
                        }
                        FetchOutcome::NotFound if cursor >= now_hour => {
                            info!(
                                provider = %provider.tag,
                                bucket = %bucket,
                                "Live bucket not published yet, stopping"
                            );
                            walk.current = None;
                            return Ok(cursor);
                        }
                        FetchOutcome::NotFound => {
                            return Err(Error::BucketMissing {
                                bucket: bucket.to_string(),
                            });
                        }
                    }
                    cursor += SECS_PER_HOUR;
                }
                return Ok(target.min(now));
            }

            let day = TimeBucket::daily(date);
            walk.current = Some(day);

            let summary = match self.fetcher.fetch(provider, &day, FetchMode::Archive).await? {
                FetchOutcome::Found(text) => {
                    let parsed = parse(provider, &text, &day);
                    self.store_bucket(&day, FetchMode::Archive, false, &parsed)?
                }
                FetchOutcome::NotFound => {
                    info!(
                        provider = %provider.tag,
                        bucket = %day,
                        "Daily archive not published, fetching live hours"
                    );
                    let mut parts = Vec::with_capacity(24);
                    for hour in day.hours() {
                        walk.current = Some(hour);
                        match self.fetcher.fetch(provider, &hour, FetchMode::Live).await? {
                            FetchOutcome::Found(text) => parts.push(parse(provider, &text, &hour)),
                            FetchOutcome::NotFound => {
                                return Err(Error::BucketMissing {
                                    bucket: hour.to_string(),
                                });
                            }
                        }
                    }
                    walk.current = Some(day);
                    let merged = ParsedBucket::merge(parts);
                    self.store_bucket(&day, FetchMode::Live, true, &merged)?
                }
            };

            walk.complete(summary, day.end_ts());
            cursor = day.end_ts();
        }

        Ok(target.min(now))
    }

    fn store_bucket(
        &mut self,
        bucket: &TimeBucket,
        mode: FetchMode,
        fell_back: bool,
        parsed: &ParsedBucket,
    ) -> Result<BucketSummary> {
        let stats = self.store.write_batch(bucket, &parsed.records)?;

        let mut summary = BucketSummary::new(bucket, mode, fell_back);
        summary.records = parsed.records.len();
        summary.accepted = stats.accepted;
        summary.duplicates = stats.duplicates;
        summary.warnings = parsed.warnings.len();

        debug!(
            bucket = %bucket,
            %mode,
            records = summary.records,
            accepted = summary.accepted,
            duplicates = summary.duplicates,
            warnings = summary.warnings,
            "Bucket written"
        );
        Ok(summary)
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.load(Ordering::SeqCst) {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Turn a walk outcome into a report, appending the checkpoint end that
    /// `checkpoint_end` picks from the pass success and the end reached.
    fn finish(
        &mut self,
        tag: &str,
        baseline: i64,
        outcome: std::result::Result<WalkProgress, WalkFailure>,
        checkpoint_end: impl FnOnce(bool, i64) -> Option<i64>,
    ) -> Result<PassReport> {
        let (mut report, reached) = match outcome {
            Ok(progress) => {
                let mut report =
                    PassReport::new(new_run_id(), tag, progress.window_start, baseline);
                report.success = true;
                report.absorb_buckets(progress.buckets);
                (report, Some(progress.end))
            }
            Err(failure) => {
                let mut report = PassReport::new(new_run_id(), tag, failure.window_start, baseline);
                report.cancelled = matches!(failure.error, Error::Cancelled);
                report.failed_bucket = failure.failed_bucket;
                report.error_code = Some(failure.error.error_code().as_str());
                report.error = Some(failure.error.to_string());
                report.absorb_buckets(failure.buckets);
                (report, failure.last_good_end)
            }
        };

        let success = report.success;
        if let Some(end) = reached.and_then(|end| checkpoint_end(success, end)) {
            self.store.append(tag, report.window_start, end)?;
            report.checkpoint_end = end;
            report.checkpoint_appended = true;
        }

        if report.success {
            info!(
                provider = tag,
                run_id = %report.run_id,
                buckets = report.buckets.len(),
                records = report.records_written,
                checkpoint_end = report.checkpoint_end,
                "Pass complete"
            );
        } else {
            warn!(
                provider = tag,
                run_id = %report.run_id,
                failed_bucket = report.failed_bucket.as_deref().unwrap_or("-"),
                error = report.error.as_deref().unwrap_or("-"),
                checkpoint_end = report.checkpoint_end,
                "Pass stopped early"
            );
        }

        self.store.record_pass(&report)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::bucket::at_feed_wall_clock;
    use crate::model::{Granularity, MatchRecord};
    use crate::sync::clock::FixedClock;
    use crate::sync::types::WriteStats;
    use chrono::NaiveDate;
    use std::collections::HashSet;
    use std::sync::Mutex;

    fn jst(y: i32, m: u32, d: u32, h: u32, mi: u32) -> i64 {
        let naive = NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap();
        at_feed_wall_clock(naive).timestamp()
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn hour(d: u32, h: u32) -> TimeBucket {
        TimeBucket::hourly_on(date(d), h).unwrap()
    }

    /// 2024-01-11 12:30 UTC+9; the walk's "now" is 11:30.
    fn clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock(jst(2024, 1, 11, 12, 30)))
    }

    #[derive(Default)]
    struct FakeFetcher {
        calls: Mutex<Vec<(TimeBucket, FetchMode)>>,
        unpublished_archives: HashSet<NaiveDate>,
        missing_live: HashSet<TimeBucket>,
        broken: HashSet<TimeBucket>,
        live_frontier: Option<i64>,
        cancel_after: Option<(usize, Arc<AtomicBool>)>,
    }

    impl FakeFetcher {
        fn calls(&self) -> Vec<(TimeBucket, FetchMode)> {
            self.calls.lock().unwrap().clone()
        }

        fn count(&self, mode: FetchMode) -> usize {
            self.calls().iter().filter(|(_, m)| *m == mode).count()
        }
    }

    /// One four-player record per bucket, unique per bucket.
    fn bucket_text(bucket: &TimeBucket) -> String {
        format!(
            "{:02}:05|20|四南|P{}(+10) B(+5) C(-5) D(-10)\n",
            bucket.hour(),
            bucket.hour_pattern()
        )
    }

    impl BucketFetcher for FakeFetcher {
        async fn fetch(
            &self,
            _provider: &ProviderSpec,
            bucket: &TimeBucket,
            mode: FetchMode,
        ) -> Result<FetchOutcome> {
            let n = {
                let mut calls = self.calls.lock().unwrap();
                calls.push((*bucket, mode));
                calls.len()
            };
            if let Some((after, flag)) = &self.cancel_after {
                if n >= *after {
                    flag.store(true, Ordering::SeqCst);
                }
            }

            if self.broken.contains(bucket) {
                return Err(Error::Transport {
                    url: bucket.to_string(),
                    message: "HTTP 503".into(),
                });
            }
            let missing = match mode {
                FetchMode::Archive => self.unpublished_archives.contains(&bucket.date()),
                FetchMode::Live => {
                    self.missing_live.contains(bucket)
                        || self.live_frontier.is_some_and(|f| bucket.start_ts() >= f)
                }
            };
            if missing {
                return Ok(FetchOutcome::NotFound);
            }
            Ok(FetchOutcome::Found(bucket_text(bucket)))
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        checkpoints: Vec<SyncCheckpoint>,
        keys: HashSet<String>,
        batches: Vec<String>,
        passes: Vec<PassReport>,
    }

    impl MemoryStore {
        fn with_checkpoint(provider: &str, end: i64) -> Self {
            let mut store = Self::default();
            store.append(provider, end, end).unwrap();
            store
        }
    }

    impl CheckpointStore for MemoryStore {
        fn load_latest(&self, provider: &str) -> Result<Option<SyncCheckpoint>> {
            Ok(self
                .checkpoints
                .iter()
                .rev()
                .find(|cp| cp.provider == provider)
                .cloned())
        }

        fn append(&mut self, provider: &str, window_start: i64, window_end: i64) -> Result<()> {
            self.checkpoints.push(SyncCheckpoint {
                id: self.checkpoints.len() as i64 + 1,
                provider: provider.to_string(),
                window_start,
                window_end,
                created_at: 0,
            });
            Ok(())
        }

        fn record_pass(&mut self, report: &PassReport) -> Result<()> {
            self.passes.push(report.clone());
            Ok(())
        }
    }

    impl RecordSink for MemoryStore {
        fn write_batch(
            &mut self,
            bucket: &TimeBucket,
            records: &[MatchRecord],
        ) -> Result<WriteStats> {
            self.batches.push(bucket.to_string());
            let mut stats = WriteStats::default();
            for record in records {
                if self.keys.insert(record.identity_key.clone()) {
                    stats.accepted += 1;
                } else {
                    stats.duplicates += 1;
                }
            }
            Ok(stats)
        }
    }

    fn engine(fetcher: FakeFetcher, store: MemoryStore) -> SyncEngine<FakeFetcher, MemoryStore> {
        SyncEngine::new(fetcher, store, Providers::builtin()).with_clock(clock())
    }

    #[tokio::test]
    async fn test_each_past_day_is_one_archive_fetch() {
        let mut engine = engine(FakeFetcher::default(), MemoryStore::default());

        let progress = engine.sync("b", jst(2024, 1, 2, 1, 0), None).await.unwrap();

        // Jan 2..=Jan 10 as archives, then 00..=11 of today as live hours.
        assert_eq!(engine.fetcher.count(FetchMode::Archive), 9);
        assert_eq!(engine.fetcher.count(FetchMode::Live), 12);
        assert_eq!(progress.window_start, jst(2024, 1, 2, 0, 0));
        assert_eq!(progress.end, jst(2024, 1, 11, 11, 30));

        let archive_dates: Vec<NaiveDate> = engine
            .fetcher
            .calls()
            .iter()
            .filter(|(_, m)| *m == FetchMode::Archive)
            .map(|(b, _)| b.date())
            .collect();
        assert_eq!(archive_dates, (2..=10).map(date).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_unpublished_archive_falls_back_to_24_live_hours() {
        let fetcher = FakeFetcher {
            unpublished_archives: HashSet::from([date(10)]),
            ..FakeFetcher::default()
        };
        let mut engine = engine(fetcher, MemoryStore::default());

        let progress = engine.sync("b", jst(2024, 1, 10, 5, 0), None).await.unwrap();

        let calls = engine.fetcher.calls();
        let archives: Vec<_> = calls.iter().filter(|(_, m)| *m == FetchMode::Archive).collect();
        assert_eq!(archives.len(), 1);
        assert_eq!(archives[0].0.date(), date(10));

        let fallback_hours: Vec<u32> = calls
            .iter()
            .filter(|(b, m)| *m == FetchMode::Live && b.date() == date(10))
            .map(|(b, _)| b.hour())
            .collect();
        assert_eq!(fallback_hours, (0..24).collect::<Vec<_>>());

        // The day is written as one aggregated bucket.
        let day = &progress.buckets[0];
        assert_eq!(day.bucket, "2024-01-10");
        assert_eq!(day.granularity, Granularity::Daily);
        assert!(day.fell_back);
        assert_eq!(day.records, 24);
        assert_eq!(engine.store().batches[0], "2024-01-10");
        assert_eq!(engine.store().batches.len(), 1 + 12);
    }

    #[tokio::test]
    async fn test_walk_covers_window_without_gaps() {
        let mut engine = engine(FakeFetcher::default(), MemoryStore::default());
        let resume = jst(2024, 1, 5, 7, 20);
        let hard_end = jst(2024, 1, 11, 3, 0);

        let progress = engine.sync("b", resume, Some(hard_end)).await.unwrap();
        assert_eq!(progress.end, hard_end);

        let mut spans: Vec<(i64, i64)> = engine
            .fetcher
            .calls()
            .iter()
            .map(|(b, _)| (b.start_ts(), b.end_ts()))
            .collect();
        spans.sort_unstable();

        assert!(spans[0].0 <= resume - REWIND_SECS);
        for pair in spans.windows(2) {
            assert_eq!(pair[0].1, pair[1].0, "gap or overlap between buckets");
        }
        assert!(spans.last().unwrap().1 >= hard_end);

        // Today stops at the hour containing hard_end - 1.
        let today_hours: Vec<u32> = engine
            .fetcher
            .calls()
            .iter()
            .filter(|(b, _)| b.date() == date(11))
            .map(|(b, _)| b.hour())
            .collect();
        assert_eq!(today_hours, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_partial_failure_checkpoints_last_good_bucket() {
        let fetcher = FakeFetcher {
            broken: HashSet::from([hour(11, 5)]),
            ..FakeFetcher::default()
        };
        let resume = jst(2024, 1, 9, 12, 0);
        let mut engine = engine(fetcher, MemoryStore::with_checkpoint("b", resume));

        let report = engine.run_catch_up("b").await.unwrap();

        assert!(!report.success);
        assert!(!report.cancelled);
        assert_eq!(report.failed_bucket.as_deref(), Some("2024-01-11T05"));
        assert_eq!(report.error_code, Some("TRANSPORT_FAILURE"));
        assert!(report.checkpoint_appended);
        assert_eq!(report.checkpoint_end, jst(2024, 1, 11, 5, 0));
        // Jan 9, Jan 10, then hours 00..=04.
        assert_eq!(report.records_written, 7);

        let latest = engine.store().load_latest("b").unwrap().unwrap();
        assert_eq!(latest.window_start, jst(2024, 1, 9, 11, 0));
        assert_eq!(latest.window_end, jst(2024, 1, 11, 5, 0));
        assert_eq!(engine.store().passes.len(), 1);
    }

    #[tokio::test]
    async fn test_failure_before_any_bucket_keeps_checkpoint() {
        let fetcher = FakeFetcher {
            broken: HashSet::from([TimeBucket::daily(date(9))]),
            ..FakeFetcher::default()
        };
        let resume = jst(2024, 1, 9, 12, 0);
        let mut engine = engine(fetcher, MemoryStore::with_checkpoint("b", resume));

        let report = engine.run_catch_up("b").await.unwrap();

        assert!(!report.success);
        assert!(!report.checkpoint_appended);
        assert_eq!(report.checkpoint_end, resume);
        assert_eq!(report.failed_bucket.as_deref(), Some("2024-01-09"));
        assert_eq!(engine.store().checkpoints.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_past_live_hour_fails_fallback_day() {
        let fetcher = FakeFetcher {
            unpublished_archives: HashSet::from([date(10)]),
            missing_live: HashSet::from([hour(10, 7)]),
            ..FakeFetcher::default()
        };
        let mut engine = engine(fetcher, MemoryStore::default());

        let failure = engine
            .sync("b", jst(2024, 1, 9, 12, 0), None)
            .await
            .unwrap_err();

        assert!(matches!(failure.error, Error::BucketMissing { .. }));
        assert_eq!(failure.failed_bucket.as_deref(), Some("2024-01-10T07"));
        assert_eq!(failure.last_good_end, Some(jst(2024, 1, 10, 0, 0)));
        // Nothing of the half-fetched day was written.
        assert_eq!(engine.store().batches, vec!["2024-01-09".to_string()]);
        // The walk stopped at the missing hour.
        assert_eq!(engine.fetcher.calls().last().unwrap().0, hour(10, 7));
    }

    #[tokio::test]
    async fn test_unpublished_current_hour_ends_walk() {
        let fetcher = FakeFetcher {
            live_frontier: Some(jst(2024, 1, 11, 11, 0)),
            ..FakeFetcher::default()
        };
        let mut engine = engine(fetcher, MemoryStore::default());

        let progress = engine.sync("b", jst(2024, 1, 11, 6, 0), None).await.unwrap();

        assert_eq!(progress.end, jst(2024, 1, 11, 11, 0));
        assert_eq!(progress.buckets.len(), 6); // 05..=10
    }

    #[tokio::test]
    async fn test_pass_stopping_behind_resume_point_keeps_its_end() {
        let fetcher = FakeFetcher {
            live_frontier: Some(jst(2024, 1, 11, 11, 0)),
            ..FakeFetcher::default()
        };
        let resume = jst(2024, 1, 11, 11, 30);
        let mut engine = engine(fetcher, MemoryStore::with_checkpoint("b", resume));

        let report = engine.run_catch_up("b").await.unwrap();

        assert!(report.success);
        assert!(report.checkpoint_appended);
        assert_eq!(report.checkpoint_end, resume);
        assert_eq!(engine.store().checkpoints.len(), 2);
        assert_eq!(engine.store().load_latest("b").unwrap().unwrap().window_end, resume);
    }

    #[tokio::test]
    async fn test_missing_past_hour_of_today_is_failure() {
        let fetcher = FakeFetcher {
            live_frontier: Some(jst(2024, 1, 11, 9, 0)),
            ..FakeFetcher::default()
        };
        let mut engine = engine(fetcher, MemoryStore::default());

        let failure = engine
            .sync("b", jst(2024, 1, 11, 6, 0), None)
            .await
            .unwrap_err();

        assert!(matches!(failure.error, Error::BucketMissing { .. }));
        assert_eq!(failure.failed_bucket.as_deref(), Some("2024-01-11T09"));
        assert_eq!(failure.last_good_end, Some(jst(2024, 1, 11, 9, 0)));
    }

    #[tokio::test]
    async fn test_cancel_stops_between_buckets_and_keeps_progress() {
        let cancel = Arc::new(AtomicBool::new(false));
        let fetcher = FakeFetcher {
            cancel_after: Some((3, Arc::clone(&cancel))),
            ..FakeFetcher::default()
        };
        let resume = jst(2024, 1, 5, 12, 0);
        let mut engine = engine(fetcher, MemoryStore::with_checkpoint("b", resume))
            .with_cancel_flag(cancel);

        let report = engine.run_catch_up("b").await.unwrap();

        assert!(report.cancelled);
        assert!(!report.success);
        assert_eq!(report.error_code, Some("SYNC_CANCELLED"));
        assert_eq!(report.failed_bucket, None);
        // The third bucket (Jan 7) finished before the flag was checked.
        assert_eq!(engine.fetcher.calls().len(), 3);
        assert_eq!(report.checkpoint_end, jst(2024, 1, 8, 0, 0));
    }

    #[tokio::test]
    async fn test_first_pass_seeds_lookback_window() {
        let mut engine = engine(FakeFetcher::default(), MemoryStore::default());

        let report = engine.run_catch_up("b").await.unwrap();

        assert!(report.success);
        assert_eq!(report.window_start, jst(2024, 1, 8, 11, 0));
        assert_eq!(engine.fetcher.count(FetchMode::Archive), 3);
        assert_eq!(engine.fetcher.count(FetchMode::Live), 12);

        let latest = engine.store().load_latest("b").unwrap().unwrap();
        assert_eq!(latest.window_end, jst(2024, 1, 11, 11, 30));
    }

    #[tokio::test]
    async fn test_second_pass_resumes_with_rewind() {
        let mut engine = engine(FakeFetcher::default(), MemoryStore::default());
        engine.run_catch_up("b").await.unwrap();
        let before = engine.fetcher.calls().len();

        let report = engine.run_catch_up("b").await.unwrap();

        // Resume at 11:30 rewinds to 10:00: hours 10 and 11 again.
        let again: Vec<TimeBucket> = engine.fetcher.calls()[before..]
            .iter()
            .map(|(b, _)| *b)
            .collect();
        assert_eq!(again, vec![hour(11, 10), hour(11, 11)]);
        assert_eq!(report.records_written, 0);
        assert_eq!(report.duplicates, 2);

        // Nothing new, but a successful pass still appends exactly once and
        // never behind the previous end.
        let checkpoints = &engine.store().checkpoints;
        assert!(report.checkpoint_appended);
        assert_eq!(checkpoints.len(), 2);
        assert_eq!(checkpoints[1].window_end, checkpoints[0].window_end);
        assert_eq!(report.checkpoint_end, checkpoints[0].window_end);
    }

    #[tokio::test]
    async fn test_reingesting_a_window_adds_nothing() {
        let mut engine = engine(FakeFetcher::default(), MemoryStore::default());
        let (start, end) = (jst(2024, 1, 3, 0, 0), jst(2024, 1, 6, 0, 0));

        let first = engine.run_explicit("b", start, end).await.unwrap();
        let second = engine.run_explicit("b", start, end).await.unwrap();

        assert!(first.records_written > 0);
        assert_eq!(second.records_written, 0);
        assert_eq!(second.duplicates, first.records_written);
    }

    #[tokio::test]
    async fn test_explicit_window_must_be_ordered() {
        let mut engine = engine(FakeFetcher::default(), MemoryStore::default());
        let t = jst(2024, 1, 5, 0, 0);

        let err = engine.run_explicit("b", t, t).await.unwrap_err();
        assert!(matches!(err, Error::InvalidWindow { .. }));
        assert!(engine.fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_explicit_backfill_never_rewinds_or_skips() {
        let latest = jst(2024, 1, 6, 0, 0);

        // Entirely behind the checkpoint: no append.
        let mut engine = engine(FakeFetcher::default(), MemoryStore::with_checkpoint("b", latest));
        let report = engine
            .run_explicit("b", jst(2024, 1, 2, 0, 0), jst(2024, 1, 4, 0, 0))
            .await
            .unwrap();
        assert!(report.success);
        assert!(!report.checkpoint_appended);
        assert_eq!(report.checkpoint_end, latest);

        // Starts after the checkpoint: appending would hide the gap.
        let report = engine
            .run_explicit("b", jst(2024, 1, 8, 0, 0), jst(2024, 1, 9, 0, 0))
            .await
            .unwrap();
        assert!(!report.checkpoint_appended);

        // Overlaps and extends: appended.
        let report = engine
            .run_explicit("b", jst(2024, 1, 5, 0, 0), jst(2024, 1, 9, 0, 0))
            .await
            .unwrap();
        assert!(report.checkpoint_appended);
        assert_eq!(
            engine.store().load_latest("b").unwrap().unwrap().window_end,
            jst(2024, 1, 9, 0, 0)
        );
    }

    #[tokio::test]
    async fn test_unknown_provider_is_an_error() {
        let mut engine = engine(FakeFetcher::default(), MemoryStore::default());
        let err = engine.run_catch_up("zz").await.unwrap_err();
        assert!(matches!(err, Error::UnknownProvider { .. }));
    }

    #[test]
    fn test_walk_start_rewinds_and_floors() {
        assert_eq!(walk_start(jst(2024, 1, 1, 5, 30)), jst(2024, 1, 1, 4, 0));
        assert_eq!(walk_start(1_000), 0);
    }
}
