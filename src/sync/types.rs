//! Types shared by the sync engine and its collaborators.

use serde::Serialize;

use crate::error::Error;
use crate::model::{FetchMode, Granularity, TimeBucket};

/// What a fetcher found at a bucket's resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Decompressed text of the resource.
    Found(String),
    /// The resource does not exist (yet).
    NotFound,
}

/// Per-batch write counts reported by a record sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WriteStats {
    /// Records newly stored.
    pub accepted: usize,
    /// Records whose identity key was already stored.
    pub duplicates: usize,
}

impl WriteStats {
    pub fn add(&mut self, other: Self) {
        self.accepted += other.accepted;
        self.duplicates += other.duplicates;
    }
}

/// One bucket the walk completed.
#[derive(Debug, Clone, Serialize)]
pub struct BucketSummary {
    pub bucket: String,
    pub granularity: Granularity,
    pub mode: FetchMode,
    /// Daily archive was missing and the day was fetched hour by hour.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub fell_back: bool,
    pub records: usize,
    pub accepted: usize,
    pub duplicates: usize,
    /// Lines dropped by the parser.
    pub warnings: usize,
}

impl BucketSummary {
    pub(crate) fn new(bucket: &TimeBucket, mode: FetchMode, fell_back: bool) -> Self {
        Self {
            bucket: bucket.to_string(),
            granularity: bucket.granularity(),
            mode,
            fell_back,
            records: 0,
            accepted: 0,
            duplicates: 0,
            warnings: 0,
        }
    }
}

/// A walk that reached its end.
#[derive(Debug, Clone)]
pub struct WalkProgress {
    /// Where the walk began (resume point minus the rewind margin).
    pub window_start: i64,
    /// New checkpoint end.
    pub end: i64,
    pub buckets: Vec<BucketSummary>,
}

/// A walk that stopped at a failing bucket.
///
/// Everything before `failed_bucket` was written; `last_good_end` is the end
/// of the last bucket that was, if any.
#[derive(Debug)]
pub struct WalkFailure {
    pub window_start: i64,
    pub last_good_end: Option<i64>,
    pub failed_bucket: Option<String>,
    pub error: Error,
    pub buckets: Vec<BucketSummary>,
}

/// Outcome of one pass for one provider.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub run_id: String,
    pub provider: String,
    pub success: bool,
    pub cancelled: bool,
    /// Start of the range the pass covered.
    pub window_start: i64,
    /// Checkpoint end after the pass; unchanged from the resume point when
    /// nothing new was confirmed.
    pub checkpoint_end: i64,
    /// Whether a checkpoint row was appended.
    pub checkpoint_appended: bool,
    pub buckets: Vec<BucketSummary>,
    pub records_written: usize,
    pub duplicates: usize,
    pub warnings: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
}

impl PassReport {
    pub(crate) fn new(run_id: String, provider: &str, window_start: i64, resume_end: i64) -> Self {
        Self {
            run_id,
            provider: provider.to_string(),
            success: false,
            cancelled: false,
            window_start,
            checkpoint_end: resume_end,
            checkpoint_appended: false,
            buckets: Vec::new(),
            records_written: 0,
            duplicates: 0,
            warnings: 0,
            failed_bucket: None,
            error: None,
            error_code: None,
        }
    }

    pub(crate) fn absorb_buckets(&mut self, buckets: Vec<BucketSummary>) {
        for b in &buckets {
            self.records_written += b.accepted;
            self.duplicates += b.duplicates;
            self.warnings += b.warnings;
        }
        self.buckets = buckets;
    }
}

/// A fresh pass identifier.
#[must_use]
pub fn new_run_id() -> String {
    format!("run_{}", &uuid::Uuid::new_v4().simple().to_string()[..12])
}
