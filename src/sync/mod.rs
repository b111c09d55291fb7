//! Incremental feed synchronization.
//!
//! - **Engine**: walks the feed from the last checkpoint, hourly for today,
//!   daily for older history, with an hourly fallback for unpublished archives
//! - **Fetch**: HTTP retrieval and gzip decoding of one bucket
//! - **Store**: checkpoint and record persistence contracts
//!
//! # Example
//!
//! ```ignore
//! use logsync::sync::{HttpBucketFetcher, SyncEngine};
//!
//! let fetcher = HttpBucketFetcher::new(&config.base_url, timeout)?;
//! let storage = SqliteStorage::open(&db_path)?;
//! let mut engine = SyncEngine::new(fetcher, storage, providers);
//! let report = engine.run_catch_up("b").await?;
//! ```

mod clock;
mod engine;
mod fetch;
mod store;
mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use engine::{walk_start, SyncEngine, DEFAULT_LOOKBACK_DAYS, REWIND_SECS, SAFETY_MARGIN_SECS};
pub use fetch::{decode_body, BucketFetcher, HttpBucketFetcher, DEFAULT_BASE_URL, DEFAULT_TIMEOUT_SECS};
pub use store::{CheckpointStore, RecordSink};
pub use types::{
    new_run_id, BucketSummary, FetchOutcome, PassReport, WalkFailure, WalkProgress, WriteStats,
};
