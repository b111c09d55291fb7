//! Data models for logsync.
//!
//! This module contains the domain models:
//! - TimeBucket (one fetchable unit of the feed)
//! - ProviderSpec (per-feed format and path configuration)
//! - MatchRecord / PlayTypeFlags (normalized session records)
//! - SyncCheckpoint (durable ingestion progress)

pub mod bucket;
pub mod checkpoint;
pub mod provider;
pub mod record;

pub use bucket::{feed_offset, feed_time, hour_floor, Granularity, TimeBucket, FEED_UTC_OFFSET_SECS};
pub use checkpoint::SyncCheckpoint;
pub use provider::{FetchMode, ProviderSpec, Providers, RecordFormat};
pub use record::{MatchRecord, PlayTypeFlags, RoundLength, SkillTier, PLACEHOLDER_NAME};
