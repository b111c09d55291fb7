//! Grade-change watcher.
//!
//! Polls a public feed of recent rank changes and asks a local rank service
//! to refresh each player with a change it has not processed yet. Processed
//! change keys live in a bounded [`SeenKeys`] set owned by the watcher.

mod client;
mod seen;
mod watcher;

pub use client::{
    GradeChange, GradeFeed, HttpGradeFeed, HttpRankRefresher, RankRefresher, StartTime,
    DEFAULT_FEED_URL, DEFAULT_RANK_TIMEOUT_SECS, DEFAULT_RANK_URL,
};
pub use seen::{SeenKeys, DEFAULT_MARGIN};
pub use watcher::{GradeWatcher, PollReport};
