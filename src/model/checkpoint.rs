//! Sync checkpoint model.

use serde::{Deserialize, Serialize};

/// Durable marker of ingestion progress for one provider.
///
/// Everything up to `window_end` has been written; the pass that produced
/// this checkpoint started covering from `window_start`. Checkpoints are
/// append-only and the most recently inserted one per provider wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCheckpoint {
    /// Row ID in insertion order (0 for a seeded, not yet stored checkpoint).
    #[serde(default)]
    pub id: i64,

    /// Provider tag (e.g. "b").
    pub provider: String,

    /// Start of the covering pass (Unix seconds).
    pub window_start: i64,

    /// End of durably ingested data (Unix seconds).
    pub window_end: i64,

    /// When the checkpoint was stored (Unix milliseconds).
    #[serde(default)]
    pub created_at: i64,
}

impl SyncCheckpoint {
    /// A first-run checkpoint looking back `lookback_days` from `now`.
    ///
    /// Start and end coincide: nothing has been covered yet.
    #[must_use]
    pub fn seed(provider: &str, now: i64, lookback_days: i64) -> Self {
        let ts = now.saturating_sub(lookback_days.saturating_mul(86_400));
        Self {
            id: 0,
            provider: provider.to_string(),
            window_start: ts,
            window_end: ts,
            created_at: 0,
        }
    }

    /// Whether this checkpoint came from the store rather than a seed.
    #[must_use]
    pub const fn is_stored(&self) -> bool {
        self.id > 0
    }
}
