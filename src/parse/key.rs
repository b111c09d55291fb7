//! Identity keys for idempotent ingestion.
//!
//! A key combines the provider tag, the start time, a per-format
//! discriminator (duration for table feeds, lobby token for lobby feeds) and
//! one participant. Re-parsing the same bucket text always yields the same
//! keys, so a repeated write is absorbed by the store's uniqueness
//! constraint.

use crate::model::MatchRecord;

/// Build the identity key of `record` for provider `source_type`.
///
/// Lobby-format records (those carrying a raw lobby token) use
/// `source.start.lobby.who`; table-format records use
/// `source.start.duration.who`. `who` is [`MatchRecord::representative`].
#[must_use]
pub fn build_key(source_type: &str, record: &MatchRecord) -> String {
    let who = record.representative().unwrap_or_default();
    let discriminator = match &record.raw_lobby {
        Some(lobby) => lobby.clone(),
        None => record.duration.map(|d| d.to_string()).unwrap_or_default(),
    };
    format!("{source_type}.{}.{discriminator}.{who}", record.start_time)
}
