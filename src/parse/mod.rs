//! Feed line parsing.
//!
//! Turns the text of one bucket into normalized [`MatchRecord`]s. Parsing is
//! pure: no I/O, no clock. Failures are contained per line; a malformed line
//! is dropped with a [`LineWarning`] and the rest of the bucket still parses.
//!
//! # Line layouts
//!
//! Lines are `|`-delimited with surrounding whitespace trimmed per field:
//!
//! ```text
//! table:  00:12 | 30 | 四上南喰赤 | Alice(+42.0) Bob(-8.0) Carol(-14.0) Dave(-20.0)
//! lobby:  L1000 | 00:12 | Alice(+42.0,+2枚) Bob(-42.0,-2枚)
//! ```
//!
//! The players field is always the last field; providers configured with
//! extra columns have those ignored.

mod key;
mod playtype;

pub use key::build_key;
pub use playtype::decode_play_type;

use std::collections::HashSet;

use chrono::NaiveDateTime;
use thiserror::Error;
use tracing::warn;

use crate::model::bucket::at_feed_wall_clock;
use crate::model::{MatchRecord, PlayTypeFlags, ProviderSpec, RecordFormat, TimeBucket};

const FIELD_DELIMITER: char = '|';

/// Why a single line was rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("invalid start time '{0}'")]
    StartTime(String),

    #[error("invalid duration '{0}'")]
    Duration(String),

    #[error("malformed player entry '{0}'")]
    PlayerEntry(String),

    #[error("no players")]
    NoPlayers,

    #[error("declares {declared} players, found {found}")]
    PlayerCount { declared: u8, found: usize },
}

/// A dropped line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineWarning {
    /// 1-based line number within the bucket text.
    pub line: usize,
    pub text: String,
    pub error: LineError,
}

/// Result of parsing one bucket (or several aggregated into one).
#[derive(Debug, Clone, Default)]
pub struct ParsedBucket {
    pub records: Vec<MatchRecord>,
    pub warnings: Vec<LineWarning>,
    /// Keys seen more than once. Both records are kept.
    pub duplicate_keys: Vec<String>,
}

impl ParsedBucket {
    /// Concatenate parts into one bucket and re-run duplicate detection
    /// over the combined records.
    #[must_use]
    pub fn merge(parts: impl IntoIterator<Item = ParsedBucket>) -> Self {
        let mut merged = Self::default();
        for part in parts {
            merged.records.extend(part.records);
            merged.warnings.extend(part.warnings);
        }
        merged.duplicate_keys = find_duplicate_keys(&merged.records);
        merged
    }
}

/// Parse the text of `bucket` as published by `provider`.
#[must_use]
pub fn parse(provider: &ProviderSpec, text: &str, bucket: &TimeBucket) -> ParsedBucket {
    let mut parsed = ParsedBucket::default();

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }

        match parse_line(provider, line, bucket) {
            Ok(record) => parsed.records.push(record),
            Err(error) => {
                warn!(
                    provider = %provider.tag,
                    bucket = %bucket,
                    line = idx + 1,
                    error = %error,
                    "Dropping malformed line"
                );
                parsed.warnings.push(LineWarning {
                    line: idx + 1,
                    text: line.to_string(),
                    error,
                });
            }
        }
    }

    parsed.duplicate_keys = find_duplicate_keys(&parsed.records);
    parsed
}

/// Parse one non-blank line.
///
/// # Errors
///
/// Returns the first [`LineError`] encountered.
pub fn parse_line(
    provider: &ProviderSpec,
    line: &str,
    bucket: &TimeBucket,
) -> Result<MatchRecord, LineError> {
    let fields: Vec<&str> = line.split(FIELD_DELIMITER).map(str::trim).collect();
    let expected = provider.field_count().max(provider.format.field_count());
    if fields.len() != expected {
        return Err(LineError::FieldCount {
            expected,
            found: fields.len(),
        });
    }
    let players_field = fields[fields.len() - 1];

    let mut record = MatchRecord {
        identity_key: String::new(),
        source_type: provider.tag.clone(),
        start_time: 0,
        end_time: None,
        duration: None,
        lobby: None,
        raw_lobby: None,
        players: Vec::new(),
        points: Vec::new(),
        chips: None,
        flags: PlayTypeFlags::default(),
        bucket: bucket.hour_pattern(),
    };

    match provider.format {
        RecordFormat::Table => {
            record.start_time = parse_start_time(fields[0], bucket)?;
            let bad_duration = || LineError::Duration(fields[1].to_string());
            let duration: i64 = fields[1].parse().map_err(|_| bad_duration())?;
            let end_time = duration
                .checked_mul(60)
                .filter(|_| duration >= 0)
                .and_then(|secs| record.start_time.checked_add(secs))
                .ok_or_else(bad_duration)?;
            record.duration = Some(duration);
            record.end_time = Some(end_time);
            record.flags = decode_play_type(fields[2]);
        }
        RecordFormat::Lobby => {
            if provider.has_lobby() && !fields[0].is_empty() {
                record.raw_lobby = Some(fields[0].to_string());
                record.lobby = lobby_number(fields[0]);
            }
            record.start_time = parse_start_time(fields[1], bucket)?;
        }
    }

    let seats = parse_seats(players_field)?;
    if let Some(declared) = record.flags.player_count {
        if usize::from(declared) != seats.len() {
            return Err(LineError::PlayerCount {
                declared,
                found: seats.len(),
            });
        }
    }

    let mut chips = Vec::with_capacity(seats.len());
    for seat in seats {
        record.players.push(seat.name);
        record.points.push(seat.point);
        chips.push(seat.chips);
    }
    if chips.iter().any(Option::is_some) {
        record.chips = Some(chips);
    }

    record.identity_key = build_key(&provider.tag, &record);
    Ok(record)
}

/// Keys that occur more than once in `records`, in first-repeat order.
#[must_use]
pub fn find_duplicate_keys(records: &[MatchRecord]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(records.len());
    let mut duplicates = Vec::new();
    for record in records {
        if !seen.insert(record.identity_key.as_str()) {
            warn!(key = %record.identity_key, "Duplicate identity key in bucket");
            duplicates.push(record.identity_key.clone());
        }
    }
    duplicates
}

/// `HH:MM`, `H:MM` or `HHMM` on the bucket's date, or a full `YYYYMMDDHHMM`.
fn parse_start_time(field: &str, bucket: &TimeBucket) -> Result<i64, LineError> {
    let invalid = || LineError::StartTime(field.to_string());

    let compact: String = field.chars().filter(|c| *c != ':').collect();
    if compact.is_empty() || !compact.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let stamp = match compact.len() {
        3 => format!("{}0{compact}", bucket.date_pattern()),
        4 => format!("{}{compact}", bucket.date_pattern()),
        12 => compact,
        _ => return Err(invalid()),
    };

    let naive = NaiveDateTime::parse_from_str(&stamp, "%Y%m%d%H%M").map_err(|_| invalid())?;
    Ok(at_feed_wall_clock(naive).timestamp())
}

fn lobby_number(token: &str) -> Option<i64> {
    let digits: String = token.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

struct Seat {
    name: String,
    point: String,
    chips: Option<String>,
}

/// Scan `name(point[,chips])` groups; whitespace between groups is optional.
fn parse_seats(field: &str) -> Result<Vec<Seat>, LineError> {
    let mut seats = Vec::new();
    let mut rest = field.trim_start();

    while !rest.is_empty() {
        let malformed = || LineError::PlayerEntry(rest.to_string());

        let open = rest.find('(').ok_or_else(malformed)?;
        let close = rest[open..].find(')').map(|i| open + i).ok_or_else(malformed)?;

        let name = rest[..open].trim();
        let inner = &rest[open + 1..close];
        let (point, chips) = match inner.split_once(',') {
            Some((point, chips)) => (point.trim(), strip_chip_marker(chips)),
            None => (inner.trim(), None),
        };
        if name.is_empty() || point.is_empty() {
            return Err(malformed());
        }

        seats.push(Seat {
            name: name.to_string(),
            point: point.to_string(),
            chips,
        });
        rest = rest[close + 1..].trim_start();
    }

    if seats.is_empty() {
        return Err(LineError::NoPlayers);
    }
    Ok(seats)
}

/// `+2枚` → `+2`.
fn strip_chip_marker(raw: &str) -> Option<String> {
    let value = raw.trim().trim_end_matches(|c: char| !c.is_ascii_digit());
    (!value.is_empty()).then(|| value.to_string())
}
