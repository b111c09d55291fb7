//! Normalized match records.

use serde::{Deserialize, Serialize};

/// Player name the feed uses for anonymous seats.
pub const PLACEHOLDER_NAME: &str = "NoName";

/// Skill tier of the table a match was played at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillTier {
    None,
    Upper,
    Special,
    Phoenix,
    Other,
}

impl SkillTier {
    /// Integer code stored as `playerlevel`.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::None => 0,
            Self::Upper => 1,
            Self::Special => 2,
            Self::Phoenix => 3,
            Self::Other => 4,
        }
    }

    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::None),
            1 => Some(Self::Upper),
            2 => Some(Self::Special),
            3 => Some(Self::Phoenix),
            4 => Some(Self::Other),
            _ => None,
        }
    }
}

/// Number of rounds a match is played over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundLength {
    EastOnly,
    EastSouth,
}

impl RoundLength {
    /// Integer code stored as `playlength`.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::EastOnly => 1,
            Self::EastSouth => 2,
        }
    }

    #[must_use]
    pub const fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(Self::EastOnly),
            2 => Some(Self::EastSouth),
            _ => None,
        }
    }
}

/// Rule attributes decoded from a play-type token.
///
/// Every attribute is independent. `None` / `false` means the token did
/// not carry the glyph, not that the rule is off.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayTypeFlags {
    #[serde(rename = "playernum", skip_serializing_if = "Option::is_none")]
    pub player_count: Option<u8>,

    #[serde(rename = "playerlevel", skip_serializing_if = "Option::is_none")]
    pub skill_tier: Option<SkillTier>,

    #[serde(rename = "playlength", skip_serializing_if = "Option::is_none")]
    pub round_length: Option<RoundLength>,

    #[serde(rename = "kuitanari", default, skip_serializing_if = "std::ops::Not::not")]
    pub open_tanyao: bool,

    #[serde(rename = "akaari", default, skip_serializing_if = "std::ops::Not::not")]
    pub red_fives: bool,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub rapid: bool,

    #[serde(rename = "shugi", default, skip_serializing_if = "std::ops::Not::not")]
    pub celebration_chips: bool,
}

impl PlayTypeFlags {
    /// True if no glyph was recognized.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// One finished match, normalized from a feed line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
    /// Deterministic key used for idempotent writes.
    pub identity_key: String,

    /// Provider tag the record came from.
    pub source_type: String,

    /// Match start (Unix seconds).
    pub start_time: i64,

    /// Match end (Unix seconds), when the feed reports a duration.
    pub end_time: Option<i64>,

    /// Duration in minutes.
    pub duration: Option<i64>,

    /// Numeric lobby id.
    pub lobby: Option<i64>,

    /// Lobby token as it appeared in the feed.
    pub raw_lobby: Option<String>,

    pub players: Vec<String>,

    /// Point strings, index-aligned with `players`.
    pub points: Vec<String>,

    /// Celebratory chip counts, index-aligned with `players`; `None` when
    /// no player had a chip suffix.
    pub chips: Option<Vec<Option<String>>>,

    #[serde(flatten)]
    pub flags: PlayTypeFlags,

    /// Hour pattern (YYYYMMDDHH) of the bucket the record was parsed from.
    pub bucket: String,
}

impl MatchRecord {
    /// The participant identifying this record among concurrent matches.
    ///
    /// First non-placeholder player, or the first point value when every
    /// seat is a placeholder.
    #[must_use]
    pub fn representative(&self) -> Option<&str> {
        self.players
            .iter()
            .find(|p| p.as_str() != PLACEHOLDER_NAME)
            .or_else(|| self.points.first())
            .map(String::as_str)
    }
}
