//! Provider configuration.
//!
//! Each provider is one feed of session logs. Differences between feeds
//! (line layout, resource paths) are carried as data in [`ProviderSpec`]
//! instead of per-provider code.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::bucket::TimeBucket;

/// Line layout of a provider's log files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordFormat {
    /// `start | duration | playtype | players`
    Table,
    /// `lobby | start | players`
    Lobby,
}

impl RecordFormat {
    /// Number of `|`-delimited fields in one line.
    #[must_use]
    pub const fn field_count(self) -> usize {
        match self {
            Self::Table => 4,
            Self::Lobby => 3,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Lobby => "lobby",
        }
    }
}

/// Which resource family a fetch addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// Hourly files for recent data.
    Live,
    /// Daily, year-partitioned files published after the day closes.
    Archive,
}

impl std::fmt::Display for FetchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Live => write!(f, "live"),
            Self::Archive => write!(f, "archive"),
        }
    }
}

/// Format and path configuration of one provider.
///
/// Path templates are relative to the configured base URL and support
/// `{year}`, `{month}`, `{day}`, `{date}` (YYYYMMDD) and `{hour}`
/// (YYYYMMDDHH) placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSpec {
    /// Source tag stored on every record and used as the identity key prefix.
    pub tag: String,

    pub format: RecordFormat,

    /// Template for hourly (live) resources.
    pub live_path: String,

    /// Template for daily (archive) resources.
    pub archive_path: String,

    /// Field count override; defaults to the format's layout.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_count: Option<usize>,

    /// Lobby flag override; defaults to `format == Lobby`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_lobby: Option<bool>,
}

impl ProviderSpec {
    /// A table-format provider.
    #[must_use]
    pub fn table(tag: &str, live_path: &str, archive_path: &str) -> Self {
        Self {
            tag: tag.to_string(),
            format: RecordFormat::Table,
            live_path: live_path.to_string(),
            archive_path: archive_path.to_string(),
            field_count: None,
            has_lobby: None,
        }
    }

    /// A lobby-format provider.
    #[must_use]
    pub fn lobby(tag: &str, live_path: &str, archive_path: &str) -> Self {
        Self {
            format: RecordFormat::Lobby,
            ..Self::table(tag, live_path, archive_path)
        }
    }

    #[must_use]
    pub fn field_count(&self) -> usize {
        self.field_count.unwrap_or(self.format.field_count())
    }

    #[must_use]
    pub fn has_lobby(&self) -> bool {
        self.has_lobby.unwrap_or(self.format == RecordFormat::Lobby)
    }

    /// Resource path of `bucket` in the given mode.
    #[must_use]
    pub fn path_for(&self, bucket: &TimeBucket, mode: FetchMode) -> String {
        let template = match mode {
            FetchMode::Live => &self.live_path,
            FetchMode::Archive => &self.archive_path,
        };
        render_path(template, bucket)
    }
}

fn render_path(template: &str, bucket: &TimeBucket) -> String {
    template
        .replace("{year}", &format!("{:04}", bucket.year()))
        .replace("{month}", &format!("{:02}", bucket.month()))
        .replace("{day}", &format!("{:02}", bucket.day()))
        .replace("{date}", &bucket.date_pattern())
        .replace("{hour}", &bucket.hour_pattern())
}

/// The set of configured providers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Providers(Vec<ProviderSpec>);

impl Providers {
    #[must_use]
    pub fn new(specs: Vec<ProviderSpec>) -> Self {
        Self(specs)
    }

    /// The two feeds of the public raw log directory.
    #[must_use]
    pub fn builtin() -> Self {
        Self(vec![
            ProviderSpec::lobby("a", "dat/sca{hour}.log.gz", "dat/{year}/sca{date}.log.gz"),
            ProviderSpec::table("b", "dat/scb{hour}.log.gz", "dat/{year}/scb{date}.log.gz"),
        ])
    }

    /// Look up a provider by tag.
    ///
    /// # Errors
    ///
    /// Returns `UnknownProvider` if no provider has this tag.
    pub fn get(&self, tag: &str) -> Result<&ProviderSpec> {
        self.0.iter().find(|p| p.tag == tag).ok_or_else(|| Error::UnknownProvider {
            tag: tag.to_string(),
            available: self.tags(),
        })
    }

    #[must_use]
    pub fn tags(&self) -> Vec<String> {
        self.0.iter().map(|p| p.tag.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProviderSpec> {
        self.0.iter()
    }

    /// Add `spec`, replacing any provider with the same tag.
    pub fn upsert(&mut self, spec: ProviderSpec) {
        if let Some(existing) = self.0.iter_mut().find(|p| p.tag == spec.tag) {
            *existing = spec;
        } else {
            self.0.push(spec);
        }
    }
}

impl Default for Providers {
    fn default() -> Self {
        Self::builtin()
    }
}
