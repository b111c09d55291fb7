//! Grade-change feed and rank service clients.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Public feed of recent grade changes.
pub const DEFAULT_FEED_URL: &str = "https://nodocchi.moe/api/gradechanges.php";

/// Local rank service asked to refresh a player.
pub const DEFAULT_RANK_URL: &str = "http://127.0.0.1:7235/rank";

/// Per-player refresh timeout.
pub const DEFAULT_RANK_TIMEOUT_SECS: u64 = 7;

/// The feed sends `starttime` as either a string or a number.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StartTime {
    Number(i64),
    Text(String),
}

impl std::fmt::Display for StartTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

/// One entry of the grade-change feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeChange {
    pub starttime: StartTime,
    pub username: String,
    /// Remaining feed fields, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GradeChange {
    /// `starttime.username`
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}.{}", self.starttime, self.username)
    }
}

/// Source of recent grade changes.
pub trait GradeFeed: Send + Sync {
    fn fetch_changes(&self) -> impl std::future::Future<Output = Result<Vec<GradeChange>>> + Send;
}

/// Service that re-reads a player's rank.
pub trait RankRefresher: Send + Sync {
    fn refresh(&self, username: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// Reads the grade-change feed over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGradeFeed {
    client: reqwest::Client,
    url: String,
}

impl HttpGradeFeed {
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

impl GradeFeed for HttpGradeFeed {
    async fn fetch_changes(&self) -> Result<Vec<GradeChange>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::Transport {
                url: self.url.clone(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Error::Transport {
                url: self.url.clone(),
                message: format!("HTTP {}", response.status()),
            });
        }

        response.json().await.map_err(|e| Error::Decode {
            url: self.url.clone(),
            message: e.to_string(),
        })
    }
}

/// Asks the rank service to refresh one player.
#[derive(Debug, Clone)]
pub struct HttpRankRefresher {
    client: reqwest::Client,
    url: String,
}

impl HttpRankRefresher {
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.to_string(),
        })
    }
}

impl RankRefresher for HttpRankRefresher {
    async fn refresh(&self, username: &str) -> Result<()> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("username", username)])
            .send()
            .await
            .map_err(|e| Error::Transport {
                url: self.url.clone(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(Error::Transport {
                url: self.url.clone(),
                message: format!("HTTP {}", response.status()),
            });
        }

        // The service answers with the refreshed rank as JSON; a body that
        // does not parse means the refresh did not happen.
        response
            .json::<serde_json::Value>()
            .await
            .map(|_| ())
            .map_err(|e| Error::Decode {
                url: self.url.clone(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_entries_with_text_or_number_starttime() {
        let json = r#"[
            {"starttime": "1704034800", "username": "Alice", "before": "七段", "after": "八段"},
            {"starttime": 1704038400, "username": "Bob"}
        ]"#;
        let changes: Vec<GradeChange> = serde_json::from_str(json).unwrap();

        assert_eq!(changes[0].key(), "1704034800.Alice");
        assert_eq!(changes[0].extra["after"], "八段");
        assert_eq!(changes[1].key(), "1704038400.Bob");
        assert!(changes[1].extra.is_empty());
    }
}
