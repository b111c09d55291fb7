//! Configuration management.
//!
//! This module resolves the database path and loads `~/.logsync/config.json`.
//!
//! # Layout
//!
//! - **Database**: `~/.logsync/data/logsync.db` unless `--db` or `LOGSYNC_DB`
//!   says otherwise
//! - **Config**: `~/.logsync/config.json`, every field optional
//!
//! Environment variables override the config file; command-line flags
//! override both.

use crate::error::{Error, Result};
use crate::grades::{DEFAULT_FEED_URL, DEFAULT_MARGIN, DEFAULT_RANK_TIMEOUT_SECS, DEFAULT_RANK_URL};
use crate::model::{ProviderSpec, Providers};
use crate::sync::{DEFAULT_BASE_URL, DEFAULT_LOOKBACK_DAYS, DEFAULT_TIMEOUT_SECS};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound on `lookback_days`, about a century.
pub const MAX_LOOKBACK_DAYS: i64 = 36_500;

/// Get the global logsync directory location (`~/.logsync/`).
#[must_use]
pub fn global_logsync_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".logsync"))
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `LOGSYNC_DB` environment variable
/// 3. Global location: `~/.logsync/data/logsync.db`
///
/// # Returns
///
/// Returns the path to the database file, or `None` if no location found.
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }

    if let Ok(db_path) = std::env::var("LOGSYNC_DB") {
        if !db_path.trim().is_empty() {
            return Some(PathBuf::from(db_path));
        }
    }

    global_logsync_dir().map(|dir| dir.join("data").join("logsync.db"))
}

/// Get the config file path.
fn config_path() -> Result<PathBuf> {
    global_logsync_dir()
        .map(|dir| dir.join("config.json"))
        .ok_or(Error::Config("Could not determine home directory".into()))
}

/// Grade watcher endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GradeConfig {
    pub feed_url: Option<String>,
    pub rank_url: Option<String>,
    pub rank_timeout_secs: Option<u64>,
    pub margin: Option<usize>,
}

/// Contents of `config.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsyncConfig {
    /// Base URL the provider path templates are relative to.
    pub base_url: Option<String>,

    /// Per-request fetch timeout.
    pub timeout_secs: Option<u64>,

    /// First-run lookback for providers without a checkpoint.
    pub lookback_days: Option<i64>,

    /// Providers added to, or replacing, the built-in ones by tag.
    pub providers: Vec<ProviderSpec>,

    pub grades: GradeConfig,
}

/// Load the configuration file, or defaults if it doesn't exist.
///
/// # Errors
///
/// Returns a configuration error if the file exists but cannot be read or parsed.
pub fn load_config() -> Result<LogsyncConfig> {
    load_config_from(&config_path()?)
}

/// Load a configuration file from an explicit path.
///
/// # Errors
///
/// Returns a configuration error if the file exists but cannot be read or parsed.
pub fn load_config_from(path: &Path) -> Result<LogsyncConfig> {
    if !path.exists() {
        return Ok(LogsyncConfig::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Failed to read config file: {e}")))?;

    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse config file: {e}")))
}

/// Effective sync settings after applying file, environment and flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub base_url: String,
    pub timeout: Duration,
    pub lookback_days: i64,
    pub providers: Providers,
}

/// Effective grade watcher settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeSettings {
    pub feed_url: String,
    pub rank_url: String,
    pub rank_timeout: Duration,
    pub margin: usize,
}

impl LogsyncConfig {
    /// Resolve sync settings with the process environment.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unparsable `LOGSYNC_TIMEOUT_SECS`.
    pub fn sync_settings(&self, timeout_flag: Option<u64>) -> Result<SyncSettings> {
        self.sync_settings_with(timeout_flag, |key| std::env::var(key).ok())
    }

    /// Resolve sync settings reading variables through `env`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an unparsable `LOGSYNC_TIMEOUT_SECS`.
    pub fn sync_settings_with(
        &self,
        timeout_flag: Option<u64>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<SyncSettings> {
        let env_value = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let base_url = env_value("LOGSYNC_BASE_URL")
            .or_else(|| self.base_url.clone())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let env_timeout = env_value("LOGSYNC_TIMEOUT_SECS")
            .map(|v| {
                v.trim().parse::<u64>().map_err(|_| {
                    Error::Config(format!("LOGSYNC_TIMEOUT_SECS is not a number: {v}"))
                })
            })
            .transpose()?;

        let timeout_secs = timeout_flag
            .or(env_timeout)
            .or(self.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let lookback_days = self.lookback_days.unwrap_or(DEFAULT_LOOKBACK_DAYS);
        if !(0..=MAX_LOOKBACK_DAYS).contains(&lookback_days) {
            return Err(Error::Config(format!(
                "lookback_days must be between 0 and {MAX_LOOKBACK_DAYS}: {lookback_days}"
            )));
        }

        let mut providers = Providers::builtin();
        for spec in &self.providers {
            providers.upsert(spec.clone());
        }

        Ok(SyncSettings {
            base_url,
            timeout: Duration::from_secs(timeout_secs),
            lookback_days,
            providers,
        })
    }

    /// Resolve grade watcher settings.
    #[must_use]
    pub fn grade_settings(&self) -> GradeSettings {
        let grades = &self.grades;
        GradeSettings {
            feed_url: grades
                .feed_url
                .clone()
                .unwrap_or_else(|| DEFAULT_FEED_URL.to_string()),
            rank_url: grades
                .rank_url
                .clone()
                .unwrap_or_else(|| DEFAULT_RANK_URL.to_string()),
            rank_timeout: Duration::from_secs(
                grades.rank_timeout_secs.unwrap_or(DEFAULT_RANK_TIMEOUT_SECS),
            ),
            margin: grades.margin.unwrap_or(DEFAULT_MARGIN),
        }
    }
}
