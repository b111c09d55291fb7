//! Error types for logsync.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, 5=transport, etc.)
//! - Retryability flags for schedulers deciding whether to re-run a pass
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for logsync operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. Scripts match on the string or on the exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    NotInitialized,
    DatabaseError,
    SinkWriteFailed,

    // Not Found (exit 3)
    UnknownProvider,

    // Validation (exit 4)
    InvalidArgument,
    InvalidWindow,

    // Transport (exit 5)
    TransportFailure,
    DecodeFailure,

    // Sync (exit 6)
    SyncCancelled,
    SyncFailed,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::SinkWriteFailed => "SINK_WRITE_FAILED",
            Self::UnknownProvider => "UNKNOWN_PROVIDER",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::InvalidWindow => "INVALID_WINDOW",
            Self::TransportFailure => "TRANSPORT_FAILURE",
            Self::DecodeFailure => "DECODE_FAILURE",
            Self::SyncCancelled => "SYNC_CANCELLED",
            Self::SyncFailed => "SYNC_FAILED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::NotInitialized | Self::DatabaseError | Self::SinkWriteFailed => 2,
            Self::UnknownProvider => 3,
            Self::InvalidArgument | Self::InvalidWindow => 4,
            Self::TransportFailure | Self::DecodeFailure => 5,
            Self::SyncCancelled | Self::SyncFailed => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether re-running the same pass later can be expected to succeed.
    ///
    /// True for transport faults and lock contention. False for bad input,
    /// unknown providers, or configuration mistakes.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::TransportFailure
                | Self::DecodeFailure
                | Self::DatabaseError
                | Self::SinkWriteFailed
                | Self::SyncCancelled
                | Self::SyncFailed
        )
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in logsync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Database not found at {path}")]
    NotInitialized { path: PathBuf },

    #[error("Unknown provider: {tag}")]
    UnknownProvider {
        tag: String,
        /// Configured provider tags, for hint display.
        available: Vec<String>,
    },

    #[error("Transport failure for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Live bucket {bucket} is missing from the feed")]
    BucketMissing { bucket: String },

    #[error("Failed to decode {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Failed to write {bucket}: {source}")]
    SinkWrite {
        bucket: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Invalid window: start {start} is not before end {end}")]
    InvalidWindow { start: i64, end: i64 },

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Sync pass failed for: {}", providers.join(", "))]
    PassFailed { providers: Vec<String> },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotInitialized { .. } => ErrorCode::NotInitialized,
            Self::UnknownProvider { .. } => ErrorCode::UnknownProvider,
            Self::Transport { .. } | Self::BucketMissing { .. } => ErrorCode::TransportFailure,
            Self::Decode { .. } => ErrorCode::DecodeFailure,
            Self::SinkWrite { .. } => ErrorCode::SinkWriteFailed,
            Self::InvalidWindow { .. } => ErrorCode::InvalidWindow,
            Self::Cancelled => ErrorCode::SyncCancelled,
            Self::PassFailed { .. } => ErrorCode::SyncFailed,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotInitialized { path } => Some(format!(
                "No database at {}. Run `logsync sync` once to create it, or pass --db.",
                path.display()
            )),

            Self::UnknownProvider { available, .. } => {
                if available.is_empty() {
                    Some("No providers are configured. Check ~/.logsync/config.json.".to_string())
                } else {
                    Some(format!("Known providers: {}", available.join(", ")))
                }
            }

            Self::Transport { .. }
            | Self::BucketMissing { .. }
            | Self::Decode { .. }
            | Self::PassFailed { .. } => Some(
                "Progress up to the last completed bucket was saved. \
                 The next `logsync sync` resumes from there."
                    .to_string(),
            ),

            Self::Cancelled => Some(
                "Progress up to the last completed bucket was saved.".to_string(),
            ),

            Self::InvalidWindow { .. } => Some(
                "Pass --from earlier than --to, e.g. --from 2024-01-01 --to 2024-01-03".to_string(),
            ),

            Self::InvalidArgument(msg) if msg.contains("time") => Some(
                "Accepted formats: YYYY-MM-DD, YYYY-MM-DDTHH:MM (UTC+9), RFC 3339, or epoch seconds"
                    .to_string(),
            ),

            Self::SinkWrite { .. }
            | Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidArgument(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}
