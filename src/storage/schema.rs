//! Database schema definitions and migration logic.
//!
//! This module contains the complete SQLite schema for logsync.

use rusqlite::{Connection, Result};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// The complete SQL schema for the logsync database.
///
/// Match and checkpoint times are Unix seconds (the feed's resolution);
/// bookkeeping timestamps (`ingested_at`, `created_at`) are Unix milliseconds.
pub const SCHEMA_SQL: &str = r#"
-- ====================
-- Schema Version Tracking
-- ====================

CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- ====================
-- Core Tables
-- ====================

-- Matches: one row per finished session, keyed by identity key
CREATE TABLE IF NOT EXISTS matches (
    id TEXT PRIMARY KEY,
    source_type TEXT NOT NULL,
    start_time INTEGER NOT NULL,
    end_time INTEGER,
    duration INTEGER,
    lobby INTEGER,
    raw_lobby TEXT,
    players TEXT NOT NULL,
    points TEXT NOT NULL,
    chips TEXT,
    playernum INTEGER CHECK (playernum IS NULL OR playernum IN (3, 4)),
    playerlevel INTEGER CHECK (playerlevel IS NULL OR playerlevel BETWEEN 0 AND 4),
    playlength INTEGER CHECK (playlength IS NULL OR playlength IN (1, 2)),
    kuitanari INTEGER,
    akaari INTEGER,
    rapid INTEGER,
    shugi INTEGER,
    bucket TEXT NOT NULL,
    ingested_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_matches_start ON matches(start_time);
CREATE INDEX IF NOT EXISTS idx_matches_source_start ON matches(source_type, start_time);

-- Sync checkpoints: append-only, latest row per provider wins
CREATE TABLE IF NOT EXISTS sync_checkpoints (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    provider TEXT NOT NULL,
    window_start INTEGER NOT NULL,
    window_end INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);

-- ====================
-- Audit
-- ====================

CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    actor TEXT NOT NULL,
    old_value TEXT,
    new_value TEXT,
    comment TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id);
CREATE INDEX IF NOT EXISTS idx_events_created ON events(created_at);
"#;

/// Apply the schema to a database connection.
///
/// This is idempotent - it uses `IF NOT EXISTS` for all objects.
///
/// # Errors
///
/// Returns an error if the SQL execution fails or pragmas cannot be set.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    // Set pragmas before schema creation
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "cache_size", "-64000")?; // 64MB cache
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    // Apply schema
    conn.execute_batch(SCHEMA_SQL)?;

    // Apply pending migrations
    super::migrations::run_migrations(conn)?;

    // Record schema version
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}
