//! SQLite storage implementation.
//!
//! This module provides the storage backend for logsync using SQLite.
//! It follows the MutationContext pattern for transaction discipline and audit logging.

use crate::error::{Error, Result};
use crate::model::{
    MatchRecord, PlayTypeFlags, RoundLength, SkillTier, SyncCheckpoint, TimeBucket,
};
use crate::storage::events::{insert_event, recent_events, Event, EventType};
use crate::storage::schema::apply_schema;
use crate::sync::{CheckpointStore, PassReport, RecordSink, WriteStats};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, Transaction};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

/// Actor recorded on events written outside a pass.
const STORE_ACTOR: &str = "logsync";

/// SQLite-based storage backend.
#[derive(Debug)]
pub struct SqliteStorage {
    conn: Connection,
}

/// Context for a mutation operation, collecting audit events that are
/// written in the same transaction.
pub struct MutationContext {
    /// Name of the operation being performed.
    pub op_name: String,
    /// Run or process performing the operation.
    pub actor: String,
    /// Events to write at the end of the transaction.
    pub events: Vec<Event>,
}

impl MutationContext {
    /// Create a new mutation context.
    #[must_use]
    pub fn new(op_name: &str, actor: &str) -> Self {
        Self {
            op_name: op_name.to_string(),
            actor: actor.to_string(),
            events: Vec::new(),
        }
    }

    /// Record an event for this operation.
    pub fn record_event(&mut self, entity_type: &str, entity_id: &str, event_type: EventType) {
        self.events
            .push(Event::new(entity_type, entity_id, event_type, &self.actor));
    }

    /// Record an event with old/new values for field tracking.
    pub fn record_change(
        &mut self,
        entity_type: &str,
        entity_id: &str,
        event_type: EventType,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        self.events.push(
            Event::new(entity_type, entity_id, event_type, &self.actor)
                .with_values(old_value, new_value),
        );
    }
}

/// Stored match count for one provider.
#[derive(Debug, Clone, Serialize)]
pub struct SourceCount {
    pub source_type: String,
    pub matches: i64,
    /// Start time of the newest stored match (Unix seconds).
    pub latest_start: Option<i64>,
}

/// Totals of a pass, kept as the `new_value` of its event.
#[derive(Serialize)]
struct PassSummary<'a> {
    window_start: i64,
    checkpoint_end: i64,
    buckets: usize,
    records_written: usize,
    duplicates: usize,
    warnings: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    failed_bucket: Option<&'a str>,
}

impl SqliteStorage {
    /// Open a database at the given path.
    ///
    /// Creates the database and applies schema if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// Providers syncing concurrently each hold their own connection, so the
    /// timeout decides how long a writer waits for another's transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path)?;

        if let Some(timeout) = timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout))?;
        } else {
            // Default 5 second timeout
            conn.busy_timeout(Duration::from_secs(5))?;
        }

        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn })
    }

    /// Get a reference to the underlying connection (for read operations).
    #[must_use]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Execute a mutation with the transaction protocol.
    ///
    /// This method:
    /// 1. Begins an IMMEDIATE transaction (for write locking)
    /// 2. Executes the mutation closure
    /// 3. Writes audit events
    /// 4. Commits (or rolls back on error)
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The transaction is rolled back on error.
    pub fn mutate<F, R>(&mut self, op: &str, actor: &str, f: F) -> Result<R>
    where
        F: FnOnce(&Transaction, &mut MutationContext) -> Result<R>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

        let mut ctx = MutationContext::new(op, actor);

        let result = f(&tx, &mut ctx)?;

        for event in &ctx.events {
            insert_event(&tx, event)?;
        }

        tx.commit()?;

        Ok(result)
    }

    // ==================
    // Match Operations
    // ==================

    /// Get a stored match by identity key.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored JSON column is corrupt.
    pub fn get_match(&self, identity_key: &str) -> Result<Option<MatchRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, source_type, start_time, end_time, duration, lobby, raw_lobby,
                    players, points, chips, playernum, playerlevel, playlength,
                    kuitanari, akaari, rapid, shugi, bucket
             FROM matches WHERE id = ?1",
        )?;

        let record = stmt.query_row([identity_key], map_match_row).optional()?;
        Ok(record)
    }

    /// Number of stored matches and newest start time, per provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn match_counts(&self) -> Result<Vec<SourceCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT source_type, COUNT(*), MAX(start_time)
             FROM matches GROUP BY source_type ORDER BY source_type",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(SourceCount {
                source_type: row.get(0)?,
                matches: row.get(1)?,
                latest_start: row.get(2)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // ==================
    // Checkpoint Operations
    // ==================

    /// Latest checkpoint of every provider, ordered by provider tag.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn latest_checkpoints(&self) -> Result<Vec<SyncCheckpoint>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, provider, window_start, window_end, created_at
             FROM sync_checkpoints
             WHERE id IN (SELECT MAX(id) FROM sync_checkpoints GROUP BY provider)
             ORDER BY provider",
        )?;

        let rows = stmt.query_map([], map_checkpoint_row)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    /// Most recent pass events, optionally for one provider.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn recent_passes(&self, provider: Option<&str>, limit: u32) -> Result<Vec<Event>> {
        recent_events(
            &self.conn,
            "provider",
            provider,
            Some(EventType::CheckpointAppended),
            limit,
        )
        .map_err(Error::from)
    }
}

impl CheckpointStore for SqliteStorage {
    fn load_latest(&self, provider: &str) -> Result<Option<SyncCheckpoint>> {
        let checkpoint = self
            .conn
            .query_row(
                "SELECT id, provider, window_start, window_end, created_at
                 FROM sync_checkpoints WHERE provider = ?1
                 ORDER BY id DESC LIMIT 1",
                [provider],
                map_checkpoint_row,
            )
            .optional()?;
        Ok(checkpoint)
    }

    fn append(&mut self, provider: &str, window_start: i64, window_end: i64) -> Result<()> {
        let previous = self.load_latest(provider)?.map(|cp| cp.window_end.to_string());
        let now = chrono::Utc::now().timestamp_millis();

        self.mutate("append_checkpoint", STORE_ACTOR, |tx, ctx| {
            tx.execute(
                "INSERT INTO sync_checkpoints (provider, window_start, window_end, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![provider, window_start, window_end, now],
            )?;

            ctx.record_change(
                "provider",
                provider,
                EventType::CheckpointAppended,
                previous,
                Some(window_end.to_string()),
            );
            Ok(())
        })
    }

    fn record_pass(&mut self, report: &PassReport) -> Result<()> {
        let event_type = if report.success {
            EventType::PassCompleted
        } else if report.cancelled {
            EventType::PassCancelled
        } else if report.checkpoint_appended {
            EventType::PassPartial
        } else {
            EventType::PassFailed
        };

        let summary = serde_json::to_string(&PassSummary {
            window_start: report.window_start,
            checkpoint_end: report.checkpoint_end,
            buckets: report.buckets.len(),
            records_written: report.records_written,
            duplicates: report.duplicates,
            warnings: report.warnings,
            failed_bucket: report.failed_bucket.as_deref(),
        })?;

        let mut event = Event::new("provider", &report.provider, event_type, &report.run_id)
            .with_values(None, Some(summary));
        if let Some(error) = &report.error {
            event = event.with_comment(error);
        }

        self.mutate("record_pass", &report.run_id, |_tx, ctx| {
            ctx.events.push(event);
            Ok(())
        })
    }
}

impl RecordSink for SqliteStorage {
    fn write_batch(&mut self, bucket: &TimeBucket, records: &[MatchRecord]) -> Result<WriteStats> {
        let sink_error = |source: rusqlite::Error| Error::SinkWrite {
            bucket: bucket.to_string(),
            source,
        };

        let tx = self
            .conn
            .transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)
            .map_err(sink_error)?;

        let now = chrono::Utc::now().timestamp_millis();
        let mut stats = WriteStats::default();
        {
            let mut stmt = tx
                .prepare_cached(
                    "INSERT OR IGNORE INTO matches (
                        id, source_type, start_time, end_time, duration, lobby, raw_lobby,
                        players, points, chips, playernum, playerlevel, playlength,
                        kuitanari, akaari, rapid, shugi, bucket, ingested_at
                     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                               ?14, ?15, ?16, ?17, ?18, ?19)",
                )
                .map_err(sink_error)?;

            for record in records {
                let players = serde_json::to_string(&record.players)?;
                let points = serde_json::to_string(&record.points)?;
                let chips = record.chips.as_ref().map(serde_json::to_string).transpose()?;
                let flags = &record.flags;

                let inserted = stmt
                    .execute(rusqlite::params![
                        record.identity_key,
                        record.source_type,
                        record.start_time,
                        record.end_time,
                        record.duration,
                        record.lobby,
                        record.raw_lobby,
                        players,
                        points,
                        chips,
                        flags.player_count,
                        flags.skill_tier.map(SkillTier::code),
                        flags.round_length.map(RoundLength::code),
                        present(flags.open_tanyao),
                        present(flags.red_fives),
                        present(flags.rapid),
                        present(flags.celebration_chips),
                        record.bucket,
                        now,
                    ])
                    .map_err(sink_error)?;

                if inserted == 0 {
                    stats.duplicates += 1;
                } else {
                    stats.accepted += 1;
                }
            }
        }

        tx.commit().map_err(sink_error)?;
        Ok(stats)
    }
}

/// Toggles are stored as 1 when present and NULL when absent.
fn present(flag: bool) -> Option<i64> {
    flag.then_some(1)
}

fn map_checkpoint_row(row: &Row<'_>) -> rusqlite::Result<SyncCheckpoint> {
    Ok(SyncCheckpoint {
        id: row.get(0)?,
        provider: row.get(1)?,
        window_start: row.get(2)?,
        window_end: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn map_match_row(row: &Row<'_>) -> rusqlite::Result<MatchRecord> {
    let chips: Option<String> = row.get(9)?;
    let chips = chips
        .map(|text| serde_json::from_str(&text))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(9, Type::Text, Box::new(e)))?;

    let flag = |idx: usize| -> rusqlite::Result<bool> {
        Ok(row.get::<_, Option<i64>>(idx)?.is_some_and(|v| v != 0))
    };

    Ok(MatchRecord {
        identity_key: row.get(0)?,
        source_type: row.get(1)?,
        start_time: row.get(2)?,
        end_time: row.get(3)?,
        duration: row.get(4)?,
        lobby: row.get(5)?,
        raw_lobby: row.get(6)?,
        players: json_column(row, 7)?,
        points: json_column(row, 8)?,
        chips,
        flags: PlayTypeFlags {
            player_count: row.get(10)?,
            skill_tier: row.get::<_, Option<i64>>(11)?.and_then(SkillTier::from_code),
            round_length: row.get::<_, Option<i64>>(12)?.and_then(RoundLength::from_code),
            open_tanyao: flag(13)?,
            red_fives: flag(14)?,
            rapid: flag(15)?,
            celebration_chips: flag(16)?,
        },
        bucket: row.get(17)?,
    })
}
