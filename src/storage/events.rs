//! Audit event storage and retrieval.
//!
//! Every sync pass leaves an event per provider so `status` can show what
//! the last runs covered and where they stopped.

use rusqlite::{Connection, Result};
use serde::Serialize;

/// Event types for audit logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    PassCompleted,
    PassPartial,
    PassCancelled,
    PassFailed,
    CheckpointAppended,
}

impl EventType {
    /// Get the string representation for storage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PassCompleted => "pass_completed",
            Self::PassPartial => "pass_partial",
            Self::PassCancelled => "pass_cancelled",
            Self::PassFailed => "pass_failed",
            Self::CheckpointAppended => "checkpoint_appended",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "pass_completed" => Some(Self::PassCompleted),
            "pass_partial" => Some(Self::PassPartial),
            "pass_cancelled" => Some(Self::PassCancelled),
            "pass_failed" => Some(Self::PassFailed),
            "checkpoint_appended" => Some(Self::CheckpointAppended),
            _ => None,
        }
    }
}

/// An audit event record.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: String,
    pub event_type: EventType,
    /// Run ID of the pass that produced the event.
    pub actor: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub comment: Option<String>,
    pub created_at: i64,
}

impl Event {
    /// Create a new event (id will be assigned by database).
    #[must_use]
    pub fn new(entity_type: &str, entity_id: &str, event_type: EventType, actor: &str) -> Self {
        Self {
            id: 0,
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            event_type,
            actor: actor.to_string(),
            old_value: None,
            new_value: None,
            comment: None,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Add old/new values for change tracking.
    #[must_use]
    pub fn with_values(mut self, old: Option<String>, new: Option<String>) -> Self {
        self.old_value = old;
        self.new_value = new;
        self
    }

    /// Add a comment to the event.
    #[must_use]
    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }
}

/// Insert an event into the database.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_event(conn: &Connection, event: &Event) -> Result<i64> {
    conn.execute(
        "INSERT INTO events (entity_type, entity_id, event_type, actor, old_value, new_value, comment, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
            event.entity_type,
            event.entity_id,
            event.event_type.as_str(),
            event.actor,
            event.old_value,
            event.new_value,
            event.comment,
            event.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Most recent events, optionally for one entity.
///
/// Rows with an event type this build does not know are skipped.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn recent_events(
    conn: &Connection,
    entity_type: &str,
    entity_id: Option<&str>,
    exclude: Option<EventType>,
    limit: u32,
) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT id, entity_type, entity_id, event_type, actor, old_value, new_value, comment, created_at
         FROM events
         WHERE entity_type = ?1 AND (?2 IS NULL OR entity_id = ?2)
           AND (?3 IS NULL OR event_type != ?3)
         ORDER BY id DESC
         LIMIT ?4",
    )?;

    let excluded = exclude.map(|t| t.as_str());
    let rows = stmt.query_map(rusqlite::params![entity_type, entity_id, excluded, limit], |row| {
        let event_type: String = row.get(3)?;
        Ok(EventType::parse(&event_type).map(|event_type| Event {
            id: row.get(0).unwrap_or_default(),
            entity_type: row.get(1).unwrap_or_default(),
            entity_id: row.get(2).unwrap_or_default(),
            event_type,
            actor: row.get(4).unwrap_or_default(),
            old_value: row.get(5).ok().flatten(),
            new_value: row.get(6).ok().flatten(),
            comment: row.get(7).ok().flatten(),
            created_at: row.get(8).unwrap_or_default(),
        }))
    })?;

    let mut events = Vec::new();
    for row in rows {
        if let Some(event) = row? {
            events.push(event);
        }
    }
    Ok(events)
}
