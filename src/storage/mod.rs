//! SQLite storage layer for logsync.
//!
//! This module provides the persistence layer using SQLite with:
//! - WAL mode so concurrent provider passes can share one database file
//! - Transaction discipline for atomic bucket writes
//! - Audit events for pass history
//!
//! # Submodules
//!
//! - [`events`] - Audit event storage
//! - [`schema`] - Database schema definitions
//! - [`sqlite`] - Main SQLite storage implementation

pub mod events;
pub mod migrations;
pub mod schema;
pub mod sqlite;

pub use events::{Event, EventType};
pub use sqlite::{MutationContext, SourceCount, SqliteStorage};
