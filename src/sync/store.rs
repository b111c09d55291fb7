//! Persistence contracts the engine writes through.

use crate::error::Result;
use crate::model::{MatchRecord, SyncCheckpoint, TimeBucket};

use super::types::{PassReport, WriteStats};

/// Append-only history of sync windows per provider.
pub trait CheckpointStore {
    /// Most recently appended checkpoint for `provider`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn load_latest(&self, provider: &str) -> Result<Option<SyncCheckpoint>>;

    /// Append a new checkpoint. Earlier rows are never touched.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be written.
    fn append(&mut self, provider: &str, window_start: i64, window_end: i64) -> Result<()>;

    /// Keep a record of a finished pass. Stores without an audit trail
    /// ignore it.
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    fn record_pass(&mut self, _report: &PassReport) -> Result<()> {
        Ok(())
    }
}

/// Durable, duplicate-tolerant destination for parsed records.
pub trait RecordSink {
    /// Write all records of `bucket` as one unit.
    ///
    /// Records whose identity key is already stored are counted as
    /// duplicates, not errors.
    ///
    /// # Errors
    ///
    /// Any other write fault; nothing from the batch is kept.
    fn write_batch(&mut self, bucket: &TimeBucket, records: &[MatchRecord]) -> Result<WriteStats>;
}
