//! Command implementations.

pub mod backfill;
pub mod completions;
pub mod grades;
pub mod providers;
pub mod status;
pub mod sync;
pub mod version;
