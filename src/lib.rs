//! logsync - Incremental ingestion of time-bucketed game-session logs
//!
//! This crate provides the core functionality for the `logsync` CLI tool.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface using clap
//! - [`model`] - Data types (TimeBucket, ProviderSpec, MatchRecord, SyncCheckpoint)
//! - [`parse`] - Line parsing and identity keys
//! - [`storage`] - SQLite database layer
//! - [`sync`] - Checkpointed feed walk, fetch and store contracts
//! - [`grades`] - Grade-change watcher
//! - [`config`] - Configuration management
//! - [`error`] - Error types and handling

#![forbid(unsafe_code)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod error;
pub mod grades;
pub mod model;
pub mod parse;
pub mod storage;
pub mod sync;

pub use error::{Error, Result};
