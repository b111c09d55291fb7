//! CLI definitions using clap.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// logsync - Incremental ingestion of time-bucketed game-session logs
#[derive(Parser, Debug)]
#[command(name = "logsync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.logsync/data/logsync.db)
    #[arg(long, global = true, env = "LOGSYNC_DB")]
    pub db: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Per-request fetch timeout in seconds
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Catch up providers from their last checkpoint to now
    Sync {
        /// Provider tags to sync (default: all configured providers)
        providers: Vec<String>,
    },

    /// Sync an explicit time window for one provider
    Backfill(BackfillArgs),

    /// Show checkpoints, stored match counts and recent passes
    Status {
        /// Number of recent passes to show
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },

    /// List configured providers
    Providers,

    /// Watch the grade-change feed and refresh changed players
    Grades {
        /// Poll every N seconds instead of once
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Print version information
    Version,
}

#[derive(Args, Debug, Clone)]
pub struct BackfillArgs {
    /// Provider tag
    pub provider: String,

    /// Window start (YYYY-MM-DD, YYYY-MM-DDTHH:MM in UTC+9, RFC 3339, or epoch seconds)
    #[arg(long)]
    pub from: String,

    /// Window end, exclusive (same formats as --from)
    #[arg(long)]
    pub to: String,
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}
