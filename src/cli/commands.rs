//! CLI commands and argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// SBIR/STTR award synchronization CLI
#[derive(Parser, Debug)]
#[command(name = "sbir-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Data directory holding the database and progress file
    #[arg(short, long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download all awards from the API, resuming an interrupted walk
    Sync,

    /// Refresh recently dated awards (requires a completed full sync)
    Update {
        /// Override the configured lookback window, in days
        #[arg(long)]
        lookback_days: Option<i64>,
    },

    /// Show stored record count and sync progress
    Status,

    /// Export stored awards to CSV
    Export {
        /// Output path (defaults to the data directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete persisted progress, forcing the next sync to start from zero
    Reset {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },
}
