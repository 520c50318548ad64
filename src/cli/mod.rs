//! CLI module
//!
//! Command-line interface for running syncs.
//!
//! # Commands
//!
//! - `sync` - Full download, resuming an interrupted walk
//! - `update` - Incremental refresh of recently dated awards
//! - `status` - Stored record count and progress snapshot
//! - `export` - CSV export of the award store
//! - `reset` - Delete persisted progress

mod commands;
mod runner;

pub use commands::{Cli, Commands};
pub use runner::Runner;
