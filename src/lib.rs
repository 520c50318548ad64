//! # sbir-sync
//!
//! Resumable batch synchronization of SBIR/STTR award data from the
//! public award API into a local DuckDB store.
//!
//! The API is offset-paged, exposes no total record count, and throttles
//! impolite clients, so the interesting part of this crate is the
//! download engine: it walks the offset cursor to exhaustion, retries
//! transient failures with backoff, spaces every request by a mandatory
//! minimum delay, and persists its position after each committed page so
//! an interrupted run resumes instead of starting over. Storage is an
//! idempotent upsert keyed by contract number, which makes re-fetching a
//! page after a crash safe.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use sbir_sync::{ProgressStore, SyncConfig, SyncDriver};
//! use sbir_sync::sink::DuckdbSink;
//!
//! #[tokio::main]
//! async fn main() -> sbir_sync::Result<()> {
//!     let config = SyncConfig::default();
//!     let sink = DuckdbSink::open(config.database_path())?;
//!     let progress = ProgressStore::new(config.progress_path());
//!
//!     let driver = SyncDriver::new(config, progress, sink)?;
//!     let report = driver.run().await?;
//!     println!("{} records", report.total_fetched);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Pagination Driver                    │
//! │  resume → fetch → commit → advance → … → exhaustion     │
//! └─────────────────────────────────────────────────────────┘
//!          │               │                  │
//! ┌────────┴─────┐ ┌───────┴────────┐ ┌───────┴────────┐
//! │ Retry Policy │ │ Progress Store │ │  Record Sink   │
//! │ Page Fetcher │ │ (atomic JSON)  │ │ (DuckDB upsert)│
//! │ RequestPacer │ │                │ │                │
//! └──────────────┘ └────────────────┘ └────────────────┘
//! ```

#![warn(clippy::all)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the crate
pub mod error;

/// Common types: records, validation, skip policy
pub mod types;

/// Sync configuration
pub mod config;

/// Page fetching, pacing, and retries
pub mod fetch;

/// Progress persistence
pub mod progress;

/// Record sinks (DuckDB and in-memory)
pub mod sink;

/// The pagination driver
pub mod driver;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::SyncConfig;
pub use driver::{SyncDriver, SyncReport, SyncStatus};
pub use error::{Error, Result};
pub use progress::{ProgressState, ProgressStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
