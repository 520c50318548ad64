//! Progress state types
//!
//! Serialized to JSON and persisted between runs. The state is owned by
//! the pagination driver; everything else only reads it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Durable record of how far a sync run has advanced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressState {
    /// Offset of the next page to fetch; always a multiple of `page_size`
    pub next_offset: u64,

    /// Page size the offsets were produced with
    pub page_size: u32,

    /// When the full walk started
    pub started_at: DateTime<Utc>,

    /// Last time the state was committed
    pub last_updated_at: DateTime<Utc>,

    /// Records handed to the sink so far
    pub total_fetched: u64,

    /// Whether the full walk reached exhaustion
    pub completed: bool,

    /// Pages given up on after retries, kept for manual inspection
    #[serde(default)]
    pub skipped: Vec<SkippedRange>,

    /// Last time an incremental sync refreshed the tail
    #[serde(default)]
    pub last_incremental_at: Option<DateTime<Utc>>,
}

/// One page width the driver skipped past after a permanent failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedRange {
    /// Offset the failed page started at
    pub offset: u64,
    /// Width of the skipped range (the page size at the time)
    pub length: u32,
    /// Why the page was abandoned
    pub reason: String,
}

impl ProgressState {
    /// Fresh state for a run starting at offset 0
    pub fn new(page_size: u32) -> Self {
        let now = Utc::now();
        Self {
            next_offset: 0,
            page_size,
            started_at: now,
            last_updated_at: now,
            total_fetched: 0,
            completed: false,
            skipped: Vec::new(),
            last_incremental_at: None,
        }
    }

    /// Advance past a committed page
    pub fn advance(&mut self, fetched: u64) {
        self.next_offset += u64::from(self.page_size);
        self.total_fetched += fetched;
        self.last_updated_at = Utc::now();
    }

    /// Record a permanently failed page and step over it
    pub fn record_skip(&mut self, reason: impl Into<String>) {
        self.skipped.push(SkippedRange {
            offset: self.next_offset,
            length: self.page_size,
            reason: reason.into(),
        });
        self.next_offset += u64::from(self.page_size);
        self.last_updated_at = Utc::now();
    }

    /// Mark the full walk exhausted
    pub fn mark_completed(&mut self) {
        self.completed = true;
        self.last_updated_at = Utc::now();
    }

    /// Note that an incremental sync just ran
    pub fn mark_incremental(&mut self) {
        self.last_incremental_at = Some(Utc::now());
        self.last_updated_at = Utc::now();
    }
}
