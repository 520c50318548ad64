//! Driver report types

use crate::progress::SkippedRange;
use serde::Serialize;

/// Terminal status of a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
    /// The dataset was walked to exhaustion
    Completed,
    /// The run stopped early (interrupt or abort policy); progress is saved
    Aborted,
    /// Exhaustion was reached but some pages were skipped along the way
    PartialWithSkips,
}

/// Summary of a finished sync run
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// Terminal status
    pub status: SyncStatus,
    /// Cumulative records fetched across all runs of this walk
    pub total_fetched: u64,
    /// Rows newly inserted during this run
    pub inserted: u64,
    /// Rows updated during this run
    pub updated: u64,
    /// Pages fetched successfully during this run, confirmation
    /// re-fetches included; failed pages are not counted
    pub pages_fetched: u32,
    /// Ranges skipped after permanent failures
    pub skipped: Vec<SkippedRange>,
    /// Wall-clock duration of this run in milliseconds
    pub duration_ms: u64,
}

impl SyncReport {
    /// Records written to the sink during this run
    pub fn records_written(&self) -> u64 {
        self.inserted + self.updated
    }
}
