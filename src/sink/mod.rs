//! Record sinks
//!
//! The driver hands committed pages to a [`RecordSink`]. The contract is
//! an idempotent upsert keyed by the contract number: calling it again
//! with an overlapping batch must not produce duplicates, which is what
//! makes re-fetching a page after an interrupted run safe.

mod duckdb;

pub use self::duckdb::DuckdbSink;

use crate::error::{Error, Result};
use crate::types::{record_key, Record};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Outcome of one upsert call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertStats {
    /// Records that did not exist before
    pub inserted: u64,
    /// Records that replaced an existing row
    pub updated: u64,
}

impl UpsertStats {
    /// Total records written
    pub fn total(&self) -> u64 {
        self.inserted + self.updated
    }
}

/// Durable, idempotent storage for award records
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Upsert a batch of records, keyed by contract number.
    ///
    /// Must be safe to call repeatedly with overlapping batches.
    async fn upsert(&self, batch: &[Record]) -> Result<UpsertStats>;

    /// Number of records currently stored
    async fn count(&self) -> Result<u64>;
}

/// In-memory sink used by tests and dry runs
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<BTreeMap<String, Record>>,
    fail_writes: AtomicBool,
}

impl MemorySink {
    /// Create an empty in-memory sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent upsert fail, to exercise storage-error paths
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of the stored records, ordered by key
    pub fn records(&self) -> Vec<Record> {
        self.records
            .lock()
            .expect("sink lock poisoned")
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn upsert(&self, batch: &[Record]) -> Result<UpsertStats> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::storage_write("simulated write failure"));
        }

        let mut records = self.records.lock().expect("sink lock poisoned");
        let mut stats = UpsertStats::default();

        for record in batch {
            let Some(key) = record_key(record) else {
                continue;
            };
            if records.insert(key.to_string(), record.clone()).is_some() {
                stats.updated += 1;
            } else {
                stats.inserted += 1;
            }
        }

        Ok(stats)
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.records.lock().expect("sink lock poisoned").len() as u64)
    }
}

#[cfg(test)]
mod tests;
