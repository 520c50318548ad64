//! Pagination driver
//!
//! The state machine at the center of the crate. A run walks the offset
//! cursor page by page: fetch (through the retry policy), commit to the
//! sink, persist progress, advance. The upstream API exposes no total
//! count, so exhaustion is detected by two consecutive empty pages at the
//! same offset; the first empty result only triggers a confirmation
//! re-fetch, guarding against a flaky empty response ending the walk
//! early.
//!
//! Once a walk has completed, later runs switch to an incremental sync:
//! a date-windowed scan of the dataset head instead of a blind offset
//! continuation, because new records inserted at the source shift the
//! offsets of everything behind them.

mod types;

pub use types::{SyncReport, SyncStatus};

use crate::config::SyncConfig;
use crate::error::Result;
use crate::fetch::{PageFetcher, PageRequest, RetryPolicy};
use crate::progress::{ProgressState, ProgressStore, SkippedRange};
use crate::sink::RecordSink;
use crate::types::{record_date, validate_batch, SkipPolicy};
use chrono::{Duration as ChronoDuration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Drives a full or incremental synchronization run
pub struct SyncDriver<S> {
    fetcher: PageFetcher,
    retry: RetryPolicy,
    progress: ProgressStore,
    sink: S,
    config: SyncConfig,
    interrupted: Arc<AtomicBool>,
}

impl<S: RecordSink> SyncDriver<S> {
    /// Create a driver. Fails on an invalid base URL.
    pub fn new(config: SyncConfig, progress: ProgressStore, sink: S) -> Result<Self> {
        let fetcher = PageFetcher::new(&config)?;
        let retry = RetryPolicy::from_config(&config);
        Ok(Self {
            fetcher,
            retry,
            progress,
            sink,
            config,
            interrupted: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag checked at every page boundary; set it to stop after the
    /// in-flight page commits
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    /// The sink records are committed to
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Run a sync: resume or start a full walk, or refresh the tail
    /// incrementally if a previous walk already completed.
    pub async fn run(&self) -> Result<SyncReport> {
        match self.progress.load().await? {
            Some(state) if state.completed => self.run_incremental(state).await,
            Some(state) => {
                info!(
                    offset = state.next_offset,
                    total_fetched = state.total_fetched,
                    "Resuming interrupted walk"
                );
                self.run_full(state).await
            }
            None => self.run_full(ProgressState::new(self.config.page_size)).await,
        }
    }

    /// Walk the dataset from the state's offset to exhaustion
    pub async fn run_full(&self, mut state: ProgressState) -> Result<SyncReport> {
        let start = Instant::now();
        let mut pages_fetched = 0u32;
        let mut inserted = 0u64;
        let mut updated = 0u64;
        let mut empty_streak = 0u32;

        if state.page_size != self.config.page_size {
            // Offsets are multiples of the page size that produced them,
            // so a resumed walk keeps the persisted size
            warn!(
                persisted = state.page_size,
                configured = self.config.page_size,
                "Page size changed mid-walk, keeping the persisted value"
            );
        }

        info!(offset = state.next_offset, "Starting full sync");

        let status = loop {
            if self.interrupted.load(Ordering::SeqCst) {
                info!("Interrupted, stopping at page boundary");
                break SyncStatus::Aborted;
            }

            let request = PageRequest::new(state.next_offset, state.page_size)?;

            match self.retry.fetch_page(&self.fetcher, &request).await {
                Ok(records) => {
                    pages_fetched += 1;

                    if records.is_empty() {
                        empty_streak += 1;
                        if empty_streak >= 2 {
                            info!(
                                offset = state.next_offset,
                                total_fetched = state.total_fetched,
                                "Exhaustion confirmed"
                            );
                            state.mark_completed();
                            self.progress.save(&state).await?;
                            break if state.skipped.is_empty() {
                                SyncStatus::Completed
                            } else {
                                SyncStatus::PartialWithSkips
                            };
                        }
                        debug!(
                            offset = state.next_offset,
                            "Empty page, re-fetching to confirm exhaustion"
                        );
                        continue;
                    }
                    empty_streak = 0;

                    let count = records.len() as u64;
                    if records.len() < state.page_size as usize {
                        debug!(
                            offset = state.next_offset,
                            count, "Short page, likely the dataset tail"
                        );
                    }

                    let valid = validate_batch(records);
                    let stats = self.sink.upsert(&valid).await.map_err(|e| {
                        error!(
                            offset = state.next_offset,
                            "Commit failed, progress not advanced: {e}"
                        );
                        e
                    })?;
                    inserted += stats.inserted;
                    updated += stats.updated;

                    state.advance(count);
                    self.progress.save(&state).await?;

                    debug!(
                        offset = state.next_offset,
                        total_fetched = state.total_fetched,
                        "Page committed"
                    );
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    // Permanent page failure, or retries exhausted
                    match self.config.skip_policy {
                        SkipPolicy::Abort => {
                            error!(offset = state.next_offset, "Aborting on failed page: {err}");
                            break SyncStatus::Aborted;
                        }
                        SkipPolicy::Skip => {
                            warn!(
                                offset = state.next_offset,
                                "Skipping failed page and continuing: {err}"
                            );
                            state.record_skip(err.to_string());
                            self.progress.save(&state).await?;
                            // Exhaustion confirmation is per-offset
                            empty_streak = 0;
                        }
                    }
                }
            }
        };

        Ok(SyncReport {
            status,
            total_fetched: state.total_fetched,
            inserted,
            updated,
            pages_fetched,
            skipped: state.skipped.clone(),
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    /// Refresh the dataset tail: walk from offset 0 keeping only records
    /// dated within the lookback window, stopping once a whole page falls
    /// behind it.
    pub async fn run_incremental(&self, mut state: ProgressState) -> Result<SyncReport> {
        let start = Instant::now();
        let threshold = (Utc::now() - ChronoDuration::days(self.config.lookback_days))
            .format("%Y-%m-%d")
            .to_string();

        info!(
            lookback_days = self.config.lookback_days,
            threshold = %threshold,
            "Starting incremental sync"
        );

        let mut offset = 0u64;
        let mut pages_fetched = 0u32;
        let mut inserted = 0u64;
        let mut updated = 0u64;
        let mut scanned = 0u64;
        let mut skipped: Vec<SkippedRange> = Vec::new();

        let status = loop {
            if self.interrupted.load(Ordering::SeqCst) {
                info!("Interrupted, stopping at page boundary");
                break SyncStatus::Aborted;
            }

            if scanned >= self.config.incremental_scan_cap {
                warn!(
                    scanned,
                    cap = self.config.incremental_scan_cap,
                    "Incremental scan cap reached"
                );
                break SyncStatus::Completed;
            }

            let request = PageRequest::new(offset, self.config.page_size)?;
            let records = match self.retry.fetch_page(&self.fetcher, &request).await {
                Ok(records) => records,
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => match self.config.skip_policy {
                    SkipPolicy::Abort => {
                        error!(offset, "Aborting incremental sync on failed page: {err}");
                        break SyncStatus::Aborted;
                    }
                    SkipPolicy::Skip => {
                        warn!(offset, "Skipping failed page during incremental sync: {err}");
                        skipped.push(SkippedRange {
                            offset,
                            length: self.config.page_size,
                            reason: err.to_string(),
                        });
                        offset += u64::from(self.config.page_size);
                        // Count the skipped width so the scan cap still terminates
                        scanned += u64::from(self.config.page_size);
                        continue;
                    }
                },
            };

            pages_fetched += 1;

            if records.is_empty() {
                info!(offset, "No more records, tail scan complete");
                break SyncStatus::Completed;
            }

            scanned += records.len() as u64;
            if records.len() != self.config.page_size as usize {
                // Count drift mid-scan usually means inserts shifted the
                // offsets under us; the date window absorbs it
                debug!(
                    offset,
                    count = records.len(),
                    "Record count drift during incremental scan"
                );
            }

            let newest_in_page = records
                .iter()
                .filter_map(record_date)
                .max()
                .map(ToString::to_string);

            let recent: Vec<_> = records
                .into_iter()
                .filter(|r| record_date(r).is_some_and(|d| d >= threshold.as_str()))
                .collect();

            if !recent.is_empty() {
                let stats = self.sink.upsert(&validate_batch(recent)).await?;
                inserted += stats.inserted;
                updated += stats.updated;
            }

            if newest_in_page.is_some_and(|d| d < threshold) {
                info!(offset, "Reached records older than the window");
                break SyncStatus::Completed;
            }

            offset += u64::from(self.config.page_size);
        };

        let status = if status == SyncStatus::Completed && !skipped.is_empty() {
            SyncStatus::PartialWithSkips
        } else {
            status
        };

        if status != SyncStatus::Aborted {
            state.mark_incremental();
            self.progress.save(&state).await?;
        }

        info!(
            inserted,
            updated, pages_fetched, "Incremental sync finished"
        );

        Ok(SyncReport {
            status,
            total_fetched: state.total_fetched,
            inserted,
            updated,
            pages_fetched,
            skipped,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests;
