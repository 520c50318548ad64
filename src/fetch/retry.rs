//! Retry policy
//!
//! Bounded retries with exponential backoff around the page fetcher.
//! A page is attempted at most `1 + max_retries` times; the pacer inside
//! the fetcher keeps even back-to-back retries politely spaced.

use super::{PageFetcher, PageRequest};
use crate::config::SyncConfig;
use crate::error::Result;
use crate::types::Record;
use std::time::Duration;
use tracing::warn;

/// Retry configuration applied to every page fetch
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    /// Create a retry policy
    pub fn new(max_retries: u32, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
            max_backoff,
        }
    }

    /// Build a policy from the sync configuration
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(
            config.max_retries,
            config.initial_backoff(),
            config.max_backoff(),
        )
    }

    /// Maximum retry attempts after the initial request
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Backoff delay for a given attempt: `initial * 2^attempt`, capped
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        std::cmp::min(self.initial_backoff * factor, self.max_backoff)
    }

    /// Fetch a page, absorbing transient failures up to the retry bound.
    ///
    /// Non-retryable errors surface immediately; a transient error that
    /// survives all retries surfaces as-is for the driver's skip-or-abort
    /// decision.
    pub async fn fetch_page(
        &self,
        fetcher: &PageFetcher,
        request: &PageRequest,
    ) -> Result<Vec<Record>> {
        let mut attempt = 0;

        loop {
            match fetcher.fetch_page(request).await {
                Ok(records) => return Ok(records),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        offset = request.offset,
                        attempt = attempt + 1,
                        max_attempts = self.max_retries + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Transient failure, retrying: {err}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
