//! Request pacing
//!
//! Enforces the mandatory minimum delay between any two API requests,
//! built on the governor crate's token bucket with a burst of one.

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Spaces requests at least `min_interval` apart, across successes,
/// failures, and retries alike.
#[derive(Clone)]
pub struct RequestPacer {
    limiter: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
}

impl RequestPacer {
    /// Create a pacer with the given minimum inter-request interval.
    ///
    /// Intervals below one millisecond collapse to one millisecond; a
    /// zero-period quota is not representable.
    pub fn new(min_interval: Duration) -> Self {
        let interval = min_interval.max(Duration::from_millis(1));
        let quota = Quota::with_period(interval)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::new(1000).unwrap()))
            .allow_burst(NonZeroU32::new(1).unwrap());

        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Wait until the next request is allowed
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }

    /// Check whether a request would be allowed right now
    pub fn check(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl std::fmt::Debug for RequestPacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPacer").finish()
    }
}
