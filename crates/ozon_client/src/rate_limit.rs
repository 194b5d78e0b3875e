//! Client-side rate limiter for the Ozon Seller API.
//!
//! Seller API methods are throttled per client id; staying well below the
//! documented limit avoids 429s when a report and a poll run back to back.

use governor::{Quota, RateLimiter as GovLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

type DirectLimiter = GovLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Single-bucket limiter shared by all clones of a client.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    limiter: Arc<DirectLimiter>,
}

impl RateLimiter {
    /// Default budget: 10 requests per second.
    pub fn new() -> Self {
        Self::with_limit(10)
    }

    /// Create with a custom per-second limit. Zero is treated as one.
    pub fn with_limit(requests_per_sec: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(requests_per_sec).unwrap_or(NonZeroU32::MIN));
        Self {
            limiter: Arc::new(GovLimiter::direct(quota)),
        }
    }

    /// Wait until a request slot is available.
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }

    /// Try to acquire a slot without waiting.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_is_bounded() {
        let limiter = RateLimiter::with_limit(2);
        assert!(limiter.try_acquire());
        assert!(limiter.try_acquire());
        assert!(!limiter.try_acquire(), "third request in the same second should wait");
    }

    #[test]
    fn test_zero_limit_still_allows_one() {
        let limiter = RateLimiter::with_limit(0);
        assert!(limiter.try_acquire());
    }
}
