//! Fixed-window / token-bucket limiters (§4.2, §5, §6 "Rate limiting").
//!
//! A thin wrapper over `governor` keyed by an arbitrary `String` (client id
//! for the HTTP limiter, process-wide for the step worker's token bucket).

use std::num::NonZeroU32;
use std::sync::Arc;

use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter as GovernorLimiter};

pub struct KeyedRateLimiter {
    inner: GovernorLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>,
}

impl KeyedRateLimiter {
    /// `per_minute` requests per key, per §6's default of 100 req/min.
    pub fn per_minute(per_minute: u32) -> Arc<Self> {
        let quota = Quota::per_minute(NonZeroU32::new(per_minute.max(1)).unwrap());
        Arc::new(Self {
            inner: GovernorLimiter::keyed(quota),
        })
    }

    pub fn check(&self, key: &str) -> bool {
        self.inner.check_key(&key.to_string()).is_ok()
    }
}

/// Process-wide token bucket for the step worker (§4.2 default 50 steps/s).
pub struct TokenBucket {
    inner: GovernorLimiter<
        governor::state::direct::NotKeyed,
        governor::state::InMemoryState,
        DefaultClock,
    >,
}

impl TokenBucket {
    pub fn per_second(rate: u32) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(rate.max(1)).unwrap());
        Self {
            inner: GovernorLimiter::direct(quota),
        }
    }

    /// Waits until a slot is available, smoothing bursts rather than
    /// rejecting; the step worker is an internal consumer, not a client
    /// facing the RATE_LIMIT error code.
    pub async fn acquire(&self) {
        self.inner.until_ready().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyed_limiter_rejects_after_budget_exhausted() {
        let limiter = KeyedRateLimiter::per_minute(1);
        assert!(limiter.check("client-a"));
        assert!(!limiter.check("client-a"));
        // a different key has its own budget
        assert!(limiter.check("client-b"));
    }

    #[tokio::test]
    async fn token_bucket_allows_configured_rate() {
        let bucket = TokenBucket::per_second(1000);
        bucket.acquire().await;
        bucket.acquire().await;
    }
}
