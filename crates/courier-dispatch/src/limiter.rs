//! Per-process token bucket shaping outbound provider traffic.
//!
//! Cluster-wide rate limiting is an emergent property: per-pod rate ×
//! pod count. The bucket starts full so a fresh pod can burst up to
//! `burst` sends immediately.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Token bucket parameters.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Sustained refill rate.
    pub requests_per_second: f64,
    /// Bucket capacity.
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 5.0,
            burst: 10,
        }
    }
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Async token bucket with a bounded acquire.
#[derive(Debug)]
pub struct TokenBucket {
    config: RateLimitConfig,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a bucket, initially full.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: f64::from(config.burst),
                last_refill: Instant::now(),
            }),
            config,
        }
    }

    /// Take a token immediately if one is available.
    pub async fn try_acquire(&self) -> bool {
        let mut state = self.state.lock().await;
        refill(&mut state, &self.config);

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Acquire a token, waiting at most `timeout` for one to refill.
    ///
    /// Returns `false` without sleeping when the required wait exceeds the
    /// timeout. On success the token is reserved before the sleep, so
    /// concurrent acquirers cannot hand out the same allowance twice.
    pub async fn acquire(&self, timeout: Duration) -> bool {
        let wait = {
            let mut state = self.state.lock().await;
            refill(&mut state, &self.config);

            if state.tokens >= 1.0 {
                state.tokens -= 1.0;
                return true;
            }

            let deficit = 1.0 - state.tokens;
            let wait = Duration::from_secs_f64(deficit / self.config.requests_per_second);
            if wait > timeout {
                return false;
            }

            // Reserve now; tokens may go negative until refill catches up.
            state.tokens -= 1.0;
            wait
        };

        tokio::time::sleep(wait).await;
        true
    }
}

fn refill(state: &mut BucketState, config: &RateLimitConfig) {
    let now = Instant::now();
    let elapsed = now.duration_since(state.last_refill);
    let refilled = elapsed.as_secs_f64() * config.requests_per_second;

    state.tokens = (state.tokens + refilled).min(f64::from(config.burst));
    state.last_refill = now;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bucket_starts_full() {
        let bucket = TokenBucket::new(RateLimitConfig {
            requests_per_second: 10.0,
            burst: 5,
        });

        for _ in 0..5 {
            assert!(bucket.try_acquire().await);
        }
        assert!(!bucket.try_acquire().await);
    }

    #[tokio::test]
    async fn test_acquire_waits_for_refill() {
        let bucket = TokenBucket::new(RateLimitConfig {
            requests_per_second: 100.0,
            burst: 1,
        });

        assert!(bucket.acquire(Duration::from_secs(1)).await);
        // Second acquire needs ~10ms of refill; well inside the timeout.
        let started = Instant::now();
        assert!(bucket.acquire(Duration::from_secs(1)).await);
        assert!(started.elapsed() >= Duration::from_millis(5));
    }

    #[tokio::test]
    async fn test_acquire_fails_fast_when_wait_exceeds_timeout() {
        let bucket = TokenBucket::new(RateLimitConfig {
            requests_per_second: 0.1, // 10s per token
            burst: 1,
        });

        assert!(bucket.try_acquire().await);

        let started = Instant::now();
        assert!(!bucket.acquire(Duration::from_millis(50)).await);
        // Fails fast rather than sleeping out the timeout.
        assert!(started.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_refills_over_time() {
        let bucket = TokenBucket::new(RateLimitConfig {
            requests_per_second: 1000.0,
            burst: 1,
        });

        assert!(bucket.try_acquire().await);
        assert!(!bucket.try_acquire().await);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(bucket.try_acquire().await);
    }
}
