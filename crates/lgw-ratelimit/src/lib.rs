// SPDX-License-Identifier: MIT OR Apache-2.0
//! Token-bucket admission control, one bucket per vendor.
//!
//! A bucket is configured with `max_requests` per `window`; the refill
//! interval is `window / max_requests`.  [`TokenBucket::acquire`] suspends
//! cooperatively until a token is available and then consumes it, so at
//! steady state the aggregate issue rate never exceeds the configured cap.
//! Buckets are process-local; horizontal scaling multiplies the effective
//! rate.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use lgw_core::Provider;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

// ---------------------------------------------------------------------------
// TokenBucket
// ---------------------------------------------------------------------------

/// A token bucket that admits at most `max_requests` per `window`.
#[derive(Clone)]
pub struct TokenBucket {
    inner: Arc<Mutex<BucketInner>>,
    capacity: f64,
    refill_interval: Duration,
}

struct BucketInner {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a bucket admitting `max_requests` per `window`.
    ///
    /// The bucket starts full, so a cold process can issue an initial burst
    /// up to `max_requests` before throttling engages.
    pub fn new(max_requests: u32, window: Duration) -> Self {
        let max_requests = max_requests.max(1);
        Self {
            inner: Arc::new(Mutex::new(BucketInner {
                tokens: max_requests as f64,
                last_refill: Instant::now(),
            })),
            capacity: max_requests as f64,
            refill_interval: window / max_requests,
        }
    }

    /// Wait until a token is available, then consume it.
    ///
    /// Callers are serialized through the internal mutex only for the
    /// bookkeeping; the wait itself happens without the lock held.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut guard = self.inner.lock().await;
                self.refill(&mut guard);
                if guard.tokens >= 1.0 {
                    guard.tokens -= 1.0;
                    return;
                }
                // Time until the deficit for one token is refilled.
                let deficit = 1.0 - guard.tokens;
                self.refill_interval.mul_f64(deficit)
            };
            tokio::time::sleep(wait).await;
        }
    }

    /// Consume a token if one is available right now.
    pub async fn try_acquire(&self) -> bool {
        let mut guard = self.inner.lock().await;
        self.refill(&mut guard);
        if guard.tokens >= 1.0 {
            guard.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn refill(&self, inner: &mut BucketInner) {
        let now = Instant::now();
        let elapsed = now.duration_since(inner.last_refill);
        if elapsed.is_zero() {
            return;
        }
        let refilled = elapsed.as_secs_f64() / self.refill_interval.as_secs_f64();
        inner.tokens = (inner.tokens + refilled).min(self.capacity);
        inner.last_refill = now;
    }
}

// ---------------------------------------------------------------------------
// RateLimiterRegistry
// ---------------------------------------------------------------------------

/// Per-vendor request budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Requests admitted per window.
    pub max_requests: u32,
    /// Window length in milliseconds.
    pub window_ms: u64,
}

impl RateLimit {
    /// Conservative default budget for a vendor.
    pub fn default_for(provider: Provider) -> Self {
        match provider {
            Provider::Fortnox => Self {
                max_requests: 4,
                window_ms: 1_000,
            },
            Provider::Visma => Self {
                max_requests: 5,
                window_ms: 1_000,
            },
            Provider::Briox => Self {
                max_requests: 3,
                window_ms: 1_000,
            },
            Provider::Bokio => Self {
                max_requests: 5,
                window_ms: 1_000,
            },
            Provider::Bjornlunden => Self {
                max_requests: 2,
                window_ms: 1_000,
            },
            // No outbound calls for uploaded-SIE consents.
            Provider::SieUpload => Self {
                max_requests: 100,
                window_ms: 1_000,
            },
        }
    }
}

/// Process-wide set of per-vendor buckets.
///
/// Built once at startup and shared read-only; the buckets themselves are
/// internally synchronized.
pub struct RateLimiterRegistry {
    buckets: HashMap<Provider, TokenBucket>,
}

impl RateLimiterRegistry {
    /// Build a registry with the default budget per vendor.
    pub fn with_defaults() -> Self {
        Self::new(|p| RateLimit::default_for(p))
    }

    /// Build a registry from a budget function (configuration hook).
    pub fn new(budget: impl Fn(Provider) -> RateLimit) -> Self {
        let mut buckets = HashMap::new();
        for provider in Provider::ALL {
            let limit = budget(*provider);
            buckets.insert(
                *provider,
                TokenBucket::new(limit.max_requests, Duration::from_millis(limit.window_ms)),
            );
        }
        Self { buckets }
    }

    /// The bucket for `provider`.
    pub fn bucket(&self, provider: Provider) -> &TokenBucket {
        // Every provider is inserted in `new`; the map is total.
        &self.buckets[&provider]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initial_burst_up_to_capacity() {
        let bucket = TokenBucket::new(3, Duration::from_secs(60));
        assert!(bucket.try_acquire().await);
        assert!(bucket.try_acquire().await);
        assert!(bucket.try_acquire().await);
        assert!(!bucket.try_acquire().await);
    }

    #[tokio::test]
    async fn acquire_waits_for_refill() {
        let bucket = TokenBucket::new(2, Duration::from_millis(100));
        bucket.acquire().await;
        bucket.acquire().await;
        let start = Instant::now();
        // Third token needs one refill interval (50 ms).
        bucket.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn steady_state_rate_is_bounded() {
        let bucket = TokenBucket::new(5, Duration::from_millis(50));
        // Drain the initial burst.
        for _ in 0..5 {
            bucket.acquire().await;
        }
        let start = Instant::now();
        for _ in 0..5 {
            bucket.acquire().await;
        }
        // Five more tokens need ~one full window.
        assert!(start.elapsed() >= Duration::from_millis(40));
    }

    #[tokio::test]
    async fn concurrent_acquires_all_complete() {
        let bucket = TokenBucket::new(4, Duration::from_millis(20));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let b = bucket.clone();
            handles.push(tokio::spawn(async move { b.acquire().await }));
        }
        for h in handles {
            h.await.unwrap();
        }
    }

    #[tokio::test]
    async fn registry_is_total_over_providers() {
        let registry = RateLimiterRegistry::with_defaults();
        for p in Provider::ALL {
            assert!(registry.bucket(*p).try_acquire().await);
        }
    }

    #[test]
    fn default_budgets_are_positive() {
        for p in Provider::ALL {
            let limit = RateLimit::default_for(*p);
            assert!(limit.max_requests > 0);
            assert!(limit.window_ms > 0);
        }
    }
}
