// SPDX-License-Identifier: MIT OR Apache-2.0
//! Bounded retry driver for outbound vendor calls.
//!
//! Wraps a zero-argument fallible async operation.  Attempt count starts at
//! 1; on failure the caller-provided classifier decides whether to retry.
//! The delay grows linearly from `initial_delay` and is capped at
//! `max_delay`, so a slow vendor cannot stretch a request unboundedly.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::future::Future;
use std::time::Duration;
use tracing::debug;

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Bounds for the retry driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first (must be at least 1).
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Ceiling for the growing delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt after `attempt` failed (1-based).
    ///
    /// Linear growth from `initial_delay`, capped at `max_delay`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let grown = self.initial_delay.saturating_mul(attempt.max(1));
        grown.min(self.max_delay)
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Run `op` under `policy`, consulting `should_retry` after each failure.
///
/// Returns the first success, or the last error once attempts are exhausted
/// or the classifier declines.
pub async fn retry_with_policy<T, E, Fut>(
    policy: RetryPolicy,
    mut should_retry: impl FnMut(&E) -> bool,
    mut op: impl FnMut() -> Fut,
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= max_attempts || !should_retry(&err) {
                    return Err(err);
                }
                let delay = policy.delay_after(attempt);
                debug!(attempt, delay_ms = delay.as_millis() as u64, error = %err, "retrying");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP classification
// ---------------------------------------------------------------------------

/// The retryability classification every vendor client uses.
///
/// Retry on 429 and 5xx.  Never retry 401, 403, or 404 — those are stable
/// answers, and retrying an expired token would only burn the vendor budget.
/// `None` (no status: connect/timeout-level transport failure) is retryable.
pub fn http_should_retry(status: Option<u16>) -> bool {
    match status {
        None => true,
        Some(429) => true,
        Some(s) if (500..=599).contains(&s) => true,
        Some(_) => false,
    }
}
