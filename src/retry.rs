//! Retry policy, delay calculation, and the shared retry executor.
//!
//! A [`RetryPolicy`] belongs to one adapter (or acts as the process-wide
//! default). The [`RetryLayer`] runs an outbound call under a policy and
//! keeps process-wide counters that survive across adapters.
//!
//! Classification is policy-driven: an error is retried when its transport
//! code or upstream status is in the policy's retryable sets, or when it
//! reads as a timeout. Everything else is returned after the first attempt.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::telemetry;
use crate::{BifrostError, Result};

/// Status codes retried by default.
pub const DEFAULT_RETRYABLE_STATUS_CODES: [u16; 6] = [408, 429, 500, 502, 503, 504];

/// Transport error codes retried by default.
pub const DEFAULT_RETRYABLE_ERROR_CODES: [&str; 6] = [
    "ECONNRESET",
    "ECONNREFUSED",
    "ENOTFOUND",
    "ETIMEDOUT",
    "ECONNABORTED",
    "ENETUNREACH",
];

/// Maps a 1-indexed retry count to the wait before that retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// Always `base_delay`.
    Fixed,
    /// `base_delay * retry_count`.
    Linear,
    /// `base_delay * 2^(retry_count - 1)`.
    #[default]
    Exponential,
}

/// Retry behaviour for one adapter.
///
/// ```rust
/// # use bifrost::retry::{BackoffStrategy, RetryPolicy};
/// # use std::time::Duration;
/// let policy = RetryPolicy::new()
///     .max_retries(2)
///     .base_delay(Duration::from_millis(200))
///     .backoff(BackoffStrategy::Linear);
/// assert_eq!(policy.max_retries, 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// When false every call gets exactly one attempt. Default: true.
    pub enabled: bool,
    /// Retries after the initial attempt. Default: 3.
    pub max_retries: u32,
    /// Base delay fed to the backoff strategy. Default: 1s.
    pub base_delay: Duration,
    /// Default: exponential.
    pub backoff: BackoffStrategy,
    /// Upper bound on any single delay, jitter included. Default: 10s.
    pub max_delay: Duration,
    pub retryable_status_codes: BTreeSet<u16>,
    pub retryable_error_codes: BTreeSet<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            backoff: BackoffStrategy::Exponential,
            max_delay: Duration::from_millis(10_000),
            retryable_status_codes: DEFAULT_RETRYABLE_STATUS_CODES.into_iter().collect(),
            retryable_error_codes: DEFAULT_RETRYABLE_ERROR_CODES
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with the default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy that never retries.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = n;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff = strategy;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn retryable_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.retryable_status_codes = codes.into_iter().collect();
        self
    }

    pub fn retryable_error_codes<S: Into<String>>(
        mut self,
        codes: impl IntoIterator<Item = S>,
    ) -> Self {
        self.retryable_error_codes = codes.into_iter().map(Into::into).collect();
        self
    }

    /// Delay before retry `retry_count` (1-indexed) without jitter or cap.
    pub fn base_delay_for(&self, retry_count: u32) -> Duration {
        let retry_count = retry_count.max(1);
        match self.backoff {
            BackoffStrategy::Fixed => self.base_delay,
            BackoffStrategy::Linear => self.base_delay.saturating_mul(retry_count),
            BackoffStrategy::Exponential => self
                .base_delay
                .saturating_mul(2u32.saturating_pow(retry_count - 1)),
        }
    }

    /// Full delay before retry `retry_count`: backoff, plus up to 10% jitter,
    /// capped at `max_delay`.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let delay = self.base_delay_for(retry_count);
        let jitter = delay.mul_f64(fastrand::f64() * 0.1);
        delay.saturating_add(jitter).min(self.max_delay)
    }

    /// Whether `err` is transient under this policy.
    pub fn is_retryable(&self, err: &BifrostError) -> bool {
        if !self.enabled {
            return false;
        }
        if err
            .code()
            .is_some_and(|code| self.retryable_error_codes.contains(code))
        {
            return true;
        }
        if matches!(err, BifrostError::Upstream { .. })
            && err
                .status()
                .is_some_and(|status| self.retryable_status_codes.contains(&status))
        {
            return true;
        }
        err.is_timeout()
    }
}

/// Snapshot of the retry counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub retry_attempts: u64,
    pub retry_successes: u64,
    pub retry_failures: u64,
    pub average_retries_per_request: f64,
    pub success_rate: f64,
}

#[derive(Debug, Default)]
struct RetryCounters {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    failed_requests: AtomicU64,
    retry_attempts: AtomicU64,
    retry_successes: AtomicU64,
    retry_failures: AtomicU64,
}

/// Runs outbound calls under a [`RetryPolicy`] and counts the outcomes.
///
/// One instance is shared by every adapter in a gateway; counters are
/// atomics so concurrent calls never lose an increment.
#[derive(Debug, Default)]
pub struct RetryLayer {
    counters: RetryCounters,
}

impl RetryLayer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Execute `f` with retries on transient errors.
    ///
    /// The first attempt runs immediately. A retryable failure sleeps for
    /// [`RetryPolicy::delay_for`] and tries again, up to `max_retries`
    /// times. Terminal errors and the last error after exhaustion are
    /// returned as-is; only the latter counts as a retry failure.
    ///
    /// Dropping the returned future cancels the in-flight attempt and all
    /// remaining retries; the request is then not counted.
    pub async fn execute<F, Fut, T>(&self, policy: &RetryPolicy, adapter: &str, f: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut retries = 0u32;
        loop {
            match f().await {
                Ok(value) => {
                    self.record_success(retries);
                    return Ok(value);
                }
                Err(e) if retries < policy.max_retries && policy.is_retryable(&e) => {
                    retries += 1;
                    self.counters.retry_attempts.fetch_add(1, Ordering::Relaxed);
                    metrics::counter!(telemetry::RETRIES_TOTAL, "adapter" => adapter.to_owned())
                        .increment(1);
                    let delay = policy.delay_for(retries);
                    warn!(
                        adapter,
                        attempt = retries,
                        max_retries = policy.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    let exhausted = retries > 0 && policy.is_retryable(&e);
                    if exhausted {
                        error!(
                            adapter,
                            retries,
                            error = %e,
                            "giving up after retries"
                        );
                    }
                    self.record_failure(exhausted);
                    return Err(e);
                }
            }
        }
    }

    fn record_success(&self, retries: u32) {
        self.counters.total_requests.fetch_add(1, Ordering::Relaxed);
        self.counters
            .successful_requests
            .fetch_add(1, Ordering::Relaxed);
        if retries > 0 {
            self.counters.retry_successes.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_failure(&self, exhausted: bool) {
        self.counters.total_requests.fetch_add(1, Ordering::Relaxed);
        self.counters.failed_requests.fetch_add(1, Ordering::Relaxed);
        if exhausted {
            self.counters.retry_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Current counters with derived rates rounded to two decimals.
    pub fn stats(&self) -> RetryStats {
        let c = &self.counters;
        let total_requests = c.total_requests.load(Ordering::Relaxed);
        let successful_requests = c.successful_requests.load(Ordering::Relaxed);
        let retry_attempts = c.retry_attempts.load(Ordering::Relaxed);
        let (average, success_rate) = if total_requests > 0 {
            (
                retry_attempts as f64 / total_requests as f64,
                successful_requests as f64 / total_requests as f64 * 100.0,
            )
        } else {
            (0.0, 0.0)
        };

        RetryStats {
            total_requests,
            successful_requests,
            failed_requests: c.failed_requests.load(Ordering::Relaxed),
            retry_attempts,
            retry_successes: c.retry_successes.load(Ordering::Relaxed),
            retry_failures: c.retry_failures.load(Ordering::Relaxed),
            average_retries_per_request: round2(average),
            success_rate: round2(success_rate),
        }
    }

    /// Zero every counter.
    pub fn reset_stats(&self) {
        let c = &self.counters;
        for counter in [
            &c.total_requests,
            &c.successful_requests,
            &c.failed_requests,
            &c.retry_attempts,
            &c.retry_successes,
            &c.retry_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        tracing::info!("retry statistics reset");
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream(status: u16) -> BifrostError {
        BifrostError::Upstream {
            status,
            message: format!("status {status}"),
            body: None,
        }
    }

    fn transport(code: &str) -> BifrostError {
        BifrostError::Transport {
            code: code.into(),
            message: "socket hang up".into(),
        }
    }

    #[test]
    fn fixed_delay_is_constant() {
        let policy = RetryPolicy::new()
            .backoff(BackoffStrategy::Fixed)
            .base_delay(Duration::from_millis(100));
        assert_eq!(policy.base_delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.base_delay_for(4), Duration::from_millis(100));
    }

    #[test]
    fn linear_delay_scales_with_count() {
        let policy = RetryPolicy::new()
            .backoff(BackoffStrategy::Linear)
            .base_delay(Duration::from_millis(100));
        assert_eq!(policy.base_delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.base_delay_for(3), Duration::from_millis(300));
    }

    #[test]
    fn exponential_delay_strictly_increases() {
        let policy = RetryPolicy::new().base_delay(Duration::from_millis(100));
        let d1 = policy.base_delay_for(1);
        let d2 = policy.base_delay_for(2);
        let d3 = policy.base_delay_for(3);
        assert_eq!(d1, Duration::from_millis(100));
        assert!(d3 > d2 && d2 > d1);
    }

    #[test]
    fn jittered_delay_stays_within_bounds() {
        let policy = RetryPolicy::new()
            .base_delay(Duration::from_millis(100))
            .max_delay(Duration::from_millis(350));
        for _ in 0..100 {
            let d1 = policy.delay_for(1);
            assert!(d1 >= Duration::from_millis(100));
            assert!(d1 <= Duration::from_millis(110));
            // 400ms pre-jitter is over the cap
            assert_eq!(policy.delay_for(3), Duration::from_millis(350));
        }
    }

    #[test]
    fn huge_retry_counts_saturate() {
        let policy = RetryPolicy::new().max_delay(Duration::from_secs(10));
        assert_eq!(policy.delay_for(200), Duration::from_secs(10));
    }

    #[test]
    fn classification_follows_policy_sets() {
        let policy = RetryPolicy::new();
        assert!(policy.is_retryable(&upstream(500)));
        assert!(policy.is_retryable(&upstream(429)));
        assert!(!policy.is_retryable(&upstream(404)));
        assert!(policy.is_retryable(&transport("ECONNRESET")));
        assert!(!policy.is_retryable(&BifrostError::AdapterNotFound("x".into())));
    }

    #[test]
    fn timeout_message_is_retryable() {
        let policy = RetryPolicy::new().retryable_error_codes(Vec::<String>::new());
        let err = BifrostError::Transport {
            code: "EUNKNOWN".into(),
            message: "operation timeout".into(),
        };
        assert!(policy.is_retryable(&err));
    }

    #[test]
    fn disabled_policy_never_retries() {
        let policy = RetryPolicy::disabled();
        assert!(!policy.is_retryable(&upstream(503)));
        assert!(!policy.is_retryable(&transport("ECONNRESET")));
    }

    #[test]
    fn round2_rounds_half_up() {
        assert_eq!(round2(66.666_666), 66.67);
        assert_eq!(round2(0.0), 0.0);
    }
}
