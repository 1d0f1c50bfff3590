//! Retry executor for upstream calls.
//!
//! A logical call is admitted once by the [`RateLimiter`], then attempted up
//! to `max_attempts` times. Each attempt races a timeout that grows with the
//! attempt index; failed attempts back off exponentially with uniform jitter,
//! plus a fixed cooldown when upstream signalled overload (502/503/504).

use rand::Rng;
use std::future::Future;
use std::time::Duration;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::services::rate_limit::RateLimiter;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_timeout: Duration,
    /// Added to the timeout for every previous attempt.
    pub timeout_step: Duration,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    pub max_jitter: Duration,
    pub overload_cooldown: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_timeout: Duration::from_millis(10_000),
            timeout_step: Duration::from_millis(2_000),
            backoff_base: Duration::from_millis(1_000),
            backoff_cap: Duration::from_millis(10_000),
            max_jitter: Duration::from_millis(1_000),
            overload_cooldown: Duration::from_millis(2_000),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.retry_max_attempts.max(1),
            base_timeout: Duration::from_millis(config.retry_base_timeout_ms),
            ..Self::default()
        }
    }

    /// Timeout for the 0-indexed `attempt`.
    #[must_use]
    pub fn attempt_timeout(&self, attempt: u32) -> Duration {
        self.base_timeout + self.timeout_step * attempt
    }

    /// `min(base * 2^attempt + jitter, cap)`.
    #[must_use]
    pub fn backoff(&self, attempt: u32, jitter: Duration) -> Duration {
        let exp = self
            .backoff_base
            .saturating_mul(2u32.saturating_pow(attempt));
        (exp + jitter).min(self.backoff_cap)
    }

    fn random_jitter(&self) -> Duration {
        let max_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        Duration::from_millis(rand::rng().random_range(0..=max_ms))
    }
}

/// Run `operation` under admission control and the retry policy.
///
/// # Errors
///
/// `AppError::RateLimited` without invoking `operation` if `endpoint` is over
/// its ceiling; otherwise the error of the last attempt (`AppError::Timeout`
/// when it did not finish in time).
pub async fn with_retry<T, F, Fut>(
    limiter: &RateLimiter,
    endpoint: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    if !limiter.try_acquire(endpoint) {
        tracing::warn!(endpoint, "Upstream rate limit reached");
        return Err(AppError::RateLimited);
    }

    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        let timeout = policy.attempt_timeout(attempt);
        // A timed-out attempt is dropped; its result is never observed.
        let outcome = match tokio::time::timeout(timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(AppError::Timeout),
        };

        let error = match outcome {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if attempt + 1 >= max_attempts {
            tracing::error!(
                endpoint,
                attempts = max_attempts,
                error = %error,
                "Upstream call failed after max attempts"
            );
            return Err(error);
        }

        let backoff = policy.backoff(attempt, policy.random_jitter());
        tracing::warn!(
            endpoint,
            attempt = attempt + 1,
            max_attempts,
            backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
            error = %error,
            "Upstream call failed, retrying"
        );
        tokio::time::sleep(backoff).await;

        if error.is_overloaded() {
            tokio::time::sleep(policy.overload_cooldown).await;
        }

        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn limiter() -> RateLimiter {
        RateLimiter::new(Duration::from_secs(60), HashMap::new())
    }

    #[test]
    fn backoff_stays_within_jitter_band() {
        let policy = RetryPolicy::default();
        for attempt in 0..3 {
            let floor = Duration::from_millis(1000 * 2u64.pow(attempt));
            for _ in 0..50 {
                let delay = policy.backoff(attempt, policy.random_jitter());
                assert!(delay >= floor, "attempt {attempt}: {delay:?} < {floor:?}");
                assert!(delay <= floor + Duration::from_millis(1000));
            }
        }
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.backoff(4, Duration::from_millis(999)),
            Duration::from_millis(10_000)
        );
        assert_eq!(policy.backoff(40, Duration::ZERO), Duration::from_millis(10_000));
    }

    #[test]
    fn attempt_timeout_grows_linearly() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.attempt_timeout(0), Duration::from_secs(10));
        assert_eq!(policy.attempt_timeout(2), Duration::from_secs(14));
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_operation_runs_max_attempts_then_errors() {
        let calls = AtomicU32::new(0);
        let result: AppResult<()> = with_retry(&limiter(), "/x", &RetryPolicy::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::Upstream("down".into())) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(matches!(result, Err(AppError::Upstream(msg)) if msg == "down"));
    }

    #[tokio::test(start_paused = true)]
    async fn success_stops_retrying() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&limiter(), "/x", &RetryPolicy::default(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(AppError::Upstream("flaky".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn later_attempts_get_longer_timeouts() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&limiter(), "/x", &RetryPolicy::default(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_secs(11)).await;
                Ok("slow but fine")
            }
        })
        .await;

        // 11s exceeds the first 10s budget but fits the second 12s one.
        assert_eq!(result.unwrap(), "slow but fine");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_reported_after_last_attempt() {
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        let result: AppResult<()> = with_retry(&limiter(), "/x", &policy, || async {
            std::future::pending::<AppResult<()>>().await
        })
        .await;

        assert!(matches!(result, Err(AppError::Timeout)));
    }

    #[tokio::test(start_paused = true)]
    async fn overload_adds_cooldown() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let result = with_retry(&limiter(), "/x", &RetryPolicy::default(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(AppError::UpstreamStatus {
                        status: StatusCode::SERVICE_UNAVAILABLE,
                        body: String::new(),
                    })
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        let waited = start.elapsed();
        assert!(waited >= Duration::from_millis(3_000), "{waited:?}");
        assert!(waited <= Duration::from_millis(4_000), "{waited:?}");
    }

    #[tokio::test]
    async fn rejected_call_never_runs_and_counts_once_per_call() {
        let limiter = RateLimiter::new(
            Duration::from_secs(60),
            HashMap::from([("/x".to_string(), 1)]),
        );
        let policy = RetryPolicy {
            max_attempts: 3,
            backoff_base: Duration::ZERO,
            max_jitter: Duration::ZERO,
            ..RetryPolicy::default()
        };

        let calls = AtomicU32::new(0);
        let first: AppResult<()> = with_retry(&limiter, "/x", &policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::Upstream("down".into())) }
        })
        .await;
        assert!(first.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let second: AppResult<()> = with_retry(&limiter, "/x", &policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        })
        .await;
        assert!(matches!(second, Err(AppError::RateLimited)));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
