//! Bounded exponential-backoff retry.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Default number of attempts (first try included).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
/// Default multiplier applied to the delay after every retry.
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Errors that can tell the retry loop to give up early.
pub trait Retryable {
    /// `true` when retrying cannot help (e.g. upstream rate limiting).
    fn is_abort(&self) -> bool;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, backoff_factor: f64) -> Self {
        Self {
            max_attempts,
            base_delay,
            backoff_factor,
        }
    }

    /// Delay slept after the failure of attempt `retry_index` (0-based).
    pub fn delay_for(&self, retry_index: u32) -> Duration {
        let exponent = i32::try_from(retry_index).unwrap_or(i32::MAX);
        let secs = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }

    /// Run `operation` until it succeeds, aborts, or runs out of attempts.
    ///
    /// `operation` is called at most `max_attempts` times (at least once).
    /// An error whose [`Retryable::is_abort`] is true is returned straight
    /// away; otherwise the last error is returned once attempts run out.
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if err.is_abort() {
                warn!(attempt, error = %err, "not retrying");
                return Err(err);
            }
            if attempt >= max_attempts {
                warn!(attempts = attempt, error = %err, "giving up after final attempt");
                return Err(err);
            }

            let delay = self.delay_for(attempt - 1);
            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Flaky(u32),
        Abort,
    }

    impl Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    impl Retryable for TestError {
        fn is_abort(&self) -> bool {
            matches!(self, TestError::Abort)
        }
    }

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(100), 2.0)
    }

    #[test]
    fn delays_grow_exponentially() {
        let policy = fast_policy(5);
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    }

    #[test]
    fn default_matches_documented_values() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.backoff_factor, 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn retryable_failure_uses_every_attempt() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = fast_policy(3)
            .execute(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(TestError::Flaky(n))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result, Err(TestError::Flaky(3)), "last error surfaces");
    }

    #[tokio::test(start_paused = true)]
    async fn abort_on_first_attempt_stops_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = fast_policy(3)
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Abort)
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result, Err(TestError::Abort));
    }

    #[tokio::test(start_paused = true)]
    async fn abort_on_later_attempt_halts_remaining() {
        let calls = AtomicU32::new(0);
        let result: Result<(), TestError> = fast_policy(5)
            .execute(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n == 2 {
                    Err(TestError::Abort)
                } else {
                    Err(TestError::Flaky(n))
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(result, Err(TestError::Abort));
    }

    #[tokio::test(start_paused = true)]
    async fn success_after_transient_failure() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let result = fast_policy(3)
            .execute(|| async {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 3 {
                    Err(TestError::Flaky(n))
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100ms + 200ms of backoff
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(300) && elapsed < Duration::from_millis(400));
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempts_still_tries_once() {
        let calls = AtomicU32::new(0);
        let _: Result<(), TestError> = fast_policy(0)
            .execute(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError::Flaky(1))
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
