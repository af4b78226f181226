use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::DirectoryError;

/// Bounded retry policy for directory calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first (default: 2).
    pub attempts: u32,
    /// Delay before the second attempt (default: 1s).
    pub delay: Duration,
    /// Each attempt is abandoned after this long (default: 5s).
    pub attempt_timeout: Duration,
    /// Multiplier applied to `delay` after every failed attempt.
    /// 1 keeps the delay fixed (default: 1).
    pub backoff_factor: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            delay: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(5),
            backoff_factor: 1,
        }
    }
}

impl RetryPolicy {
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_backoff_factor(mut self, factor: u32) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = self
            .backoff_factor
            .max(1)
            .saturating_pow(attempt.saturating_sub(1));
        self.delay.saturating_mul(factor)
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up.
///
/// Every attempt is bounded by `attempt_timeout`. `op` receives the
/// 1-based attempt number. Exhausting all attempts yields
/// [`DirectoryError::Exhausted`] carrying the last failure.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, what: &str, mut op: F) -> Result<T, DirectoryError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, DirectoryError>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        let result = match tokio::time::timeout(policy.attempt_timeout, op(attempt)).await {
            Ok(r) => r,
            Err(_) => Err(DirectoryError::Timeout(policy.attempt_timeout)),
        };

        match result {
            Ok(v) => {
                if attempt > 1 {
                    debug!(what, attempt, "succeeded after retry");
                }
                return Ok(v);
            }
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) if attempt >= attempts => {
                return Err(DirectoryError::Exhausted {
                    attempts,
                    last: Box::new(e),
                });
            }
            Err(e) => {
                let delay = policy.delay_after(attempt);
                warn!(what, attempt, attempts, error = %e, "attempt failed, retrying in {delay:?}");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
