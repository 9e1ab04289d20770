//! Shared retry helper: bounded exponential backoff for transient failures.
//!
//! Callers classify their own errors; validation and not-found conditions
//! must report as non-transient so they fail on the first attempt.

use std::future::Future;
use std::time::Duration;

use log::debug;

/// Retry policy: decides how many attempts to make and how long to back off
/// between them.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Backoff multiplier for exponential backoff.
    pub multiplier: f64,
    /// Total attempts, including the first one.
    pub max_attempts: u32,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, multiplier: f64, max_attempts: u32) -> Self {
        Self {
            base_delay,
            multiplier,
            max_attempts,
        }
    }

    /// Delay to wait after the given 1-indexed failed attempt:
    /// `base_delay * multiplier^(attempt - 1)`.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let base_secs = self.base_delay.as_secs_f64();
        let delay_secs = base_secs * self.multiplier.powi(attempt.saturating_sub(1) as i32);
        Duration::from_secs_f64(delay_secs)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            multiplier: 2.0,
            max_attempts: 5,
        }
    }
}

/// Run `op` until it succeeds, the error is non-transient, or the attempt
/// budget is exhausted. The classification of "transient" belongs to the
/// caller via `is_transient`.
pub async fn with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    is_transient: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts && is_transient(&err) => {
                let delay = policy.next_delay(attempt);
                debug!(
                    "Attempt {} failed ({}), retrying in {:?}",
                    attempt, err, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
