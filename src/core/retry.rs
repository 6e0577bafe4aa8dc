//! Retry policy: decides between another attempt after a backoff delay and the dead-letter queue.

use std::time::Duration;

use super::Task;

/// Outcome of applying the retry policy to a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after `delay`; `retries` is the count after this failure.
    Retry {
        /// Retry count once this failure is recorded.
        retries: u32,
        /// Backoff before the task becomes eligible again.
        delay: Duration,
    },
    /// Budget exhausted; the task fails permanently.
    Exhausted,
}

/// Exponential backoff keyed off the current retry count:
/// `retry_delay_ms * 2^(retries - 1)`.
///
/// `retries = 0` is treated like the first retry. Saturates instead of overflowing.
#[must_use]
pub fn backoff_delay(retry_delay_ms: u64, retries: u32) -> Duration {
    let exponent = retries.saturating_sub(1).min(63);
    let factor = 1_u64 << exponent;
    Duration::from_millis(retry_delay_ms.saturating_mul(factor))
}

/// Decide what happens to `task` after a retryable failure of its current attempt.
#[must_use]
pub fn decide(task: &Task) -> RetryDecision {
    if task.retries >= task.max_retries {
        return RetryDecision::Exhausted;
    }
    let retries = task.retries + 1;
    RetryDecision::Retry {
        retries,
        delay: backoff_delay(task.retry_delay_ms, retries),
    }
}
