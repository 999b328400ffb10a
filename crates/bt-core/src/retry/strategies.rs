//! Retry delay strategies and predicates

use crate::types::{RetryPolicy, RetryStrategy};
use rand::Rng;
use std::time::Duration;

/// Calculate the delay before the next retry attempt
///
/// `attempt` is the 1-indexed attempt that just failed. Exponential delays
/// grow as `initial * multiplier^(attempt - 1)` and never exceed
/// `max_delay_ms`. Jitter adds up to 25%, still bounded by `max_delay_ms`.
///
/// # Example
///
/// ```rust
/// use bt_core::retry::calculate_delay;
/// use bt_core::types::{RetryPolicy, RetryStrategy};
///
/// let policy = RetryPolicy {
///     max_attempts: 3,
///     strategy: RetryStrategy::ExponentialBackoff,
///     backoff_multiplier: 2.0,
///     initial_delay_ms: 500,
///     max_delay_ms: 8000,
/// };
///
/// assert_eq!(calculate_delay(&policy, 1, false).as_millis(), 500);
/// assert_eq!(calculate_delay(&policy, 2, false).as_millis(), 1000);
/// ```
pub fn calculate_delay(policy: &RetryPolicy, attempt: u32, jitter: bool) -> Duration {
    let attempt_index = attempt.saturating_sub(1);

    let base_delay_ms = match policy.strategy {
        RetryStrategy::None => 0,
        RetryStrategy::FixedDelay => policy.initial_delay_ms,
        RetryStrategy::ExponentialBackoff => {
            let multiplier = policy.backoff_multiplier.powf(attempt_index as f64);
            let delay = policy.initial_delay_ms as f64 * multiplier;
            if delay.is_finite() && delay < u64::MAX as f64 {
                delay as u64
            } else {
                u64::MAX
            }
        }
    };

    let capped_delay_ms = base_delay_ms.min(policy.max_delay_ms);

    let final_delay_ms = if jitter && capped_delay_ms > 0 {
        let jitter_range = capped_delay_ms / 4;
        capped_delay_ms
            .saturating_add(rand::rng().random_range(0..=jitter_range))
            .min(policy.max_delay_ms)
    } else {
        capped_delay_ms
    };

    Duration::from_millis(final_delay_ms)
}

/// Decides whether an error is worth another attempt
///
/// Transient failures (timeouts, 5xx) should return true; permanent ones
/// (not found, rate limited, integrity failures) should return false so the
/// caller sees them immediately.
pub trait RetryPredicate<E: ?Sized>: Send + Sync {
    fn should_retry(&self, error: &E) -> bool;
}

/// Every error is retryable
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRetry;

impl<E: ?Sized> RetryPredicate<E> for AlwaysRetry {
    fn should_retry(&self, _error: &E) -> bool {
        true
    }
}
