//! Exponential retry backoff for failed jobs.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default delay before the first retry.
pub const DEFAULT_RETRY_BASE: Duration = Duration::from_secs(30);
/// Default ceiling on any single retry delay.
pub const DEFAULT_RETRY_MAX: Duration = Duration::from_secs(60 * 60);
/// Default number of attempts a job may consume.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

const MIN_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Backoff policy applied when a failure report carries no explicit delay.
///
/// The delay after the `n`th failed attempt is `base * 2^(n-1)`, capped at
/// `max` and never shorter than one second.
///
/// # Examples
///
/// ```
/// use concierge::queue::domain::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new(Duration::from_secs(10), Duration::from_secs(60));
/// assert_eq!(policy.delay_for(1), Duration::from_secs(10));
/// assert_eq!(policy.delay_for(3), Duration::from_secs(40));
/// assert_eq!(policy.delay_for(9), Duration::from_secs(60));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    base: Duration,
    max: Duration,
}

impl RetryPolicy {
    /// Creates a policy from a base delay and a ceiling.
    ///
    /// A ceiling below the base is raised to the base.
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
        }
    }

    /// Returns the first-retry delay.
    #[must_use]
    pub const fn base(&self) -> Duration {
        self.base
    }

    /// Returns the delay ceiling.
    #[must_use]
    pub const fn max(&self) -> Duration {
        self.max
    }

    /// Delay to wait after `attempts` failed attempts.
    ///
    /// `attempts` counts the failure being reported, so the first failure
    /// passes `1`. A value of `0` is treated as `1`.
    #[must_use]
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1);
        let factor = 1_u32.checked_shl(exponent).unwrap_or(u32::MAX);
        self.base
            .checked_mul(factor)
            .unwrap_or(self.max)
            .min(self.max)
            .max(MIN_RETRY_DELAY)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_BASE, DEFAULT_RETRY_MAX)
    }
}
