//! Settable clock for deterministic scheduling.
//!
//! Services take any [`mockable::Clock`]; production wiring uses
//! [`mockable::DefaultClock`]. [`ManualClock`] holds an explicit instant that
//! callers advance by hand, which lets lease expiry, retry backoff and cron
//! evaluation be exercised without sleeping.

use chrono::{DateTime, Duration, Local, Utc};
use mockable::Clock;
use std::sync::{Arc, PoisonError, RwLock};

/// A clock whose current instant is set explicitly.
///
/// Clones share the same instant, so advancing one handle advances every
/// service holding a clone.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, TimeZone, Utc};
/// use concierge::clock::ManualClock;
/// use mockable::Clock;
///
/// let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().expect("valid instant");
/// let clock = ManualClock::new(start);
/// clock.advance(Duration::seconds(90));
/// assert_eq!(clock.utc(), start + Duration::seconds(90));
/// ```
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl ManualClock {
    /// Creates a clock fixed at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(now)),
        }
    }

    /// Moves the clock to `instant`.
    pub fn set(&self, instant: DateTime<Utc>) {
        let mut guard = self.now.write().unwrap_or_else(PoisonError::into_inner);
        *guard = instant;
    }

    /// Moves the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut guard = self.now.write().unwrap_or_else(PoisonError::into_inner);
        *guard += delta;
    }
}

impl Clock for ManualClock {
    fn local(&self) -> DateTime<Local> {
        self.utc().with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(PoisonError::into_inner)
    }
}
