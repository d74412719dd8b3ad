//! # Time Source
//!
//! Contracts never read the wall clock themselves. The host supplies the
//! current time with every call (see [`crate::context::CallContext`]), and
//! the host gets it from a [`Clock`].
//!
//! [`ManualClock`] is what the replay host and the tests use: it only moves
//! when told to, and it only moves forward. [`SystemClock`] supplies the
//! replay start when a scenario does not pin one.

use chrono::{DateTime, Duration, Utc};
use std::cell::Cell;

/// A monotonically non-decreasing source of the current time.
pub trait Clock {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that advances only on request.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Cell<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    /// Moves the clock forward by `by` and returns the new time.
    /// Negative durations leave it where it is.
    ///
    /// Returns `None`, without moving, if the result is out of range.
    pub fn advance(&self, by: Duration) -> Option<DateTime<Utc>> {
        let now = self.now.get();
        if by <= Duration::zero() {
            return Some(now);
        }
        let next = now.checked_add_signed(by)?;
        tracing::trace!(to = %next, "manual clock advanced");
        self.now.set(next);
        Some(next)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }
}
