// Copyright 2026 the Scanout Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monotonic timestamps for pass timing and frame instrumentation.
//!
//! [`HostTime`] is a point on a monotonic clock in nanoseconds from an
//! arbitrary origin; [`Duration`] is a span in the same unit. The crate never
//! reads a clock itself: callers hand in a [`Clock`], which in `no_std`
//! builds is usually a plain `fn() -> HostTime` over the platform's
//! monotonic counter, and in tests a [`ManualClock`].

use core::cell::Cell;
use core::fmt;
use core::ops::{Add, Sub};

/// A point in time in nanoseconds on a monotonic clock.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HostTime(pub u64);

impl HostTime {
    /// Returns the raw nanosecond value.
    #[inline]
    #[must_use]
    pub const fn nanos(self) -> u64 {
        self.0
    }

    /// Returns the time elapsed since `earlier`, or zero if `earlier` is
    /// later than `self`.
    #[inline]
    #[must_use]
    pub const fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration(self.0.saturating_sub(earlier.0))
    }

    /// Checked addition of a duration.
    #[inline]
    #[must_use]
    pub const fn checked_add(self, duration: Duration) -> Option<Self> {
        match self.0.checked_add(duration.0) {
            Some(t) => Some(Self(t)),
            None => None,
        }
    }
}

impl Add<Duration> for HostTime {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Duration) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sub for HostTime {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: Self) -> Duration {
        Duration(self.0 - rhs.0)
    }
}

impl fmt::Debug for HostTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostTime({}ns)", self.0)
    }
}

/// A span of time in nanoseconds.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Duration(pub u64);

impl Duration {
    /// A zero-length duration.
    pub const ZERO: Self = Self(0);

    /// Creates a duration from microseconds, saturating on overflow.
    #[inline]
    #[must_use]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros.saturating_mul(1_000))
    }

    /// Creates a duration from milliseconds, saturating on overflow.
    #[inline]
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(1_000_000))
    }

    /// Returns the raw nanosecond value.
    #[inline]
    #[must_use]
    pub const fn nanos(self) -> u64 {
        self.0
    }

    /// Returns the whole microseconds in this duration.
    #[inline]
    #[must_use]
    pub const fn as_micros(self) -> u64 {
        self.0 / 1_000
    }

    /// Saturating addition.
    #[inline]
    #[must_use]
    pub const fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Add for Duration {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl fmt::Debug for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Duration({}ns)", self.0)
    }
}

/// A monotonic time source.
pub trait Clock {
    /// Returns the current time.
    fn now(&self) -> HostTime;
}

impl Clock for fn() -> HostTime {
    #[inline]
    fn now(&self) -> HostTime {
        self()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u64>,
}

impl ManualClock {
    /// Creates a clock reading `start`.
    #[must_use]
    pub const fn new(start: HostTime) -> Self {
        Self {
            now: Cell::new(start.0),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get().saturating_add(by.0));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> HostTime {
        HostTime(self.now.get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_units() {
        assert_eq!(Duration::from_micros(3).nanos(), 3_000);
        assert_eq!(Duration::from_millis(2).as_micros(), 2_000);
        assert_eq!(Duration::from_millis(u64::MAX), Duration(u64::MAX));
    }

    #[test]
    fn host_time_arithmetic() {
        let t = HostTime(1_000);
        assert_eq!(t + Duration(200), HostTime(1_200));
        assert_eq!(HostTime(1_500) - t, Duration(500));
        assert_eq!(t.saturating_duration_since(HostTime(1_500)), Duration::ZERO);
        assert_eq!(HostTime(u64::MAX).checked_add(Duration(1)), None);
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(HostTime(10));
        clock.advance(Duration::from_micros(1));
        assert_eq!(clock.now(), HostTime(1_010));
    }

    #[test]
    fn fn_pointer_clock() {
        fn fixed() -> HostTime {
            HostTime(77)
        }
        let clock: fn() -> HostTime = fixed;
        assert_eq!(clock.now(), HostTime(77));
    }
}
