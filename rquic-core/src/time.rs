// Copyright (c) the rquic contributors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Monotonic time handling for the transport core.
//!
//! The core never reads the wall clock directly; every timed decision goes
//! through the [`Clock`] collaborator so it can be driven deterministically
//! in tests and simulations.

use core::{ops, time::Duration};

/// An opaque point in monotonic time.
///
/// `Timestamp` intentionally exposes no way to construct an absolute value
/// outside of a [`Clock`] — only differences (`Duration`) are meaningful
/// across connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(Duration);

impl Timestamp {
    /// Constructs a `Timestamp` from a duration since an implementation
    /// defined epoch. Only [`Clock`] implementations should call this.
    #[inline]
    pub const fn from_duration(duration: Duration) -> Self {
        Timestamp(duration)
    }

    #[inline]
    pub const fn as_duration(self) -> Duration {
        self.0
    }

    #[inline]
    pub fn saturating_duration_since(self, earlier: Timestamp) -> Duration {
        self.0.saturating_sub(earlier.0)
    }

    #[inline]
    pub fn checked_add(self, duration: Duration) -> Option<Timestamp> {
        self.0.checked_add(duration).map(Timestamp)
    }

    #[inline]
    pub fn saturating_add(self, duration: Duration) -> Timestamp {
        Timestamp(self.0.saturating_add(duration))
    }

    /// Returns `self`, floored so it is never earlier than `floor`.
    #[inline]
    pub fn max(self, floor: Timestamp) -> Timestamp {
        core::cmp::max(self, floor)
    }
}

impl ops::Add<Duration> for Timestamp {
    type Output = Timestamp;

    #[inline]
    fn add(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0 + rhs)
    }
}

impl ops::Sub<Timestamp> for Timestamp {
    type Output = Duration;

    #[inline]
    fn sub(self, rhs: Timestamp) -> Duration {
        self.0.saturating_sub(rhs.0)
    }
}

/// Source of monotonic time for the connection.
///
/// Implementations are expected to be cheap; `approximate_now` may return a
/// cached value refreshed once per event-loop turn, while `now` always
/// queries the underlying clock source.
pub trait Clock {
    fn now(&self) -> Timestamp;

    #[inline]
    fn approximate_now(&self) -> Timestamp {
        self.now()
    }
}

/// A `Clock` useful for tests: time only advances when explicitly told to.
#[derive(Debug, Default, Clone)]
pub struct TestClock {
    now: core::cell::Cell<Duration>,
}

impl TestClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, duration: Duration) {
        self.now.set(self.now.get() + duration);
    }

    pub fn set(&self, duration: Duration) {
        self.now.set(duration);
    }
}

impl Clock for TestClock {
    #[inline]
    fn now(&self) -> Timestamp {
        Timestamp::from_duration(self.now.get())
    }
}

/// A single-shot alarm driven by the event loop.
///
/// Setting a deadline while one is already pending replaces it; this must
/// be cheap and must not cause the alarm to fire twice for the same
/// deadline (see spec.md §5, "Cancellation and timeouts").
pub trait Alarm {
    fn set(&mut self, deadline: Timestamp);
    fn cancel(&mut self);
    fn is_set(&self) -> bool;
    fn deadline(&self) -> Option<Timestamp>;
}

/// Creates [`Alarm`]s bound to a particular callback identity.
///
/// The core never owns a concrete timer-wheel implementation; the event
/// loop (out of scope per spec.md §1) supplies one through this factory.
pub trait AlarmFactory {
    type Alarm: Alarm;

    fn create_alarm(&mut self) -> Self::Alarm;
}

/// A simple [`Alarm`] backed by an `Option<Timestamp>`, suitable for tests
/// and for event loops that poll deadlines rather than registering
/// callbacks.
#[derive(Debug, Default, Clone, Copy)]
pub struct PolledAlarm(Option<Timestamp>);

impl Alarm for PolledAlarm {
    #[inline]
    fn set(&mut self, deadline: Timestamp) {
        self.0 = Some(deadline);
    }

    #[inline]
    fn cancel(&mut self) {
        self.0 = None;
    }

    #[inline]
    fn is_set(&self) -> bool {
        self.0.is_some()
    }

    #[inline]
    fn deadline(&self) -> Option<Timestamp> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances_monotonically() {
        let clock = TestClock::new();
        let t0 = clock.now();
        clock.advance(Duration::from_millis(10));
        let t1 = clock.now();
        assert!(t1 > t0);
        assert_eq!(t1 - t0, Duration::from_millis(10));
    }

    #[test]
    fn polled_alarm_set_cancel() {
        let mut alarm = PolledAlarm::default();
        assert!(!alarm.is_set());
        alarm.set(Timestamp::from_duration(Duration::from_secs(1)));
        assert!(alarm.is_set());
        alarm.cancel();
        assert!(!alarm.is_set());
    }
}
