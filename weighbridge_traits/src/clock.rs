use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Monotonic clock abstraction for control and timing across the stack.
///
/// - now(): returns a monotonic Instant
/// - sleep(): sleeps for the provided duration (implementations may simulate)
/// - ms_since(): helper to compute elapsed milliseconds from an epoch Instant
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);

    /// Milliseconds elapsed since `epoch`, saturating at 0 on underflow.
    fn ms_since(&self, epoch: Instant) -> u64 {
        let dur = self.now().saturating_duration_since(epoch);
        dur.as_millis() as u64
    }
}

/// Default, real-time monotonic clock backed by std::time::Instant.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

/// Wall-clock source for record timestamps. Injectable so tests can construct
/// records at chosen instants instead of patching timestamps after the fact.
pub trait WallClock {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Default wall clock backed by the system time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemWallClock;

impl WallClock for SystemWallClock {
    #[inline]
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub mod test_clock {
    //! Deterministic clocks for tests; compiled unconditionally so downstream
    //! crates can drive their own state machines without real time.
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Deterministic monotonic clock whose time can be advanced manually.
    ///
    /// now() = origin + offset
    /// sleep(d) advances internal time by d without actually sleeping.
    #[derive(Debug, Clone)]
    pub struct TestClock {
        origin: Instant,
        offset: Arc<Mutex<Duration>>,
    }

    impl Default for TestClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                offset: Arc::new(Mutex::new(Duration::ZERO)),
            }
        }

        /// Advance the clock by the given duration.
        pub fn advance(&self, d: Duration) {
            if let Ok(mut off) = self.offset.lock() {
                *off = off.saturating_add(d);
            }
        }

        /// Set the absolute offset relative to origin.
        pub fn set_offset(&self, d: Duration) {
            if let Ok(mut off) = self.offset.lock() {
                *off = d;
            }
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            let off = self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO);
            self.origin + off
        }

        fn sleep(&self, d: Duration) {
            self.advance(d);
        }
    }

    /// Wall clock pinned to a settable instant.
    #[derive(Debug, Clone)]
    pub struct FixedWallClock {
        now: Arc<Mutex<DateTime<Utc>>>,
    }

    impl FixedWallClock {
        pub fn new(now: DateTime<Utc>) -> Self {
            Self {
                now: Arc::new(Mutex::new(now)),
            }
        }

        pub fn set(&self, now: DateTime<Utc>) {
            if let Ok(mut g) = self.now.lock() {
                *g = now;
            }
        }

        pub fn advance(&self, d: chrono::Duration) {
            if let Ok(mut g) = self.now.lock() {
                *g += d;
            }
        }
    }

    impl WallClock for FixedWallClock {
        fn now_utc(&self) -> DateTime<Utc> {
            self.now.lock().map(|g| *g).unwrap_or_else(|_| Utc::now())
        }
    }
}
