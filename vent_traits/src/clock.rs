use std::thread;
use std::time::{Duration, Instant};

/// Monotonic millisecond tick source for control and timing across the stack.
///
/// Ticks live in a wrapping 32-bit space (the microcontroller `ticks_ms`
/// convention): consumers must difference ticks with [`ticks_diff`] rather
/// than comparing them directly, and must re-read at least once per wrap
/// period (~49.7 days) to stay wrap-correct.
pub trait Clock {
    fn ticks_ms(&self) -> u32;
    fn sleep(&self, d: Duration);
}

/// Signed difference `a - b` in the wrapping 32-bit tick space.
#[inline]
pub fn ticks_diff(a: u32, b: u32) -> i64 {
    i64::from(a.wrapping_sub(b) as i32)
}

/// Default, real-time monotonic clock backed by std::time::Instant.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn ticks_ms(&self) -> u32 {
        // Truncation gives mod-2^32 milliseconds, i.e. the wrapping tick space.
        self.origin.elapsed().as_millis() as u32
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

pub mod test_clock {
    //! Deterministic clock for tests; not compiled out so downstream crates
    //! can drive their own timing-sensitive tests with it.

    use super::Clock;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Manually-advanced test clock. Clones share the underlying tick counter.
    ///
    /// `sleep(d)` advances the ticks by `d` without actually sleeping.
    #[derive(Debug, Clone, Default)]
    pub struct TestClock {
        ticks: Arc<AtomicU32>,
    }

    impl TestClock {
        pub fn new() -> Self {
            Self::default()
        }

        /// Start from an arbitrary tick value (e.g. near `u32::MAX` to
        /// exercise wraparound).
        pub fn starting_at(tick: u32) -> Self {
            let c = Self::new();
            c.ticks.store(tick, Ordering::Relaxed);
            c
        }

        pub fn advance_ms(&self, ms: u32) {
            self.ticks.fetch_add(ms, Ordering::Relaxed);
        }

        pub fn set(&self, tick: u32) {
            self.ticks.store(tick, Ordering::Relaxed);
        }
    }

    impl Clock for TestClock {
        fn ticks_ms(&self) -> u32 {
            self.ticks.load(Ordering::Relaxed)
        }

        fn sleep(&self, d: Duration) {
            self.advance_ms(d.as_millis() as u32);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_diff_handles_wraparound() {
        assert_eq!(ticks_diff(5, u32::MAX - 4), 10);
        assert_eq!(ticks_diff(u32::MAX - 4, 5), -10);
        assert_eq!(ticks_diff(100, 100), 0);
    }

    #[test]
    fn test_clock_advances_on_sleep() {
        let c = test_clock::TestClock::new();
        c.sleep(Duration::from_millis(250));
        assert_eq!(c.ticks_ms(), 250);
    }
}
