//! Wraparound-safe elapsed-time tracking and validity windows.
//!
//! A [`TimeWindow`] marks the moment an event happened and answers "how long
//! ago was that?" against a wrapping 32-bit millisecond tick clock. The unset
//! state is a first-class value: every query on it returns `false`/`None`.
//!
//! Windows are plain values, copied and replaced wholesale when the tracked
//! event recurs. Copies stay consistent because elapsed time is re-derived
//! from the clock on every read; the internal accumulator only exists to
//! survive tick wraparound (reads must happen at least once per ~24 days,
//! which the ~100 ms control cadence guarantees by construction).

use std::fmt::Write as _;
use std::ops::RangeBounds;

use vent_traits::clock::{Clock, ticks_diff};

/// Validity classification relative to a `set_valid_between` window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    /// No timestamp, or no validity window attached.
    Unset,
    /// The window has not opened yet.
    Pending,
    /// Inside the validity window.
    Valid,
    /// The window has closed.
    Expired,
}

#[derive(Debug, Clone, Copy)]
struct Armed {
    last_tick: u32,
    elapsed_ms: i64,
    valid: Option<(i64, i64)>,
}

/// Optional monotonic stopwatch with an optional validity window.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeWindow {
    inner: Option<Armed>,
}

impl TimeWindow {
    /// The "never set" window; all queries return `false`/`None`.
    pub const fn unset() -> Self {
        Self { inner: None }
    }

    /// Mark an event happening right now.
    pub fn now(clock: &dyn Clock) -> Self {
        Self::after(clock, 0)
    }

    /// Mark an event that becomes "due" only after `offset_ms` has elapsed;
    /// until then the elapsed time reads negative.
    pub fn after(clock: &dyn Clock, offset_ms: i64) -> Self {
        Self {
            inner: Some(Armed {
                last_tick: clock.ticks_ms(),
                elapsed_ms: -offset_ms,
                valid: None,
            }),
        }
    }

    pub fn is_set(&self) -> bool {
        self.inner.is_some()
    }

    /// Re-sync against the clock and return signed elapsed milliseconds.
    pub fn elapsed_ms(&mut self, clock: &dyn Clock) -> Option<i64> {
        let armed = self.inner.as_mut()?;
        let t = clock.ticks_ms();
        armed.elapsed_ms += ticks_diff(t, armed.last_tick);
        armed.last_tick = t;
        Some(armed.elapsed_ms)
    }

    /// True iff elapsed time lies within `range`. Unset windows are never
    /// within any range.
    pub fn within<R: RangeBounds<i64>>(&mut self, clock: &dyn Clock, range: R) -> bool {
        match self.elapsed_ms(clock) {
            Some(ms) => range.contains(&ms),
            None => false,
        }
    }

    /// True once the window is due (elapsed time is non-negative).
    pub fn passed(&mut self, clock: &dyn Clock) -> bool {
        self.elapsed_ms(clock).is_some_and(|ms| ms >= 0)
    }

    /// Attach a persistent validity window `[lo, hi]` relative to the
    /// origin event. No-op on an unset window.
    pub fn set_valid_between(&mut self, lo_ms: i64, hi_ms: i64) {
        if let Some(armed) = self.inner.as_mut() {
            armed.valid = Some((lo_ms, hi_ms));
        }
    }

    /// Where the elapsed time sits relative to the attached validity window.
    pub fn validity(&mut self, clock: &dyn Clock) -> Validity {
        let Some(ms) = self.elapsed_ms(clock) else {
            return Validity::Unset;
        };
        let Some((lo, hi)) = self.inner.and_then(|a| a.valid) else {
            return Validity::Unset;
        };
        if ms < lo {
            Validity::Pending
        } else if ms <= hi {
            Validity::Valid
        } else {
            Validity::Expired
        }
    }

    pub fn is_valid(&mut self, clock: &dyn Clock) -> bool {
        self.validity(clock) == Validity::Valid
    }

    /// Render the elapsed time for the status block: `"None"` when unset,
    /// `"<0"` while not yet due, otherwise `s.mmm`, `hh:mm:ss`, or
    /// `N days, hh:mm:ss`.
    pub fn render(&self, clock: &dyn Clock) -> String {
        let mut copy = *self;
        match copy.elapsed_ms(clock) {
            None => "None".to_owned(),
            Some(ms) if ms < 0 => "<0".to_owned(),
            Some(ms) => format_elapsed(ms),
        }
    }
}

fn format_elapsed(ms: i64) -> String {
    const DAY_MS: i64 = 86_400_000;
    let days = ms / DAY_MS;
    let ms = ms % DAY_MS;
    let h = ms / 3_600_000;
    let m = (ms - 3_600_000 * h) / 60_000;
    let s = (ms - 3_600_000 * h - 60_000 * m) / 1_000;
    let mut out = String::new();
    if days > 0 {
        let _ = write!(out, "{days} days, {h:02}:{m:02}:{s:02}");
    } else if h > 0 || m > 0 {
        let _ = write!(out, "{h:02}:{m:02}:{s:02}");
    } else {
        let frac = ms - 1_000 * s;
        let _ = write!(out, "{s}.{frac:03}");
    }
    out
}
