//! Noise-robust rotational-speed measurement.
//!
//! Two interchangeable acquisition strategies share one smoothing/stability
//! tracker:
//!
//! - [`EdgeSpeedSensor`] consumes inter-pulse deltas measured in an edge
//!   interrupt ([`EdgeCapture`]) and handed over through a lock-free record
//!   ([`TachShared`]). The interrupt side filters outliers and publishes only
//!   accepted periods; the cycle side never blocks.
//! - [`CounterSpeedSensor`] drains a hardware pulse-period queue
//!   ([`vent_traits::PulseQueue`]), compensating for queue-stall artifacts.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use vent_traits::PulseQueue;
use vent_traits::clock::Clock;

use crate::config::TachCfg;
use crate::timewindow::TimeWindow;

/// Fan model parameters: speed range, drive-voltage mapping, and the
/// stability rules in rpm terms.
#[derive(Debug, Clone)]
pub struct FanProfile {
    /// Below this the fan tends to stall and reads as stopped.
    pub stop_rpm: u32,
    pub max_rpm: u32,
    pub millivolts_for_max_rpm: u32,
    /// No significant rpm change for this long means "stable".
    pub stable_delay_ms: i64,
    /// Width of the band an rpm reading may wander in without counting as a
    /// change.
    pub rpm_stable_threshold: u32,
}

impl FanProfile {
    /// Theoretical reference model where rpm and millivolts match 1:1.
    pub fn theoretical() -> Self {
        Self {
            stop_rpm: 0,
            max_rpm: 10_000,
            millivolts_for_max_rpm: 10_000,
            stable_delay_ms: 1_000,
            rpm_stable_threshold: 50,
        }
    }

    /// Vilpe ECo Flow 125P/700: rpm rises linearly with drive voltage,
    /// 3030 rpm at 7750 mV, tends to stop below 270-330 rpm.
    pub fn vilpe_eco_flow_125p700() -> Self {
        Self {
            stop_rpm: 270,
            max_rpm: 3_030,
            millivolts_for_max_rpm: 7_750,
            stable_delay_ms: 10_000,
            rpm_stable_threshold: 30,
        }
    }

    pub fn millivolts_to_rpm(&self, mv: i64) -> u32 {
        let rpm = self.max_rpm as i64 * mv / self.millivolts_for_max_rpm as i64;
        if rpm < self.stop_rpm as i64 {
            return 0;
        }
        rpm.min(self.max_rpm as i64) as u32
    }

    pub fn percentage(&self, rpm: u32) -> u32 {
        if self.max_rpm == 0 {
            return 0;
        }
        (u64::from(rpm) * 100 / u64::from(self.max_rpm)).min(100) as u32
    }
}

/// Common contract of both speed-sensor variants.
pub trait SpeedSense {
    /// Refresh from the acquisition source; bounded time, call once per cycle.
    fn update(&mut self);
    /// Smoothed rotational speed; zero when stopped or without signal.
    fn rpm(&self) -> u32;
    /// Speed as percentage of the profile's full range.
    fn percentage(&self) -> u32;
    /// No significant change for at least the settle delay.
    fn stable(&self) -> bool;
}

impl<T: SpeedSense + ?Sized> SpeedSense for Box<T> {
    fn update(&mut self) {
        (**self).update()
    }
    fn rpm(&self) -> u32 {
        (**self).rpm()
    }
    fn percentage(&self) -> u32 {
        (**self).percentage()
    }
    fn stable(&self) -> bool {
        (**self).stable()
    }
}

/// Period→rpm conversion, exponential smoothing, and the sliding stability
/// band shared by both sensor variants.
#[derive(Debug)]
pub struct SpeedTracker {
    profile: FanProfile,
    rpm: u32,
    primed: bool,
    band_lo: i64,
    band_hi: i64,
    change: TimeWindow,
    stable: bool,
}

impl SpeedTracker {
    pub fn new(profile: FanProfile, clock: &dyn Clock) -> Self {
        let band_hi = i64::from(profile.rpm_stable_threshold) * 2;
        Self {
            profile,
            rpm: 0,
            primed: false,
            band_lo: 0,
            band_hi,
            change: TimeWindow::now(clock),
            stable: false,
        }
    }

    /// Feed one period observation; `None` means no pulse inside the timeout
    /// (stalled or stopped), which reads as zero speed immediately.
    pub fn observe_period(&mut self, clock: &dyn Clock, period_us: Option<u32>) {
        let raw = match period_us {
            Some(p) if p > 0 => (60_000_000 / u64::from(p)) as u32,
            _ => 0,
        };
        self.rpm = if self.primed && raw != 0 {
            ((7 * u64::from(self.rpm) + u64::from(raw)) / 8) as u32
        } else {
            self.primed = raw != 0;
            raw
        };
        // Slide the band just far enough to contain the reading; any slide
        // counts as a speed change.
        let lo = (i64::from(self.rpm) - self.band_lo).min(0);
        let hi = (i64::from(self.rpm) - self.band_hi).max(0);
        if lo < 0 || hi > 0 {
            self.band_lo += lo + hi;
            self.band_hi += lo + hi;
            self.change = TimeWindow::now(clock);
        }
        self.stable = !self.change.within(clock, 0..=self.profile.stable_delay_ms);
    }

    pub fn rpm(&self) -> u32 {
        self.rpm
    }

    pub fn percentage(&self) -> u32 {
        self.profile.percentage(self.rpm)
    }

    pub fn stable(&self) -> bool {
        self.stable
    }

    pub fn profile(&self) -> &FanProfile {
        &self.profile
    }
}

/// Consecutive off-reference deltas needed before the reference moves.
pub const PROMOTE_AFTER: u8 = 8;

/// Outlier rejection for interrupt-measured inter-pulse deltas.
///
/// A delta within 75-133 % of the accepted reference is accepted and becomes
/// the new reference. A run of [`PROMOTE_AFTER`] consecutive deltas that
/// agree with each other but not with the reference promotes the new value,
/// so genuine speed changes get through while single glitches do not.
#[derive(Debug, Default)]
pub struct EdgeFilter {
    good_us: u32,
    cand_us: u32,
    cand_run: u8,
}

impl EdgeFilter {
    pub fn new() -> Self {
        Self::default()
    }

    fn in_band(reference: u32, delta: u32) -> bool {
        delta >= reference - reference / 4 && delta <= reference + reference / 3
    }

    /// Returns the accepted period, or `None` for a rejected delta.
    pub fn accept(&mut self, delta_us: u32) -> Option<u32> {
        if delta_us == 0 {
            return None;
        }
        if self.good_us == 0 {
            self.good_us = delta_us;
            return Some(delta_us);
        }
        if Self::in_band(self.good_us, delta_us) {
            self.good_us = delta_us;
            self.cand_run = 0;
            return Some(delta_us);
        }
        if self.cand_run > 0 && Self::in_band(self.cand_us, delta_us) {
            self.cand_us = delta_us;
            self.cand_run += 1;
            if self.cand_run >= PROMOTE_AFTER {
                self.good_us = delta_us;
                self.cand_run = 0;
                return Some(delta_us);
            }
        } else {
            self.cand_us = delta_us;
            self.cand_run = 1;
        }
        None
    }

    pub fn reference_us(&self) -> u32 {
        self.good_us
    }
}

/// Lock-free handoff record between the edge interrupt and the control cycle.
///
/// The interrupt publishes the latest accepted inter-pulse period; the cycle
/// reads a snapshot. Two words suffice: readers only need the newest value
/// plus a generation count to detect fresh data at cycle granularity.
#[derive(Debug, Default)]
pub struct TachShared {
    period_us: AtomicU32,
    generation: AtomicU32,
}

impl TachShared {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, period_us: u32) {
        self.period_us.store(period_us, Ordering::Relaxed);
        self.generation.fetch_add(1, Ordering::Release);
    }

    /// `(period_us, generation)` as last published.
    pub fn snapshot(&self) -> (u32, u32) {
        let generation = self.generation.load(Ordering::Acquire);
        (self.period_us.load(Ordering::Relaxed), generation)
    }
}

/// Interrupt-side state for the edge-timing tachometer.
///
/// `on_edge` must be the only writer. It never blocks and touches nothing
/// but its own fields and the shared record, so it is safe to preempt the
/// control cycle at any point.
pub struct EdgeCapture {
    filter: EdgeFilter,
    last_edge_us: Option<u64>,
    shared: Arc<TachShared>,
}

impl EdgeCapture {
    pub fn new(shared: Arc<TachShared>) -> Self {
        Self {
            filter: EdgeFilter::new(),
            last_edge_us: None,
            shared,
        }
    }

    /// Record one falling edge with a microsecond timestamp.
    pub fn on_edge(&mut self, timestamp_us: u64) {
        if let Some(prev) = self.last_edge_us.replace(timestamp_us) {
            let delta = timestamp_us.saturating_sub(prev);
            if delta > 0
                && delta <= u64::from(u32::MAX)
                && let Some(accepted) = self.filter.accept(delta as u32)
            {
                self.shared.publish(accepted);
            }
        }
    }
}

/// Software edge-timing speed sensor: the cycle-side reader of [`TachShared`].
pub struct EdgeSpeedSensor {
    shared: Arc<TachShared>,
    clock: Arc<dyn Clock + Send + Sync>,
    tracker: SpeedTracker,
    timeout_ms: i64,
    last_generation: u32,
    last_pulse: TimeWindow,
    period_us: u32,
}

impl EdgeSpeedSensor {
    pub fn new(
        shared: Arc<TachShared>,
        profile: FanProfile,
        tach: TachCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let tracker = SpeedTracker::new(profile, &*clock);
        Self {
            shared,
            clock,
            tracker,
            timeout_ms: tach.timeout_ms,
            last_generation: 0,
            last_pulse: TimeWindow::unset(),
            period_us: 0,
        }
    }
}

impl SpeedSense for EdgeSpeedSensor {
    fn update(&mut self) {
        let (period, generation) = self.shared.snapshot();
        if generation != self.last_generation {
            self.last_generation = generation;
            self.period_us = period;
            self.last_pulse = TimeWindow::now(&*self.clock);
        }
        let fresh = self.last_pulse.within(&*self.clock, 0..=self.timeout_ms)
            && i64::from(self.period_us) <= self.timeout_ms * 1_000;
        let period = (fresh && self.period_us > 0).then_some(self.period_us);
        self.tracker.observe_period(&*self.clock, period);
    }

    fn rpm(&self) -> u32 {
        self.tracker.rpm()
    }

    fn percentage(&self) -> u32 {
        self.tracker.percentage()
    }

    fn stable(&self) -> bool {
        self.tracker.stable()
    }
}

/// Hardware pulse-counter speed sensor draining a 2-deep result FIFO.
///
/// When the FIFO fills and the counter stalls, the second queued value
/// includes the stalling time (the first is merely late), so each drain
/// keeps the first of a pair and discards the second. A reading is trusted
/// only while the previous valid one is younger than the timeout, and a
/// period longer than the timeout signals a stall rather than valid data
/// (the free-running counter overflows once the fan stops).
pub struct CounterSpeedSensor<Q: PulseQueue> {
    queue: Q,
    clock: Arc<dyn Clock + Send + Sync>,
    tracker: SpeedTracker,
    timeout_ms: i64,
    last_sample: TimeWindow,
    period_us: i64,
}

impl<Q: PulseQueue> CounterSpeedSensor<Q> {
    pub fn new(
        queue: Q,
        profile: FanProfile,
        tach: TachCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        let tracker = SpeedTracker::new(profile, &*clock);
        Self {
            queue,
            clock,
            tracker,
            timeout_ms: tach.timeout_ms,
            last_sample: TimeWindow::unset(),
            period_us: -1,
        }
    }

    fn drain(&mut self) -> Option<u32> {
        let was_fresh = self.last_sample.within(&*self.clock, 0..=self.timeout_ms);
        while self.queue.len() > 1 {
            let first = self.queue.pop_period_us();
            let _stalled = self.queue.pop_period_us();
            self.last_sample = TimeWindow::now(&*self.clock);
            if was_fresh && let Some(p) = first {
                self.period_us = i64::from(p);
            }
        }
        if !was_fresh || self.period_us > self.timeout_ms * 1_000 {
            self.period_us = -1;
        }
        u32::try_from(self.period_us).ok()
    }
}

impl<Q: PulseQueue> SpeedSense for CounterSpeedSensor<Q> {
    fn update(&mut self) {
        let period = self.drain().filter(|&p| p > 0);
        self.tracker.observe_period(&*self.clock, period);
    }

    fn rpm(&self) -> u32 {
        self.tracker.rpm()
    }

    fn percentage(&self) -> u32 {
        self.tracker.percentage()
    }

    fn stable(&self) -> bool {
        self.tracker.stable()
    }
}
