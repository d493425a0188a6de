use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use vent_core::TachCfg;
use vent_core::speed::{
    CounterSpeedSensor, EdgeCapture, EdgeSpeedSensor, FanProfile, SpeedSense, TachShared,
};
use vent_traits::PulseQueue;
use vent_traits::clock::test_clock::TestClock;

/// Pulse queue scripted from the test body; clones share the buffer.
#[derive(Default, Clone)]
struct ScriptQueue {
    q: Arc<Mutex<VecDeque<u32>>>,
}

impl ScriptQueue {
    fn push(&self, period_us: u32) {
        self.q.lock().unwrap().push_back(period_us);
    }

    fn push_pair(&self, period_us: u32) {
        self.push(period_us);
        self.push(period_us);
    }
}

impl PulseQueue for ScriptQueue {
    fn pop_period_us(&mut self) -> Option<u32> {
        self.q.lock().unwrap().pop_front()
    }
    fn len(&self) -> usize {
        self.q.lock().unwrap().len()
    }
}

fn profile() -> FanProfile {
    FanProfile {
        stop_rpm: 0,
        max_rpm: 10_000,
        millivolts_for_max_rpm: 10_000,
        stable_delay_ms: 1_000,
        rpm_stable_threshold: 50,
    }
}

fn counter_sensor(clock: &TestClock) -> (CounterSpeedSensor<ScriptQueue>, ScriptQueue) {
    let q = ScriptQueue::default();
    let s = CounterSpeedSensor::new(q.clone(), profile(), TachCfg::default(), Arc::new(clock.clone()));
    (s, q)
}

#[test]
fn counter_discards_the_second_of_each_pair() {
    let clock = TestClock::new();
    let (mut s, q) = counter_sensor(&clock);

    // First entry of the pair is valid; the second may include stall time.
    q.push(20_000);
    q.push(999_999);
    // First drain only primes the freshness window (the first value after a
    // gap is late).
    s.update();
    assert_eq!(s.rpm(), 0);

    clock.advance_ms(100);
    q.push(20_000);
    q.push(999_999);
    s.update();
    // 60e6 / 20_000 us = 3000 rpm; the 999_999 entries never surface.
    assert_eq!(s.rpm(), 3_000);
}

#[test]
fn counter_times_out_to_zero_speed() {
    let clock = TestClock::new();
    let (mut s, q) = counter_sensor(&clock);

    q.push_pair(20_000);
    s.update();
    clock.advance_ms(100);
    q.push_pair(20_000);
    s.update();
    assert_eq!(s.rpm(), 3_000);

    // No pulses for longer than the timeout: stopped.
    clock.advance_ms(2_001);
    s.update();
    assert_eq!(s.rpm(), 0);
}

#[test]
fn counter_rejects_overlong_periods() {
    let clock = TestClock::new();
    let (mut s, q) = counter_sensor(&clock);

    q.push_pair(20_000);
    s.update();
    clock.advance_ms(100);
    // A period longer than the timeout is a counter-overflow artifact.
    q.push_pair(2_500_000);
    s.update();
    assert_eq!(s.rpm(), 0);
}

#[test]
fn smoothing_averages_seven_to_one() {
    let clock = TestClock::new();
    let (mut s, q) = counter_sensor(&clock);

    q.push_pair(20_000); // 3000 rpm
    s.update();
    clock.advance_ms(100);
    q.push_pair(20_000);
    s.update();
    assert_eq!(s.rpm(), 3_000); // first sample primes directly

    clock.advance_ms(100);
    q.push_pair(10_000); // 6000 rpm raw
    s.update();
    assert_eq!(s.rpm(), (7 * 3_000 + 6_000) / 8);
}

#[test]
fn stability_needs_a_quiet_settle_delay() {
    let clock = TestClock::new();
    let (mut s, q) = counter_sensor(&clock);

    for _ in 0..30 {
        clock.advance_ms(100);
        q.push_pair(20_000);
        s.update();
    }
    // Smoothed rpm converged and the band stopped sliding over a second ago.
    assert_eq!(s.rpm(), 3_000);
    assert!(s.stable());

    // A real speed change breaks stability again.
    for _ in 0..3 {
        clock.advance_ms(100);
        q.push_pair(7_500); // 8000 rpm
        s.update();
    }
    assert!(!s.stable());
}

#[test]
fn edge_sensor_reads_published_periods() {
    let clock = TestClock::new();
    let shared = Arc::new(TachShared::new());
    let mut capture = EdgeCapture::new(Arc::clone(&shared));
    let mut s = EdgeSpeedSensor::new(
        Arc::clone(&shared),
        profile(),
        TachCfg::default(),
        Arc::new(clock.clone()),
    );

    // 20 ms between edges -> 3000 rpm.
    for i in 0..10u64 {
        capture.on_edge(i * 20_000);
    }
    s.update();
    assert_eq!(s.rpm(), 3_000);
    assert_eq!(s.percentage(), 30);

    // Silence past the timeout reads as stopped.
    clock.advance_ms(2_001);
    s.update();
    assert_eq!(s.rpm(), 0);
}

#[test]
fn edge_sensor_ignores_a_single_glitch() {
    let clock = TestClock::new();
    let shared = Arc::new(TachShared::new());
    let mut capture = EdgeCapture::new(Arc::clone(&shared));
    let mut s = EdgeSpeedSensor::new(
        Arc::clone(&shared),
        profile(),
        TachCfg::default(),
        Arc::new(clock.clone()),
    );

    let mut t = 0u64;
    for _ in 0..5 {
        t += 20_000;
        capture.on_edge(t);
    }
    // One 2 ms glitch pulse: the filter drops it and the published period
    // stays at the accepted reference.
    t += 2_000;
    capture.on_edge(t);
    s.update();
    assert_eq!(s.rpm(), 3_000);
}
