use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use vent_core::{DialProfile, SignalQuantizer};
use vent_traits::AdcInput;
use vent_traits::clock::test_clock::TestClock;

/// ADC whose raw value the test sets; clones share it.
#[derive(Default, Clone)]
struct ScriptAdc {
    raw: Arc<AtomicU32>,
}

impl ScriptAdc {
    fn set_millivolts(&self, mv: u32) {
        // Inverse of max(0, (adc - 145) * 9831 / 54034).
        let raw = (u64::from(mv) * 54_034).div_ceil(9_831) + 145;
        self.raw.store(raw.min(0xffff) as u32, Ordering::Relaxed);
    }
}

impl AdcInput for ScriptAdc {
    fn read_u16(&mut self) -> Result<u16, Box<dyn Error + Send + Sync>> {
        Ok(self.raw.load(Ordering::Relaxed) as u16)
    }
}

fn quantizer(profile: DialProfile, clock: &TestClock) -> (SignalQuantizer<ScriptAdc>, ScriptAdc) {
    let adc = ScriptAdc::default();
    let q = SignalQuantizer::new(adc.clone(), profile, Arc::new(clock.clone()));
    (q, adc)
}

#[test]
fn level_follows_the_dial() {
    let clock = TestClock::new();
    let (mut q, adc) = quantizer(DialProfile::LapetekVirgola5600XH, &clock);

    adc.set_millivolts(6_720);
    q.update().unwrap();
    assert_eq!(q.level(), 5);
    assert!((6_700..=6_740).contains(&q.millivolts()), "{}", q.millivolts());
    assert!(!q.forced());

    adc.set_millivolts(2_450);
    q.update().unwrap();
    assert_eq!(q.level(), 2);
}

#[test]
fn stuck_hood_level_is_forced_down_after_90_minutes() {
    let clock = TestClock::new();
    let (mut q, adc) = quantizer(DialProfile::LapetekVirgola5600XH, &clock);

    adc.set_millivolts(6_720); // level 5
    q.update().unwrap();
    assert_eq!(q.level(), 5);

    // Unchanged just short of the window: still honest.
    clock.advance_ms(5_400_000);
    q.update().unwrap();
    assert_eq!(q.level(), 5);
    assert!(!q.forced());

    // Past it: the known-stuck device is no longer trusted.
    clock.advance_ms(1);
    q.update().unwrap();
    assert_eq!(q.level(), 1);
    assert!(q.forced());
    assert_eq!(q.measured_level(), Some(5));

    // A real dial movement clears the override.
    adc.set_millivolts(10_700); // level 8
    q.update().unwrap();
    assert_eq!(q.level(), 8);
    assert!(!q.forced());
}

#[test]
fn percent_dial_never_forces() {
    let clock = TestClock::new();
    let (mut q, adc) = quantizer(DialProfile::Percent, &clock);

    adc.set_millivolts(5_000);
    q.update().unwrap();
    assert_eq!(q.level(), 50);
    clock.advance_ms(10_000_000);
    q.update().unwrap();
    assert_eq!(q.level(), 50);
    assert!(!q.forced());
}

#[test]
fn oversampling_averages_out_to_the_same_level() {
    // Constant input: 16-sample averaging must be an identity here.
    let clock = TestClock::new();
    let (mut q, adc) = quantizer(DialProfile::VilpeEcoIdeal, &clock);
    adc.set_millivolts(1_890);
    q.update().unwrap();
    assert_eq!(q.level(), 10);
    assert_eq!(q.profile().unit(), "%");
}
