//! Simulated devices for tests and the default (non-Pi) build.
//!
//! [`SimulatedFan`] is a small first-order fan model: it follows the PWM
//! duty with lag, stalls below the profile's minimum speed, and feeds tach
//! pulse periods into its queue in the pairs a free-running counter FIFO
//! would produce.

use std::collections::VecDeque;
use std::error::Error;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use vent_traits::{AdcInput, PulseQueue, PwmOutput, SwitchInput, Watchdog};

/// Simulated PWM output; clones share the duty value.
#[derive(Debug, Default, Clone)]
pub struct SimulatedPwm {
    duty: Arc<AtomicU32>,
}

impl SimulatedPwm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn duty(&self) -> u16 {
        self.duty.load(Ordering::Relaxed) as u16
    }
}

impl PwmOutput for SimulatedPwm {
    fn set_duty(&mut self, duty: u16) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.duty.store(u32::from(duty), Ordering::Relaxed);
        Ok(())
    }
}

/// Simulated pulse-period FIFO; clones share the queue.
#[derive(Debug, Default, Clone)]
pub struct SimulatedPulseQueue {
    queue: Arc<Mutex<VecDeque<u32>>>,
}

impl SimulatedPulseQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_period_us(&self, period_us: u32) {
        if let Ok(mut q) = self.queue.lock() {
            q.push_back(period_us);
        }
    }
}

impl PulseQueue for SimulatedPulseQueue {
    fn pop_period_us(&mut self) -> Option<u32> {
        self.queue.lock().ok().and_then(|mut q| q.pop_front())
    }

    fn len(&self) -> usize {
        self.queue.lock().map(|q| q.len()).unwrap_or(0)
    }
}

/// Simulated raw ADC; clones share the value.
#[derive(Debug, Default, Clone)]
pub struct SimulatedAdc {
    raw: Arc<AtomicU32>,
}

impl SimulatedAdc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_raw(&self, raw: u16) {
        self.raw.store(u32::from(raw), Ordering::Relaxed);
    }

    /// Set the raw value so the divider conversion
    /// `max(0, (adc - 145) * 9831 / 54034)` lands exactly on `mv`.
    pub fn set_millivolts(&self, mv: u32) {
        let raw = (u64::from(mv) * 54_034).div_ceil(9_831) + 145;
        self.set_raw(raw.min(0xffff) as u16);
    }
}

impl AdcInput for SimulatedAdc {
    fn read_u16(&mut self) -> Result<u16, Box<dyn Error + Send + Sync>> {
        Ok(self.raw.load(Ordering::Relaxed) as u16)
    }
}

/// Simulated enable switch; clones share the state.
#[derive(Debug, Clone)]
pub struct SimulatedSwitch {
    on: Arc<AtomicBool>,
}

impl SimulatedSwitch {
    pub fn new(on: bool) -> Self {
        Self {
            on: Arc::new(AtomicBool::new(on)),
        }
    }

    pub fn set(&self, on: bool) {
        self.on.store(on, Ordering::Relaxed);
    }
}

impl SwitchInput for SimulatedSwitch {
    fn is_on(&mut self) -> Result<bool, Box<dyn Error + Send + Sync>> {
        Ok(self.on.load(Ordering::Relaxed))
    }
}

/// Simulated watchdog that counts feeds.
#[derive(Debug, Default, Clone)]
pub struct SimulatedWatchdog {
    feeds: Arc<AtomicU32>,
}

impl SimulatedWatchdog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feeds(&self) -> u32 {
        self.feeds.load(Ordering::Relaxed)
    }
}

impl Watchdog for SimulatedWatchdog {
    fn feed(&mut self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.feeds.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// First-order fan model driving a pulse queue from a PWM duty.
pub struct SimulatedFan {
    pwm: SimulatedPwm,
    queue: SimulatedPulseQueue,
    max_rpm: u32,
    stall_rpm: u32,
    rpm: i64,
}

impl SimulatedFan {
    /// Returns the fan plus handles to its PWM input and tach output.
    pub fn new(max_rpm: u32, stall_rpm: u32) -> (Self, SimulatedPwm, SimulatedPulseQueue) {
        let pwm = SimulatedPwm::new();
        let queue = SimulatedPulseQueue::new();
        let fan = Self {
            pwm: pwm.clone(),
            queue: queue.clone(),
            max_rpm,
            stall_rpm,
            rpm: 0,
        };
        (fan, pwm, queue)
    }

    pub fn rpm(&self) -> u32 {
        self.rpm.max(0) as u32
    }

    /// Advance the model by `dt_ms` and emit tach pulses.
    pub fn tick(&mut self, dt_ms: u64) {
        let duty = i64::from(self.pwm.duty());
        let mut target = i64::from(self.max_rpm) * duty / 65_535;
        if target < i64::from(self.stall_rpm) {
            target = 0;
        }
        // First-order lag with a ~500 ms time constant.
        let dt = dt_ms.min(10_000) as i64;
        self.rpm += (target - self.rpm) * dt / (500 + dt);
        if target == 0 && self.rpm < i64::from(self.stall_rpm) {
            self.rpm = 0;
        }
        if self.rpm > 0 {
            let period = (60_000_000 / self.rpm.max(1)) as u32;
            // The counter FIFO hands results over in pairs; the consumer
            // keeps the first of each pair.
            self.queue.push_period_us(period);
            self.queue.push_period_us(period);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fan_spins_up_toward_the_duty_target() {
        let (mut fan, mut pwm, queue) = SimulatedFan::new(3_030, 270);
        pwm.set_duty(u16::MAX).unwrap();
        for _ in 0..50 {
            fan.tick(100);
        }
        assert!(fan.rpm() > 2_900, "rpm {}", fan.rpm());
        assert!(queue.len() >= 2);
    }

    #[test]
    fn fan_stalls_below_minimum() {
        let (mut fan, mut pwm, _queue) = SimulatedFan::new(3_030, 270);
        pwm.set_duty(1_000).unwrap(); // ~46 rpm target, below stall
        for _ in 0..50 {
            fan.tick(100);
        }
        assert_eq!(fan.rpm(), 0);
    }

    #[test]
    fn adc_millivolt_helper_round_trips() {
        let adc = SimulatedAdc::new();
        adc.set_millivolts(6_720);
        let raw = i64::from(adc.raw.load(Ordering::Relaxed));
        let mv = ((raw - 145) * 9_831).div_euclid(54_034).max(0);
        assert_eq!(mv, 6_720);
    }
}
