//! Test and helper doubles for vent_core.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use vent_traits::PwmOutput;

/// PWM sink that records the last commanded duty and never fails. Clones
/// share the recorded value, so tests can keep a handle while the controller
/// owns the sink.
#[derive(Debug, Default, Clone)]
pub struct SinkPwm {
    duty: Arc<AtomicU32>,
}

impl SinkPwm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_duty(&self) -> u16 {
        self.duty.load(Ordering::Relaxed) as u16
    }
}

impl PwmOutput for SinkPwm {
    fn set_duty(&mut self, duty: u16) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.duty.store(u32::from(duty), Ordering::Relaxed);
        Ok(())
    }
}
