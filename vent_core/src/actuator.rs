//! Closed-loop PWM drive control with online curve learning.
//!
//! Each cycle the controller compares the composed target effect against the
//! measured effect, looks the correction up in its [`AdaptiveCurve`], and
//! nudges the PWM duty. Confirmed steady-state `(effect, drive)` plateaus
//! are fed back into the curve so the estimate keeps tracking the real fan.

use std::sync::Arc;

use eyre::WrapErr;
use vent_traits::PwmOutput;
use vent_traits::clock::Clock;

use crate::config::ControlCfg;
use crate::curve::AdaptiveCurve;
use crate::error::{Report, Result};
use crate::hw_error::map_hw_error;
use crate::timewindow::TimeWindow;

/// Per-cycle inputs for [`ActuatorController::apply`].
#[derive(Debug, Clone, Copy)]
pub struct ActuatorInput {
    /// Both physical enable switches are on.
    pub enabled: bool,
    /// Composed demand; `None` means no demand this cycle.
    pub target: Option<i32>,
    /// Measured effect (rpm).
    pub measured: i32,
    /// The speed sensor's stability flag.
    pub measured_stable: bool,
}

pub struct ActuatorController<P: PwmOutput> {
    pwm: P,
    curve: AdaptiveCurve,
    control: ControlCfg,
    clock: Arc<dyn Clock + Send + Sync>,
    drive: u16,
    drive_changed: TimeWindow,
    plateau_recorded: bool,
    output_stable: bool,
}

impl<P: PwmOutput> ActuatorController<P> {
    pub fn new(
        pwm: P,
        curve: AdaptiveCurve,
        control: ControlCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Self {
        Self {
            pwm,
            curve,
            control,
            clock,
            drive: 0,
            drive_changed: TimeWindow::unset(),
            plateau_recorded: false,
            output_stable: false,
        }
    }

    /// One control step.
    pub fn apply(&mut self, inp: ActuatorInput) -> Result<()> {
        let Some(target) = inp.target.filter(|&t| inp.enabled && t > 0) else {
            // Disabled or no demand: the fan must not run and the curve must
            // not learn from this state.
            return self.shut_down();
        };

        let measured = inp.measured;
        let effect_wrong = (target - measured).abs() > self.control.rpm_threshold;
        let settled = !self
            .drive_changed
            .within(&*self.clock, 0..=self.control.settle_ms);
        self.output_stable = inp.measured_stable && settled;

        if self.output_stable && !self.plateau_recorded {
            self.curve.add_point(measured, i32::from(self.drive), true);
            self.plateau_recorded = true;
            tracing::debug!(measured, drive = self.drive, "recorded curve plateau");
        }

        if !effect_wrong {
            return Ok(());
        }

        let mut new_drive = i64::from(
            self.curve
                .value_at(target)
                .clamp(0, i32::from(self.control.max_drive)),
        );
        if measured == 0 {
            // A stalled fan needs more than the linear estimate to overcome
            // static friction; never lower the drive, and once the stall is
            // confirmed stable push well past the current duty.
            new_drive = new_drive.max(i64::from(self.drive));
            if self.output_stable {
                let boosted = (i64::from(self.drive) + i64::from(self.control.drive_step))
                    .max(i64::from(self.drive) * 2);
                new_drive = new_drive.max(boosted.min(i64::from(self.control.max_drive)));
            }
        }
        let new_drive = new_drive as i32;

        if (new_drive - i32::from(self.drive)).unsigned_abs() > u32::from(self.control.drive_step) {
            self.drive = new_drive as u16;
            let duty = self.drive;
            self.set_duty(duty)?;
            self.drive_changed = TimeWindow::now(&*self.clock);
            self.plateau_recorded = false;
            tracing::trace!(target, measured, duty, "drive updated");
        }
        Ok(())
    }

    fn shut_down(&mut self) -> Result<()> {
        self.drive_changed = TimeWindow::unset();
        self.plateau_recorded = false;
        self.output_stable = false;
        if self.drive != 0 {
            self.drive = 0;
            self.set_duty(0)?;
        }
        Ok(())
    }

    fn set_duty(&mut self, duty: u16) -> Result<()> {
        self.pwm
            .set_duty(duty)
            .map_err(|e| Report::new(map_hw_error(&*e)))
            .wrap_err("set pwm duty")
    }

    pub fn drive(&self) -> u16 {
        self.drive
    }

    pub fn output_stable(&self) -> bool {
        self.output_stable
    }

    pub fn curve(&self) -> &AdaptiveCurve {
        &self.curve
    }

    pub fn control(&self) -> &ControlCfg {
        &self.control
    }

    pub fn set_control(&mut self, control: ControlCfg) {
        self.control = control;
    }

    /// Replace the learned curve (e.g. after importing sweep calibration).
    pub fn set_curve(&mut self, curve: AdaptiveCurve) {
        self.curve = curve;
        self.plateau_recorded = false;
    }
}
