//! Per-cycle orchestration: fan channels and the whole-system update.
//!
//! One [`VentilationControl`] owns the remote state and N fan channels; each
//! channel bundles a speed sensor, a demand composer, an actuator, and its
//! optional dial and enable switches. `update()` runs one bounded-time cycle
//! in dependency order; nothing in it may block longer than its fixed sample
//! counts, so the caller can always re-arm the watchdog in time.

use std::marker::PhantomData;
use std::sync::Arc;

use eyre::WrapErr;
use vent_traits::clock::Clock;
use vent_traits::{AdcInput, PwmOutput, SwitchInput};

use crate::actuator::{ActuatorController, ActuatorInput};
use crate::composer::{DemandComposer, ExternalOverride, LevelMap, OverrideMode};
use crate::config::{ControlCfg, CurveCfg};
use crate::curve::AdaptiveCurve;
use crate::error::{BuildError, Report, Result, VentError};
use crate::hw_error::map_hw_error;
use crate::quantizer::SignalQuantizer;
use crate::remote::{RemoteEvent, RemoteState};
use crate::snapshot::{DialStatus, FanStatus, StateSnapshot};
use crate::speed::SpeedSense;

type BoxedDial = SignalQuantizer<Box<dyn AdcInput>>;

/// One physical fan: sensor, composer, actuator, and its input devices.
pub struct FanChannel {
    name: String,
    sensor: Box<dyn SpeedSense>,
    actuator: ActuatorController<Box<dyn PwmOutput>>,
    composer: DemandComposer,
    dial: Option<BoxedDial>,
    dial_map: LevelMap,
    remote_map: Option<LevelMap>,
    switch_on: Option<Box<dyn SwitchInput>>,
    switch_own: Option<Box<dyn SwitchInput>>,
    override_slot: Option<ExternalOverride>,
    override_ttl_ms: i64,
    target: i32,
    switch_on_state: bool,
    switch_own_state: bool,
}

impl FanChannel {
    pub fn builder(name: impl Into<String>) -> FanChannelBuilder<Missing, Missing> {
        FanChannelBuilder::new(name.into())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dial_map(&self) -> &LevelMap {
        &self.dial_map
    }

    pub fn remote_map(&self) -> Option<&LevelMap> {
        self.remote_map.as_ref()
    }

    fn update(&mut self, clock: &dyn Clock, remote_speed: u8) -> Result<()> {
        self.switch_on_state = read_switch(&mut self.switch_on)?;
        self.switch_own_state = read_switch(&mut self.switch_own)?;

        if let Some(dial) = &mut self.dial {
            dial.update()?;
        }
        let base = self
            .dial
            .as_ref()
            .map_or(0, |d| self.dial_map.effect_for(d.level()));
        let remote_effect = self
            .remote_map
            .as_ref()
            .map_or(0, |m| m.effect_for(i32::from(remote_speed)));
        let mut demand = self.composer.compose(clock, base, remote_effect);

        let keep_override = match self.override_slot.as_mut() {
            Some(ov) => {
                if ov.active(clock) {
                    demand = ov.transform(demand);
                    true
                } else {
                    false
                }
            }
            None => true,
        };
        if !keep_override {
            self.override_slot = None;
        }

        self.sensor.update();
        self.target = demand;

        let enabled = self.switch_on_state && self.switch_own_state;
        self.actuator.apply(ActuatorInput {
            enabled,
            target: (demand > 0).then_some(demand),
            measured: self.sensor.rpm() as i32,
            measured_stable: self.sensor.stable(),
        })
    }

    fn status(&self) -> FanStatus {
        FanStatus {
            name: self.name.clone(),
            rpm: self.sensor.rpm(),
            percentage: self.sensor.percentage(),
            stable: self.sensor.stable(),
            target: self.target,
            drive: self.actuator.drive(),
            switch_on: self.switch_on_state,
            switch_own: self.switch_own_state,
            override_active: self.override_slot.is_some(),
            curve_points: self.actuator.curve().len(),
            dial: self.dial.as_ref().map(|d| DialStatus {
                level: d.level(),
                unit: d.profile().unit(),
                millivolts: d.millivolts(),
                forced: d.forced(),
            }),
        }
    }
}

fn read_switch(sw: &mut Option<Box<dyn SwitchInput>>) -> Result<bool> {
    match sw {
        Some(sw) => sw
            .is_on()
            .map_err(|e| Report::new(map_hw_error(&*e)))
            .wrap_err("reading enable switch"),
        // Without a wired switch the channel stays disabled.
        None => Ok(false),
    }
}

// Type-state markers for the builder.
pub struct Missing;
pub struct Set;

/// Builder for [`FanChannel`]. The sensor and the PWM output are mandatory
/// and tracked in the type state; everything else has defaults.
pub struct FanChannelBuilder<S, P> {
    name: String,
    sensor: Option<Box<dyn SpeedSense>>,
    pwm: Option<Box<dyn PwmOutput>>,
    clock: Option<Arc<dyn Clock + Send + Sync>>,
    control: ControlCfg,
    curve: CurveCfg,
    dial: Option<BoxedDial>,
    dial_map: Option<Vec<(i32, i32)>>,
    remote_map: Option<Vec<(i32, i32)>>,
    switch_on: Option<Box<dyn SwitchInput>>,
    switch_own: Option<Box<dyn SwitchInput>>,
    override_ttl_ms: i64,
    _s: PhantomData<S>,
    _p: PhantomData<P>,
}

impl FanChannelBuilder<Missing, Missing> {
    fn new(name: String) -> Self {
        Self {
            name,
            sensor: None,
            pwm: None,
            clock: None,
            control: ControlCfg::default(),
            curve: CurveCfg::default(),
            dial: None,
            dial_map: None,
            remote_map: None,
            switch_on: None,
            switch_own: None,
            override_ttl_ms: 60_000,
            _s: PhantomData,
            _p: PhantomData,
        }
    }
}

impl<S, P> FanChannelBuilder<S, P> {
    /// Re-tag the type state; fields are unchanged.
    fn retag<S2, P2>(self) -> FanChannelBuilder<S2, P2> {
        FanChannelBuilder {
            name: self.name,
            sensor: self.sensor,
            pwm: self.pwm,
            clock: self.clock,
            control: self.control,
            curve: self.curve,
            dial: self.dial,
            dial_map: self.dial_map,
            remote_map: self.remote_map,
            switch_on: self.switch_on,
            switch_own: self.switch_own,
            override_ttl_ms: self.override_ttl_ms,
            _s: PhantomData,
            _p: PhantomData,
        }
    }

    pub fn with_control(mut self, control: ControlCfg) -> Self {
        self.control = control;
        self
    }

    pub fn with_curve(mut self, curve: CurveCfg) -> Self {
        self.curve = curve;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_dial(mut self, dial: BoxedDial, level_map: Vec<(i32, i32)>) -> Self {
        self.dial = Some(dial);
        self.dial_map = Some(level_map);
        self
    }

    pub fn with_remote_map(mut self, level_map: Vec<(i32, i32)>) -> Self {
        self.remote_map = Some(level_map);
        self
    }

    pub fn with_switches(
        mut self,
        on: Option<Box<dyn SwitchInput>>,
        own: Option<Box<dyn SwitchInput>>,
    ) -> Self {
        self.switch_on = on;
        self.switch_own = own;
        self
    }

    pub fn with_override_ttl_ms(mut self, ttl_ms: i64) -> Self {
        self.override_ttl_ms = ttl_ms;
        self
    }

    /// Fallible build available in any type-state; reports typed errors for
    /// missing pieces.
    pub fn try_build(self) -> Result<FanChannel> {
        let sensor = self
            .sensor
            .ok_or_else(|| Report::new(BuildError::MissingSensor))?;
        let pwm = self.pwm.ok_or_else(|| Report::new(BuildError::MissingPwm))?;
        let clock = self
            .clock
            .ok_or_else(|| Report::new(BuildError::InvalidConfig("missing clock")))?;

        if self.override_ttl_ms < 1 {
            return Err(Report::new(BuildError::InvalidConfig(
                "override ttl must be >= 1 ms",
            )));
        }
        let curve = AdaptiveCurve::new(
            &self.curve.seed_points,
            self.curve.min_dx,
            self.curve.min_dy,
            self.curve.max_points,
        )
        .map_err(Report::new)?;
        let dial_map = LevelMap::new(
            self.dial_map
                .unwrap_or_else(|| vec![(0, 0), (100, 10_000)]),
        )
        .map_err(Report::new)?;
        let remote_map = self.remote_map.map(LevelMap::new).transpose().map_err(Report::new)?;

        Ok(FanChannel {
            name: self.name,
            sensor,
            actuator: ActuatorController::new(pwm, curve, self.control, clock),
            composer: DemandComposer::new(),
            dial: self.dial,
            dial_map,
            remote_map,
            switch_on: self.switch_on,
            switch_own: self.switch_own,
            override_slot: None,
            override_ttl_ms: self.override_ttl_ms,
            target: 0,
            switch_on_state: false,
            switch_own_state: false,
        })
    }
}

impl<P> FanChannelBuilder<Missing, P> {
    pub fn with_sensor(mut self, sensor: impl SpeedSense + 'static) -> FanChannelBuilder<Set, P> {
        self.sensor = Some(Box::new(sensor));
        self.retag()
    }
}

impl<S> FanChannelBuilder<S, Missing> {
    pub fn with_pwm(mut self, pwm: impl PwmOutput + 'static) -> FanChannelBuilder<S, Set> {
        self.pwm = Some(Box::new(pwm));
        self.retag()
    }
}

impl FanChannelBuilder<Set, Set> {
    /// Validate and build. Only available once sensor and PWM are set.
    pub fn build(self) -> Result<FanChannel> {
        self.try_build()
    }
}

/// Runtime-adjustable parameters, validated before any state changes.
#[derive(Debug, Clone)]
pub enum Command {
    SetDialMap { fan: usize, points: Vec<(i32, i32)> },
    SetRemoteMap { fan: usize, points: Vec<(i32, i32)> },
    SetOverride { fan: usize, mode: OverrideMode, ttl_ms: Option<i64> },
    ClearOverride { fan: usize },
    SetControl { fan: usize, control: ControlCfg },
}

/// The whole controller: remote state plus every fan channel.
pub struct VentilationControl {
    clock: Arc<dyn Clock + Send + Sync>,
    remote: RemoteState,
    remote_rx: Option<crossbeam_channel::Receiver<RemoteEvent>>,
    fans: Vec<FanChannel>,
    cycle: u64,
}

impl VentilationControl {
    pub fn new(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        Self {
            clock,
            remote: RemoteState::new(),
            remote_rx: None,
            fans: Vec::new(),
            cycle: 0,
        }
    }

    pub fn add_fan(&mut self, fan: FanChannel) {
        self.fans.push(fan);
    }

    /// Attach the decoded-remote feed; drained non-blockingly every cycle.
    pub fn attach_remote(&mut self, rx: crossbeam_channel::Receiver<RemoteEvent>) {
        self.remote_rx = Some(rx);
    }

    /// Apply one decoded remote event directly.
    pub fn apply_remote(&mut self, event: RemoteEvent) {
        self.remote.apply(&*self.clock, event);
    }

    /// One control cycle. Bounded time: fixed sample counts, non-blocking
    /// drains, no retry loops.
    pub fn update(&mut self) -> Result<()> {
        if let Some(rx) = &self.remote_rx {
            for event in rx.try_iter() {
                self.remote.apply(&*self.clock, event);
            }
        }
        let speed = self.remote.speed();
        for fan in &mut self.fans {
            fan.update(&*self.clock, speed)
                .wrap_err_with(|| format!("updating fan {:?}", fan.name))?;
        }
        self.cycle += 1;
        Ok(())
    }

    /// Cycle-consistent snapshot of every output the core exposes.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            cycle: self.cycle,
            remote_speed: self.remote.speed(),
            remote_light: self.remote.light(),
            fans: self.fans.iter().map(FanChannel::status).collect(),
        }
    }

    pub fn fans(&self) -> &[FanChannel] {
        &self.fans
    }

    /// Apply a runtime command. Invalid commands are rejected with a typed
    /// error and leave the state untouched.
    pub fn apply_command(&mut self, cmd: Command) -> Result<()> {
        match cmd {
            Command::SetDialMap { fan, points } => {
                let map = LevelMap::new(points)
                    .map_err(|e| Report::new(VentError::Command(e.to_string())))?;
                self.fan_mut(fan)?.dial_map = map;
            }
            Command::SetRemoteMap { fan, points } => {
                let map = LevelMap::new(points)
                    .map_err(|e| Report::new(VentError::Command(e.to_string())))?;
                self.fan_mut(fan)?.remote_map = Some(map);
            }
            Command::SetOverride { fan, mode, ttl_ms } => {
                if let Some(ttl) = ttl_ms
                    && ttl < 1
                {
                    return Err(Report::new(VentError::Command(
                        "override ttl must be >= 1 ms".into(),
                    )));
                }
                if let OverrideMode::Clamp { min, max } = &mode
                    && min > max
                {
                    return Err(Report::new(VentError::Command(
                        "override clamp needs min <= max".into(),
                    )));
                }
                let clock = Arc::clone(&self.clock);
                let channel = self.fan_mut(fan)?;
                let ttl = ttl_ms.unwrap_or(channel.override_ttl_ms);
                channel.override_slot = Some(ExternalOverride::new(&*clock, mode, ttl));
            }
            Command::ClearOverride { fan } => {
                self.fan_mut(fan)?.override_slot = None;
            }
            Command::SetControl { fan, control } => {
                if control.rpm_threshold < 0 || control.settle_ms < 0 || control.drive_step == 0 {
                    return Err(Report::new(VentError::Command(
                        "control constants out of range".into(),
                    )));
                }
                self.fan_mut(fan)?.actuator.set_control(control);
            }
        }
        Ok(())
    }

    fn fan_mut(&mut self, index: usize) -> Result<&mut FanChannel> {
        let count = self.fans.len();
        self.fans
            .get_mut(index)
            .ok_or_else(|| {
                Report::new(VentError::Command(format!(
                    "fan index {index} out of range (have {count})"
                )))
            })
    }
}
