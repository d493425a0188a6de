//! Config→system assembly: wires the seam devices to the control core.
//!
//! The default build runs every channel against the simulated devices; the
//! `hardware` feature swaps in the Raspberry Pi peripherals.

use std::sync::Arc;
use std::time::Duration;

use eyre::WrapErr;
use tracing::{debug, info};
use vent_config::Config;
use vent_core::conversions::{curve_cfg, default_dial_map, default_remote_map};
use vent_core::{
    CounterSpeedSensor, DialProfile, FanChannel, FanProfile, SignalQuantizer, VentilationControl,
};
use vent_hardware::{SimulatedAdc, SimulatedFan, SimulatedSwitch, SimulatedWatchdog};
use vent_traits::clock::Clock;
use vent_traits::{AdcInput, Watchdog};

pub struct App {
    pub system: VentilationControl,
    pub watchdog: Option<Box<dyn Watchdog>>,
    pub interval: Duration,
    /// Simulated fan models to advance each cycle (empty on real hardware).
    pub sim_fans: Vec<SimulatedFan>,
    #[cfg(all(feature = "hardware", target_os = "linux"))]
    pub edge_inputs: Vec<vent_hardware::pi::PiEdgeInput>,
}

impl App {
    /// Advance the simulated plant; no-op on real hardware.
    pub fn tick_sim(&mut self, dt_ms: u64) {
        for fan in &mut self.sim_fans {
            fan.tick(dt_ms);
        }
    }
}

/// Build the whole system from a validated config.
pub fn build(cfg: &Config, clock: Arc<dyn Clock + Send + Sync>) -> eyre::Result<App> {
    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        build_hardware(cfg, clock)
    }
    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    {
        build_sim(cfg, clock)
    }
}

fn build_sim(cfg: &Config, clock: Arc<dyn Clock + Send + Sync>) -> eyre::Result<App> {
    let mut system = VentilationControl::new(Arc::clone(&clock));
    let mut sim_fans = Vec::new();

    for fan_cfg in &cfg.fans {
        let profile = FanProfile::from(&fan_cfg.profile);
        let (sim, pwm, queue) = SimulatedFan::new(profile.max_rpm, profile.stop_rpm);
        let sensor = CounterSpeedSensor::new(
            queue,
            profile.clone(),
            fan_cfg.into(),
            Arc::clone(&clock),
        );

        let mut builder = FanChannel::builder(&fan_cfg.name)
            .with_sensor(sensor)
            .with_pwm(pwm)
            .with_clock(Arc::clone(&clock))
            .with_control((&fan_cfg.control).into())
            .with_curve(curve_cfg(&fan_cfg.curve, &profile))
            .with_override_ttl_ms(fan_cfg.override_ttl_ms)
            .with_switches(
                Some(Box::new(SimulatedSwitch::new(true))),
                Some(Box::new(SimulatedSwitch::new(true))),
            );

        if let Some(dial_cfg) = &fan_cfg.dial {
            let adc = SimulatedAdc::new();
            // Park the simulated dial at half scale so the demo moves air.
            adc.set_millivolts(5_000);
            let dial = SignalQuantizer::new(
                Box::new(adc) as Box<dyn AdcInput>,
                DialProfile::from(&dial_cfg.profile),
                Arc::clone(&clock),
            );
            let map = if dial_cfg.level_map.is_empty() {
                default_dial_map(dial_cfg.profile.max_level(), &profile)
            } else {
                dial_cfg.level_map.clone()
            };
            builder = builder.with_dial(dial, map);
        }
        if fan_cfg.remote {
            let map = if fan_cfg.remote_map.is_empty() {
                default_remote_map(&profile)
            } else {
                fan_cfg.remote_map.clone()
            };
            builder = builder.with_remote_map(map);
        }

        let channel = builder
            .build()
            .wrap_err_with(|| format!("building fan {:?}", fan_cfg.name))?;
        system.add_fan(channel);
        sim_fans.push(sim);
        debug!(name = %fan_cfg.name, "simulated fan channel ready");
    }

    let watchdog: Option<Box<dyn Watchdog>> = cfg
        .cycle
        .watchdog
        .then(|| Box::new(SimulatedWatchdog::new()) as Box<dyn Watchdog>);

    info!(fans = cfg.fans.len(), "simulated system assembled");
    Ok(App {
        system,
        watchdog,
        interval: Duration::from_millis(cfg.cycle.interval_ms),
        sim_fans,
        #[cfg(all(feature = "hardware", target_os = "linux"))]
        edge_inputs: Vec::new(),
    })
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn build_hardware(cfg: &Config, clock: Arc<dyn Clock + Send + Sync>) -> eyre::Result<App> {
    use vent_core::{EdgeCapture, EdgeSpeedSensor, TachShared};
    use vent_hardware::pi::{Mcp3008, PiEdgeInput, PiPwm, PiSwitch, PiWatchdog};
    use vent_traits::SwitchInput;

    let mut system = VentilationControl::new(Arc::clone(&clock));
    let mut edge_inputs = Vec::new();

    for fan_cfg in &cfg.fans {
        let profile = FanProfile::from(&fan_cfg.profile);
        let pin = fan_cfg
            .tach_pin
            .ok_or_else(|| eyre::eyre!("fan {:?} needs tach_pin on hardware", fan_cfg.name))?;
        let pwm_channel = fan_cfg
            .pwm_channel
            .ok_or_else(|| eyre::eyre!("fan {:?} needs pwm_channel on hardware", fan_cfg.name))?;

        // The Pi has no free-running pulse counter; both tach kinds read
        // through the edge interrupt here.
        if fan_cfg.tach == vent_config::TachKind::Counter {
            tracing::warn!(name = %fan_cfg.name, "counter tach unavailable on this board; using edge interrupt");
        }
        let shared = Arc::new(TachShared::new());
        let mut capture = EdgeCapture::new(Arc::clone(&shared));
        edge_inputs.push(PiEdgeInput::new(pin, move |ts_us| capture.on_edge(ts_us))?);
        let sensor = EdgeSpeedSensor::new(
            shared,
            profile.clone(),
            fan_cfg.into(),
            Arc::clone(&clock),
        );

        let switch = |pin: Option<u8>| -> eyre::Result<Option<Box<dyn SwitchInput>>> {
            Ok(match pin {
                Some(p) => Some(Box::new(PiSwitch::new(p)?)),
                None => None,
            })
        };

        let mut builder = FanChannel::builder(&fan_cfg.name)
            .with_sensor(sensor)
            .with_pwm(PiPwm::new(pwm_channel)?)
            .with_clock(Arc::clone(&clock))
            .with_control((&fan_cfg.control).into())
            .with_curve(curve_cfg(&fan_cfg.curve, &profile))
            .with_override_ttl_ms(fan_cfg.override_ttl_ms)
            .with_switches(switch(fan_cfg.switch_on_pin)?, switch(fan_cfg.switch_own_pin)?);

        if let Some(dial_cfg) = &fan_cfg.dial {
            let dial = SignalQuantizer::new(
                Box::new(Mcp3008::new(dial_cfg.adc_channel)?) as Box<dyn AdcInput>,
                DialProfile::from(&dial_cfg.profile),
                Arc::clone(&clock),
            );
            let map = if dial_cfg.level_map.is_empty() {
                default_dial_map(dial_cfg.profile.max_level(), &profile)
            } else {
                dial_cfg.level_map.clone()
            };
            builder = builder.with_dial(dial, map);
        }
        if fan_cfg.remote {
            let map = if fan_cfg.remote_map.is_empty() {
                default_remote_map(&profile)
            } else {
                fan_cfg.remote_map.clone()
            };
            builder = builder.with_remote_map(map);
        }

        system.add_fan(
            builder
                .build()
                .wrap_err_with(|| format!("building fan {:?}", fan_cfg.name))?,
        );
    }

    let watchdog: Option<Box<dyn Watchdog>> = if cfg.cycle.watchdog {
        Some(Box::new(PiWatchdog::open()?))
    } else {
        None
    };

    info!(fans = cfg.fans.len(), "hardware system assembled");
    Ok(App {
        system,
        watchdog,
        interval: Duration::from_millis(cfg.cycle.interval_ms),
        sim_fans: Vec::new(),
        edge_inputs,
    })
}
