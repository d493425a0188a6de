//! Drive-sweep calibration: ramp the PWM across its range, let the fan
//! settle at each step, and print `rpm,pwm` rows.
//!
//! The output is exactly what `vent_config::load_curve_csv` consumes, so a
//! redirected sweep becomes the seed curve for that fan.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::info;
use vent_config::FanCfg;
use vent_core::{CounterSpeedSensor, FanProfile, SpeedSense};
use vent_hardware::SimulatedFan;
use vent_traits::clock::Clock;
use vent_traits::PwmOutput;

const TICK_MS: u64 = 20;

/// Sweep a simulated fan built from `fan_cfg`. Prints the CSV to stdout.
pub fn run(
    fan_cfg: &FanCfg,
    steps: u32,
    settle_ms: u64,
    clock: Arc<dyn Clock + Send + Sync>,
    shutdown: &AtomicBool,
) -> eyre::Result<()> {
    let profile = FanProfile::from(&fan_cfg.profile);
    let (mut fan, mut pwm, queue) = SimulatedFan::new(profile.max_rpm, profile.stop_rpm);
    let mut sensor = CounterSpeedSensor::new(
        queue,
        profile,
        fan_cfg.into(),
        Arc::clone(&clock),
    );

    info!(name = %fan_cfg.name, steps, settle_ms, "sweep start");
    println!("rpm,pwm");
    let steps = steps.max(1);
    for i in 0..=steps {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        let duty = (u64::from(u16::MAX) * u64::from(i) / u64::from(steps)) as u16;
        pwm.set_duty(duty).map_err(|e| eyre::eyre!("set duty: {e}"))?;

        let mut waited = 0;
        while waited < settle_ms.max(TICK_MS) {
            fan.tick(TICK_MS);
            sensor.update();
            clock.sleep(Duration::from_millis(TICK_MS));
            waited += TICK_MS;
        }
        println!("{},{}", sensor.rpm(), duty);
    }
    info!("sweep done");
    Ok(())
}
