//! Hardware implementations of the `vent_traits` seams.
//!
//! Simulated devices are always available and drive the default build; real
//! Raspberry Pi peripherals (rppal) live behind the `hardware` feature.

pub mod error;
pub mod sim;

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod pi;

pub use sim::{
    SimulatedAdc, SimulatedFan, SimulatedPulseQueue, SimulatedPwm, SimulatedSwitch,
    SimulatedWatchdog,
};
