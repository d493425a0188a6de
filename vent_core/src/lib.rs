#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Core control logic for the multi-fan ventilation controller
//! (hardware-agnostic).
//!
//! All hardware interactions go through the seam traits in `vent_traits`.
//!
//! ## Architecture
//!
//! - **TimeWindow**: wraparound-safe elapsed-time and validity windows
//! - **AdaptiveCurve**: self-correcting effect→drive lookup table
//! - **SpeedSensor**: smoothed, stability-flagged tachometer readings
//!   (edge-interrupt and hardware pulse-counter variants)
//! - **SignalQuantizer**: analog dial to discrete level, per-device rules
//! - **ActuatorController**: closed PWM loop feeding confirmed plateaus back
//!   into the curve
//! - **DemandComposer**: dial / IR-remote-decay / network-override merge
//! - **System**: per-cycle orchestration and the status snapshot
//!
//! ## Integer arithmetic
//!
//! Control math is integer-only (rpm, millivolts, PWM duty) for deterministic
//! behavior. Formulas that subtract before dividing use floor division so
//! edge levels stay correct for negative intermediates
//! (see `util::div_floor_i64`).

pub mod actuator;
pub mod composer;
pub mod config;
pub mod conversions;
pub mod curve;
pub mod error;
pub mod hw_error;
pub mod mocks;
pub mod quantizer;
pub mod remote;
pub mod snapshot;
pub mod speed;
pub mod system;
pub mod timewindow;
pub mod util;

pub use actuator::{ActuatorController, ActuatorInput};
pub use composer::{DemandComposer, ExternalOverride, LevelMap, OverrideMode};
pub use config::{ControlCfg, CurveCfg, TachCfg};
pub use curve::AdaptiveCurve;
pub use error::{BuildError, VentError};
pub use quantizer::{DialProfile, SignalQuantizer};
pub use remote::{RemoteEvent, RemoteState};
pub use snapshot::{DialStatus, FanStatus, StateSnapshot};
pub use speed::{
    CounterSpeedSensor, EdgeCapture, EdgeFilter, EdgeSpeedSensor, FanProfile, SpeedSense,
    TachShared,
};
pub use system::{Command, FanChannel, VentilationControl};
pub use timewindow::{TimeWindow, Validity};
