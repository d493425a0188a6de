//! Runtime configuration types for the control core.
//!
//! These are the validated structs the controllers run on. They are separate
//! from the TOML-deserialized schema in `vent_config`; see `conversions`.

/// Control constants for one actuator channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlCfg {
    /// Effect error above this many rpm means the drive needs correcting.
    pub rpm_threshold: i32,
    /// The drive must be unchanged this long (ms) before the output counts
    /// as settled.
    pub settle_ms: i64,
    /// Minimum drive delta worth applying; smaller changes are PWM chatter.
    pub drive_step: u16,
    /// Upper clamp for the drive value.
    pub max_drive: u16,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            rpm_threshold: 50,
            settle_ms: 5_000,
            drive_step: 1_000,
            max_drive: u16::MAX,
        }
    }
}

/// Seed shape and eviction spacing for an adaptive curve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurveCfg {
    /// Seed `(effect, drive)` points; the extremes become the fixed
    /// endpoints.
    pub seed_points: Vec<(i32, i32)>,
    /// Minimum x spacing between interior points.
    pub min_dx: i32,
    /// Minimum y spacing between interior points.
    pub min_dy: i32,
    /// Fixed point capacity.
    pub max_points: usize,
}

impl Default for CurveCfg {
    fn default() -> Self {
        Self {
            seed_points: vec![(0, 0), (10_000, 65_535)],
            min_dx: 50,
            min_dy: 1_500,
            max_points: 12,
        }
    }
}

/// Tachometer acquisition constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TachCfg {
    /// No pulse for this long reads as zero speed (under ~30 rpm).
    pub timeout_ms: i64,
}

impl Default for TachCfg {
    fn default() -> Self {
        Self { timeout_ms: 2_000 }
    }
}
