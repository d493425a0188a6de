//! `From` implementations and helpers bridging `vent_config` types to
//! `vent_core` types, including the profile-derived defaults for empty
//! level maps and curve seeds.

use crate::config::{ControlCfg, CurveCfg, TachCfg};
use crate::quantizer::DialProfile;
use crate::speed::FanProfile;

impl From<&vent_config::ControlCfg> for ControlCfg {
    fn from(c: &vent_config::ControlCfg) -> Self {
        Self {
            rpm_threshold: c.rpm_threshold,
            settle_ms: c.settle_ms,
            drive_step: c.drive_step,
            max_drive: c.max_drive,
        }
    }
}

impl From<&vent_config::FanProfileName> for FanProfile {
    fn from(p: &vent_config::FanProfileName) -> Self {
        match p {
            vent_config::FanProfileName::Theoretical => Self::theoretical(),
            vent_config::FanProfileName::VilpeEcoFlow125p700 => Self::vilpe_eco_flow_125p700(),
        }
    }
}

impl From<&vent_config::DialProfileName> for DialProfile {
    fn from(p: &vent_config::DialProfileName) -> Self {
        match p {
            vent_config::DialProfileName::Percent => Self::Percent,
            vent_config::DialProfileName::LapetekVirgola5600xh => Self::LapetekVirgola5600XH,
            vent_config::DialProfileName::VilpeEcoIdeal => Self::VilpeEcoIdeal,
        }
    }
}

impl From<&vent_config::FanCfg> for TachCfg {
    fn from(c: &vent_config::FanCfg) -> Self {
        Self {
            timeout_ms: c.tach_timeout_ms,
        }
    }
}

/// Curve settings with the seed derived from the fan profile when the config
/// leaves it empty: a straight line from stopped to full drive at max rpm.
pub fn curve_cfg(c: &vent_config::CurveCfg, profile: &FanProfile) -> CurveCfg {
    let seed_points = if c.points.is_empty() {
        vec![(0, 0), (profile.max_rpm as i32, 65_535)]
    } else {
        c.points.clone()
    };
    CurveCfg {
        seed_points,
        min_dx: c.min_dx,
        min_dy: c.min_dy,
        max_points: c.max_points,
    }
}

/// Default dial map: a straight ramp from level 0 to the device's top level
/// at the fan's full speed.
pub fn default_dial_map(max_level: i32, profile: &FanProfile) -> Vec<(i32, i32)> {
    vec![(0, 0), (max_level.max(1), profile.max_rpm as i32)]
}

/// Default remote map: the four hob speed steps spread over the full range.
pub fn default_remote_map(profile: &FanProfile) -> Vec<(i32, i32)> {
    vec![(0, 0), (4, profile.max_rpm as i32)]
}
