#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas, validation, and tuning persistence for the ventilation
//! controller.
//!
//! - `Config` and sub-structs are deserialized from TOML and validated.
//! - Absent or malformed files fall back to built-in device defaults
//!   (`load_or_default`), so a bad config can never stop the control loop.
//! - Runtime-adjusted level→effect maps persist through `save_tuning` with
//!   an atomic file replace, and reload verbatim via `apply_tuning`.
//! - Sweep-calibration CSV (`rpm,pwm`, strict header) seeds actuator curves.

use std::fs;
use std::io::Write as _;
use std::path::Path;

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};

/// Control-cycle cadence and watchdog arming.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct CycleCfg {
    /// Update cadence in milliseconds.
    pub interval_ms: u64,
    /// Re-arm the hardware watchdog every cycle.
    pub watchdog: bool,
}

impl Default for CycleCfg {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            watchdog: true,
        }
    }
}

/// Fan hardware model selection.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FanProfileName {
    #[default]
    Theoretical,
    VilpeEcoFlow125p700,
}

/// Tachometer acquisition strategy.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum TachKind {
    /// GPIO edge interrupt with software outlier rejection.
    Edge,
    /// Free-running hardware pulse counter with a result FIFO.
    #[default]
    Counter,
}

/// Control-dial device selection.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DialProfileName {
    #[default]
    Percent,
    LapetekVirgola5600xh,
    VilpeEcoIdeal,
}

impl DialProfileName {
    /// Highest level the device can report.
    pub fn max_level(&self) -> i32 {
        match self {
            Self::Percent | Self::VilpeEcoIdeal => 100,
            Self::LapetekVirgola5600xh => 8,
        }
    }
}

/// One manually-dialed control input.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DialCfg {
    /// ADC channel the dial voltage is wired to.
    pub adc_channel: u8,
    pub profile: DialProfileName,
    /// Level→effect pairs. Accepts either an array of pairs
    /// (`[[0, 0], [8, 3030]]`) or an array of tables
    /// (`[{ level = 0, effect = 0 }, ...]`). Empty means "derive from the
    /// profiles".
    #[serde(deserialize_with = "de_level_map")]
    pub level_map: Vec<(i32, i32)>,
}

/// Closed-loop control constants for one fan.
#[derive(Debug, Deserialize, Clone, Copy)]
#[serde(default)]
pub struct ControlCfg {
    pub rpm_threshold: i32,
    pub settle_ms: i64,
    pub drive_step: u16,
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

/// Adaptive-curve seeding and spacing.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CurveCfg {
    /// Seed `(rpm, pwm)` points; empty means "derive from the fan profile".
    #[serde(deserialize_with = "de_level_map")]
    pub points: Vec<(i32, i32)>,
    pub min_dx: i32,
    pub min_dy: i32,
    pub max_points: usize,
}

impl Default for CurveCfg {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            min_dx: 50,
            min_dy: 1_500,
            max_points: 12,
        }
    }
}

/// One fan channel.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FanCfg {
    pub name: String,
    pub profile: FanProfileName,
    pub tach: TachKind,
    pub tach_pin: Option<u8>,
    pub pwm_channel: Option<u8>,
    pub switch_on_pin: Option<u8>,
    pub switch_own_pin: Option<u8>,
    /// No pulse for this long reads as stopped.
    pub tach_timeout_ms: i64,
    pub control: ControlCfg,
    pub curve: CurveCfg,
    pub dial: Option<DialCfg>,
    /// This fan follows the IR kitchen remote.
    pub remote: bool,
    /// Remote level→effect pairs; empty derives a default from the profile.
    #[serde(deserialize_with = "de_level_map")]
    pub remote_map: Vec<(i32, i32)>,
    /// Default TTL for external overrides targeting this fan.
    pub override_ttl_ms: i64,
}

impl Default for FanCfg {
    fn default() -> Self {
        Self {
            name: "fan0".to_owned(),
            profile: FanProfileName::default(),
            tach: TachKind::default(),
            tach_pin: None,
            pwm_channel: None,
            switch_on_pin: None,
            switch_own_pin: None,
            tach_timeout_ms: 2_000,
            control: ControlCfg::default(),
            curve: CurveCfg::default(),
            dial: None,
            remote: false,
            remote_map: Vec::new(),
            override_ttl_ms: 60_000,
        }
    }
}

/// Log output configuration.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    /// Path to a .log file (JSON lines); console only when absent.
    pub file: Option<String>,
    /// "error" | "warn" | "info" | "debug" | "trace".
    pub level: Option<String>,
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never).
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub cycle: CycleCfg,
    pub fans: Vec<FanCfg>,
    pub logging: Logging,
}

impl Config {
    /// Built-in defaults: one theoretical fan with a percent dial.
    pub fn builtin() -> Self {
        Self {
            fans: vec![FanCfg {
                dial: Some(DialCfg::default()),
                ..FanCfg::default()
            }],
            ..Self::default()
        }
    }

    pub fn validate(&self) -> eyre::Result<()> {
        if self.cycle.interval_ms == 0 {
            eyre::bail!("cycle.interval_ms must be >= 1");
        }
        if self.cycle.interval_ms > 10_000 {
            eyre::bail!("cycle.interval_ms is unreasonably large (>10s)");
        }
        if self.fans.is_empty() {
            eyre::bail!("at least one [[fans]] entry is required");
        }
        for (i, fan) in self.fans.iter().enumerate() {
            if fan.name.is_empty() {
                eyre::bail!("fans[{i}].name must not be empty");
            }
            if self.fans[..i].iter().any(|f| f.name == fan.name) {
                eyre::bail!("duplicate fan name {:?}", fan.name);
            }
            if fan.tach_timeout_ms < 1 {
                eyre::bail!("fans[{i}].tach_timeout_ms must be >= 1");
            }
            if fan.control.rpm_threshold < 0 {
                eyre::bail!("fans[{i}].control.rpm_threshold must be >= 0");
            }
            if fan.control.settle_ms < 0 {
                eyre::bail!("fans[{i}].control.settle_ms must be >= 0");
            }
            if fan.control.drive_step == 0 {
                eyre::bail!("fans[{i}].control.drive_step must be >= 1");
            }
            if fan.control.max_drive == 0 {
                eyre::bail!("fans[{i}].control.max_drive must be >= 1");
            }
            validate_curve(&fan.curve, i)?;
            if let Some(dial) = &fan.dial {
                validate_map(&dial.level_map, "dial.level_map", i)?;
            }
            validate_map(&fan.remote_map, "remote_map", i)?;
            if fan.override_ttl_ms < 1 {
                eyre::bail!("fans[{i}].override_ttl_ms must be >= 1");
            }
        }
        Ok(())
    }

    /// Overlay persisted runtime tuning (matched by fan name, verbatim).
    pub fn apply_tuning(&mut self, tuning: &PersistedTuning) {
        for t in &tuning.fans {
            if let Some(fan) = self.fans.iter_mut().find(|f| f.name == t.name) {
                if !t.dial_map.is_empty()
                    && let Some(dial) = fan.dial.as_mut()
                {
                    dial.level_map = t.dial_map.clone();
                }
                if !t.remote_map.is_empty() {
                    fan.remote_map = t.remote_map.clone();
                }
            }
        }
    }
}

fn validate_curve(curve: &CurveCfg, i: usize) -> eyre::Result<()> {
    if curve.min_dx < 1 || curve.min_dy < 1 {
        eyre::bail!("fans[{i}].curve spacing must be >= 1");
    }
    if curve.max_points < 2 {
        eyre::bail!("fans[{i}].curve.max_points must be >= 2");
    }
    if !curve.points.is_empty() {
        if curve.points.len() < 2 {
            eyre::bail!("fans[{i}].curve.points needs at least two points");
        }
        if curve.points.windows(2).any(|w| w[0].0 >= w[1].0) {
            eyre::bail!("fans[{i}].curve.points must have strictly increasing rpm");
        }
        if curve.points.iter().any(|&(_, pwm)| !(0..=65_535).contains(&pwm)) {
            eyre::bail!("fans[{i}].curve.points pwm values must fit 0..=65535");
        }
    }
    Ok(())
}

fn validate_map(map: &[(i32, i32)], what: &str, i: usize) -> eyre::Result<()> {
    if !map.is_empty() && map.windows(2).any(|w| w[0].0 >= w[1].0) {
        eyre::bail!("fans[{i}].{what} must have strictly increasing levels");
    }
    Ok(())
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Load a config file, falling back to the built-in defaults when the file
/// is absent, unreadable, malformed, or invalid. A bad config never stops
/// the control loop.
pub fn load_or_default(path: &Path) -> Config {
    let Ok(text) = fs::read_to_string(path) else {
        return Config::builtin();
    };
    match load_toml(&text) {
        Ok(cfg) if cfg.validate().is_ok() => cfg,
        _ => Config::builtin(),
    }
}

// ── Level-map deserialization ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MapEntryToml {
    Pair((i32, i32)),
    Table { level: i32, effect: i32 },
}

fn de_level_map<'de, D>(deserializer: D) -> Result<Vec<(i32, i32)>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt: Option<Vec<MapEntryToml>> = Option::deserialize(deserializer)?;
    let mut out = Vec::new();
    if let Some(items) = opt {
        for entry in items {
            match entry {
                MapEntryToml::Pair((level, effect)) => out.push((level, effect)),
                MapEntryToml::Table { level, effect } => out.push((level, effect)),
            }
        }
    }
    Ok(out)
}

// ── Runtime tuning persistence ───────────────────────────────────────────────

/// Runtime-adjusted level maps, persisted by fan name.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct PersistedTuning {
    #[serde(default)]
    pub fans: Vec<FanTuning>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct FanTuning {
    pub name: String,
    #[serde(default)]
    pub dial_map: Vec<(i32, i32)>,
    #[serde(default)]
    pub remote_map: Vec<(i32, i32)>,
}

/// Load persisted tuning; `None` on any problem (the built-in maps apply).
pub fn load_tuning(path: &Path) -> Option<PersistedTuning> {
    let text = fs::read_to_string(path).ok()?;
    toml::from_str(&text).ok()
}

/// Persist tuning with an atomic replace so a crash can't truncate it.
pub fn save_tuning(path: &Path, tuning: &PersistedTuning) -> eyre::Result<()> {
    let text = toml::to_string(tuning)
        .map_err(|e| eyre::eyre!("serialize tuning: {e}"))?;
    write_atomic(path, text.as_bytes()).map_err(|e| eyre::eyre!("write {path:?}: {e}"))
}

fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("new");
    {
        let mut f = fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    fs::rename(tmp, path)
}

// ── Sweep-calibration CSV ────────────────────────────────────────────────────

/// Sweep CSV schema.
///
/// Expected headers:
/// rpm,pwm
///
/// Example:
/// rpm,pwm
/// 310,6200
/// 3030,64800
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct CurveRow {
    pub rpm: i32,
    pub pwm: i32,
}

/// Load `(rpm, pwm)` seed points from a sweep CSV with strict headers.
pub fn load_curve_csv(path: &Path) -> eyre::Result<Vec<(i32, i32)>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open curve CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["rpm", "pwm"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "curve CSV must have headers 'rpm,pwm', got: {}",
            actual.join(",")
        );
    }

    let mut points = Vec::new();
    for (idx, rec) in rdr.deserialize::<CurveRow>().enumerate() {
        let row = rec.map_err(|e| eyre::eyre!("invalid CSV row {}: {}", idx + 2, e))?;
        if !(0..=65_535).contains(&row.pwm) {
            eyre::bail!("CSV row {}: pwm {} out of 0..=65535", idx + 2, row.pwm);
        }
        points.push((row.rpm, row.pwm));
    }
    if points.len() < 2 {
        eyre::bail!("curve CSV needs at least two rows, got {}", points.len());
    }
    points.sort_unstable();
    if points.windows(2).any(|w| w[0].0 == w[1].0) {
        eyre::bail!("curve CSV has duplicate rpm values");
    }
    Ok(points)
}
