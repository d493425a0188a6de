//! Read-only, cycle-consistent state snapshot.
//!
//! Taken between update cycles, so consumers never observe a partial cycle.
//! Serializes to JSON as-is, flattens to dotted key/value pairs for
//! key/value stores, and renders as the multi-line human status block.

use std::fmt;

use serde::Serialize;

/// Dial diagnostics for one fan channel.
#[derive(Debug, Clone, Serialize)]
pub struct DialStatus {
    pub level: i32,
    pub unit: &'static str,
    pub millivolts: i64,
    /// The device-specific hysteresis override is currently in effect.
    pub forced: bool,
}

/// One fan channel's outputs for the cycle.
#[derive(Debug, Clone, Serialize)]
pub struct FanStatus {
    pub name: String,
    pub rpm: u32,
    pub percentage: u32,
    pub stable: bool,
    /// Composed target effect handed to the actuator this cycle.
    pub target: i32,
    pub drive: u16,
    pub switch_on: bool,
    pub switch_own: bool,
    pub override_active: bool,
    pub curve_points: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dial: Option<DialStatus>,
}

/// Whole-system snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub cycle: u64,
    pub remote_speed: u8,
    pub remote_light: bool,
    pub fans: Vec<FanStatus>,
}

impl StateSnapshot {
    /// Flatten to dotted `(key, value)` pairs, e.g. `fan0.rpm`.
    pub fn flat(&self) -> Vec<(String, String)> {
        let mut kv = vec![
            ("cycle".to_owned(), self.cycle.to_string()),
            ("remote.speed".to_owned(), self.remote_speed.to_string()),
            (
                "remote.light".to_owned(),
                u8::from(self.remote_light).to_string(),
            ),
        ];
        for (i, fan) in self.fans.iter().enumerate() {
            let mut push = |k: &str, v: String| kv.push((format!("fan{i}.{k}"), v));
            push("name", fan.name.clone());
            push("rpm", fan.rpm.to_string());
            push("percentage", fan.percentage.to_string());
            push("stable", u8::from(fan.stable).to_string());
            push("target", fan.target.to_string());
            push("drive", fan.drive.to_string());
            push("switch_on", u8::from(fan.switch_on).to_string());
            push("switch_own", u8::from(fan.switch_own).to_string());
            push("override", u8::from(fan.override_active).to_string());
            push("curve_points", fan.curve_points.to_string());
            if let Some(dial) = &fan.dial {
                push("dial.level", dial.level.to_string());
                push("dial.millivolts", dial.millivolts.to_string());
                push("dial.forced", u8::from(dial.forced).to_string());
            }
        }
        kv
    }
}

impl fmt::Display for StateSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "cycle {}  remote speed {}  light {}",
            self.cycle,
            self.remote_speed,
            if self.remote_light { "on" } else { "off" }
        )?;
        for fan in &self.fans {
            write!(
                f,
                "{}: {} rpm ({} %){} target {} drive {} switches {}/{}{}",
                fan.name,
                fan.rpm,
                fan.percentage,
                if fan.stable { " stable" } else { "" },
                fan.target,
                fan.drive,
                u8::from(fan.switch_on),
                u8::from(fan.switch_own),
                if fan.override_active {
                    " [override]"
                } else {
                    ""
                },
            )?;
            if let Some(dial) = &fan.dial {
                write!(
                    f,
                    "  dial {}{} {} mV{}",
                    dial.level,
                    dial.unit,
                    dial.millivolts,
                    if dial.forced { " (forced)" } else { "" },
                )?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StateSnapshot {
        StateSnapshot {
            cycle: 7,
            remote_speed: 2,
            remote_light: true,
            fans: vec![FanStatus {
                name: "kitchen".into(),
                rpm: 1_520,
                percentage: 50,
                stable: true,
                target: 1_500,
                drive: 23_000,
                switch_on: true,
                switch_own: true,
                override_active: false,
                curve_points: 3,
                dial: Some(DialStatus {
                    level: 5,
                    unit: "/8",
                    millivolts: 6_720,
                    forced: false,
                }),
            }],
        }
    }

    #[test]
    fn flat_keys_are_dotted_and_indexed() {
        let kv = sample().flat();
        let get = |k: &str| {
            kv.iter()
                .find(|(key, _)| key == k)
                .map(|(_, v)| v.clone())
                .unwrap_or_else(|| panic!("missing key {k}"))
        };
        assert_eq!(get("cycle"), "7");
        assert_eq!(get("fan0.rpm"), "1520");
        assert_eq!(get("fan0.dial.level"), "5");
        assert_eq!(get("remote.light"), "1");
    }

    #[test]
    fn display_block_mentions_every_fan() {
        let text = sample().to_string();
        assert!(text.contains("kitchen"));
        assert!(text.contains("1520 rpm"));
        assert!(text.contains("dial 5/8"));
    }
}
