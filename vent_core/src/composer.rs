//! Per-fan demand composition: dial base, IR-remote decay, external
//! override.
//!
//! Sources merge with priority and decay rules rather than a plain max():
//! the remote's demand outlives the remote itself, tapering off over a
//! duration proportional to how long cooking ran, to clear residual vapor.

use vent_traits::clock::Clock;

use crate::curve::interpolate_clamped;
use crate::error::BuildError;
use crate::timewindow::TimeWindow;

/// Static piecewise-linear level→effect mapping, adjustable at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelMap {
    points: Vec<(i32, i32)>,
}

impl LevelMap {
    /// Points must be non-empty with strictly increasing levels.
    pub fn new(points: Vec<(i32, i32)>) -> Result<Self, BuildError> {
        if points.is_empty() || points.windows(2).any(|w| w[0].0 >= w[1].0) {
            return Err(BuildError::BadLevelMap);
        }
        Ok(Self { points })
    }

    pub fn effect_for(&self, level: i32) -> i32 {
        interpolate_clamped(&self.points, level)
    }

    pub fn points(&self) -> &[(i32, i32)] {
        &self.points
    }
}

/// Longest linear decay after cooking stops.
pub const COOK_DECAY_MAX_MS: i64 = 180_000;
/// The decay lasts one fifth of the observed cooking time.
pub const COOK_DECAY_FRACTION: i64 = 5;

/// How an external override transforms the composed demand.
#[derive(Debug, Clone)]
pub enum OverrideMode {
    /// Clamp the demand into `[min, max]`.
    Clamp { min: i32, max: i32 },
    /// Remap the demand through a piecewise-linear curve.
    Remap { map: LevelMap },
}

/// TTL-bounded external (network) demand override.
#[derive(Debug, Clone)]
pub struct ExternalOverride {
    mode: OverrideMode,
    ttl_ms: i64,
    since: TimeWindow,
}

impl ExternalOverride {
    pub fn new(clock: &dyn Clock, mode: OverrideMode, ttl_ms: i64) -> Self {
        Self {
            mode,
            ttl_ms,
            since: TimeWindow::now(clock),
        }
    }

    /// Still inside the TTL; expiry simply stops the override from applying.
    pub fn active(&mut self, clock: &dyn Clock) -> bool {
        self.since.within(clock, 0..=self.ttl_ms)
    }

    pub fn transform(&self, demand: i32) -> i32 {
        match &self.mode {
            OverrideMode::Clamp { min, max } => demand.clamp(*min, *max),
            OverrideMode::Remap { map } => map.effect_for(demand),
        }
    }

    pub fn mode(&self) -> &OverrideMode {
        &self.mode
    }
}

/// Merges the dial base demand with the decaying remote demand for one fan.
#[derive(Debug, Default)]
pub struct DemandComposer {
    cook_started: TimeWindow,
    cook_stopped: TimeWindow,
    cook_demand: i32,
    last_demand: i32,
}

impl DemandComposer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compose this cycle's demand from the dial base and the remote-mapped
    /// effect (zero when the remote is idle).
    pub fn compose(&mut self, clock: &dyn Clock, base: i32, remote_effect: i32) -> i32 {
        let ir = if remote_effect > 0 {
            if !self.cook_started.is_set() {
                self.cook_started = TimeWindow::now(clock);
            }
            self.cook_stopped = TimeWindow::now(clock);
            self.cook_demand = remote_effect;
            remote_effect
        } else {
            self.decayed(clock)
        };
        let demand = base.max(ir);
        self.last_demand = demand;
        demand
    }

    /// Linear taper after cooking stopped: the slope lasts a fifth of the
    /// cooking time, capped at [`COOK_DECAY_MAX_MS`].
    fn decayed(&mut self, clock: &dyn Clock) -> i32 {
        let (Some(total), Some(since_stop)) = (
            self.cook_started.elapsed_ms(clock),
            self.cook_stopped.elapsed_ms(clock),
        ) else {
            return 0;
        };
        let cook_ms = (total - since_stop).max(0);
        let slope_ms = (cook_ms / COOK_DECAY_FRACTION).min(COOK_DECAY_MAX_MS);
        if since_stop >= 0 && since_stop < slope_ms {
            (i64::from(self.cook_demand) * (slope_ms - since_stop) / slope_ms) as i32
        } else {
            self.cook_started = TimeWindow::unset();
            self.cook_stopped = TimeWindow::unset();
            self.cook_demand = 0;
            0
        }
    }

    pub fn last_demand(&self) -> i32 {
        self.last_demand
    }

    /// True while remote demand (live or decaying) is still in play.
    pub fn cooking(&self) -> bool {
        self.cook_started.is_set()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vent_traits::clock::test_clock::TestClock;

    #[test]
    fn level_map_rejects_unsorted_points() {
        assert!(LevelMap::new(vec![]).is_err());
        assert!(LevelMap::new(vec![(0, 0), (0, 10)]).is_err());
        assert!(LevelMap::new(vec![(5, 0), (1, 10)]).is_err());
        assert!(LevelMap::new(vec![(0, 0), (8, 3_030)]).is_ok());
    }

    #[test]
    fn ten_minutes_of_cooking_decays_over_two() {
        let clock = TestClock::new();
        let mut c = DemandComposer::new();
        // Cooking for 10 minutes at demand 2000.
        c.compose(&clock, 0, 2_000);
        clock.advance_ms(600_000);
        c.compose(&clock, 0, 2_000);
        // Remote returns to zero: slope is min(180_000, 600_000 / 5).
        assert_eq!(c.compose(&clock, 0, 0), 2_000);
        clock.advance_ms(60_000);
        assert_eq!(c.compose(&clock, 0, 0), 1_000);
        clock.advance_ms(60_000);
        assert_eq!(c.compose(&clock, 0, 0), 0);
        assert!(!c.cooking());
    }

    #[test]
    fn long_cooking_caps_the_decay_slope() {
        let clock = TestClock::new();
        let mut c = DemandComposer::new();
        c.compose(&clock, 0, 1_200);
        clock.advance_ms(3_600_000); // one hour; slope caps at 180 s
        c.compose(&clock, 0, 1_200);
        clock.advance_ms(90_000); // halfway down the capped slope
        assert_eq!(c.compose(&clock, 0, 0), 600);
    }

    #[test]
    fn base_demand_wins_while_larger() {
        let clock = TestClock::new();
        let mut c = DemandComposer::new();
        assert_eq!(c.compose(&clock, 1_500, 1_000), 1_500);
        assert_eq!(c.compose(&clock, 500, 1_000), 1_000);
    }

    #[test]
    fn override_expires_with_its_ttl() {
        let clock = TestClock::new();
        let mut ov = ExternalOverride::new(&clock, OverrideMode::Clamp { min: 0, max: 800 }, 5_000);
        assert!(ov.active(&clock));
        assert_eq!(ov.transform(2_000), 800);
        clock.advance_ms(5_001);
        assert!(!ov.active(&clock));
    }

    #[test]
    fn remap_override_follows_its_curve() {
        let clock = TestClock::new();
        let map = LevelMap::new(vec![(0, 0), (2_000, 1_000)]).unwrap();
        let mut ov = ExternalOverride::new(&clock, OverrideMode::Remap { map }, 60_000);
        assert!(ov.active(&clock));
        assert_eq!(ov.transform(1_000), 500);
        assert_eq!(ov.transform(3_000), 1_000);
    }
}
