//! Decoded kitchen-remote state.
//!
//! The IR receiver and its code table belong to a collaborator; the core
//! consumes already-decoded events and tracks the latest speed/light state
//! with change timestamps.

use vent_traits::clock::Clock;

use crate::timewindow::TimeWindow;

/// One decoded remote event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteEvent {
    /// Requested hood fan speed step, 0-4.
    Speed(u8),
    /// Hood light switched on or off.
    Light(bool),
}

/// Latest remote-reported speed and light, with change windows.
#[derive(Debug, Default)]
pub struct RemoteState {
    speed: u8,
    light: bool,
    speed_changed: TimeWindow,
    light_changed: TimeWindow,
}

impl RemoteState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, clock: &dyn Clock, event: RemoteEvent) {
        match event {
            RemoteEvent::Light(on) => {
                self.light_changed = TimeWindow::now(clock);
                self.light = on;
                if !on {
                    // Light off means the hob is done; don't leave the fan
                    // racing on a stale speed.
                    self.speed = 0;
                    self.speed_changed = TimeWindow::now(clock);
                }
            }
            RemoteEvent::Speed(s) => {
                self.speed = s.min(4);
                self.speed_changed = TimeWindow::now(clock);
            }
        }
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }

    pub fn light(&self) -> bool {
        self.light
    }

    pub fn speed_changed(&self) -> TimeWindow {
        self.speed_changed
    }

    pub fn light_changed(&self) -> TimeWindow {
        self.light_changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vent_traits::clock::test_clock::TestClock;

    #[test]
    fn light_off_also_stops_the_fan() {
        let clock = TestClock::new();
        let mut r = RemoteState::new();
        r.apply(&clock, RemoteEvent::Speed(3));
        r.apply(&clock, RemoteEvent::Light(true));
        assert_eq!(r.speed(), 3);
        r.apply(&clock, RemoteEvent::Light(false));
        assert_eq!(r.speed(), 0);
        assert!(!r.light());
    }

    #[test]
    fn speed_is_clamped_to_the_code_range() {
        let clock = TestClock::new();
        let mut r = RemoteState::new();
        r.apply(&clock, RemoteEvent::Speed(9));
        assert_eq!(r.speed(), 4);
    }
}
