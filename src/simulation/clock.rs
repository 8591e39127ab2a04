//! Frame timing
//!
//! `dt` comes from the wall clock but is capped, so a long gap between frames
//! (a minimized window, a debugger pause) never feeds the solver one huge
//! unstable step.

use std::time::Instant;

/// Largest timestep handed to the solver, in seconds.
pub const MAX_TIMESTEP: f32 = 0.016666;

/// Clamp a raw frame delta into `[0, MAX_TIMESTEP]`.
pub fn cap_timestep(dt: f32) -> f32 {
    if dt.is_nan() {
        return 0.0;
    }
    dt.clamp(0.0, MAX_TIMESTEP)
}

/// Measures capped time between successive frames.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last_update: Option<Instant>,
}

impl FrameClock {
    pub fn new() -> Self {
        Self { last_update: None }
    }

    /// Capped seconds since the previous tick. The first tick returns 0.
    pub fn tick(&mut self, now: Instant) -> f32 {
        let dt = match self.last_update {
            Some(last) => now.saturating_duration_since(last).as_secs_f32(),
            None => 0.0,
        };
        self.last_update = Some(now);
        cap_timestep(dt)
    }

    /// Forget the previous tick, e.g. when resuming after a stop.
    pub fn reset(&mut self) {
        self.last_update = None;
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    #[test]
    fn test_first_tick_is_zero() {
        let mut clock = FrameClock::new();
        assert_eq!(clock.tick(Instant::now()), 0.0);
    }

    #[test]
    fn test_short_frame_passes_through() {
        let mut clock = FrameClock::new();
        let start = Instant::now();
        clock.tick(start);
        let dt = clock.tick(start + Duration::from_millis(10));
        assert!((dt - 0.010).abs() < 1e-6);
    }

    #[test]
    fn test_reset_forgets_gap() {
        let mut clock = FrameClock::new();
        let start = Instant::now();
        clock.tick(start);
        clock.reset();
        assert_eq!(clock.tick(start + Duration::from_secs(5)), 0.0);
    }

    proptest! {
        #[test]
        fn prop_long_gaps_are_capped(gap_ms in 1_000u64..10_000_000) {
            let mut clock = FrameClock::new();
            let start = Instant::now();
            clock.tick(start);
            let dt = clock.tick(start + Duration::from_millis(gap_ms));
            prop_assert!(dt <= MAX_TIMESTEP);
            prop_assert!(dt > 0.0);
        }

        #[test]
        fn prop_cap_stays_in_range(dt in proptest::num::f32::ANY) {
            let capped = cap_timestep(dt);
            prop_assert!((0.0..=MAX_TIMESTEP).contains(&capped));
        }
    }
}
