//! Frame timing in reference ticks
//!
//! Motion is specified per tick of a 60 Hz clock, so a frame that took
//! 1/30 s advances the camera by two ticks.

use crate::constants::REFERENCE_TICK_HZ;
use std::time::{Duration, Instant};

/// Converts wall-clock instants into clamped tick deltas
#[derive(Debug, Clone, Copy)]
pub struct FrameTimer {
    last_frame: Option<Instant>,
    max_ticks: f64,
}

impl FrameTimer {
    pub fn new(max_ticks: f64) -> Self {
        Self {
            last_frame: None,
            max_ticks,
        }
    }

    /// Ticks elapsed since the previous call
    ///
    /// The first call yields 0. Instants earlier than the previous one
    /// count as no time passing.
    pub fn tick(&mut self, now: Instant) -> f64 {
        let Some(last) = self.last_frame.replace(now) else {
            return 0.0;
        };

        let ticks = duration_to_ticks(now.saturating_duration_since(last));
        if ticks > self.max_ticks {
            log::warn!(
                "[FrameTimer::tick] Frame took {:.1} ticks, clamping to {:.1}",
                ticks,
                self.max_ticks
            );
            return self.max_ticks;
        }
        ticks
    }
}

/// Elapsed time divided by one reference tick
pub fn duration_to_ticks(elapsed: Duration) -> f64 {
    let tick_nanos = 1_000_000_000.0 / REFERENCE_TICK_HZ as f64;
    elapsed.as_nanos() as f64 / tick_nanos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_frame_is_zero() {
        let mut timer = FrameTimer::new(15.0);
        assert_eq!(timer.tick(Instant::now()), 0.0);
    }

    #[test]
    fn test_sixtieth_of_a_second_is_one_tick() {
        let mut timer = FrameTimer::new(15.0);
        let start = Instant::now();
        timer.tick(start);
        let ticks = timer.tick(start + Duration::from_nanos(1_000_000_000 / 60));
        assert!((ticks - 1.0).abs() < 1e-6);

        let ticks = timer.tick(start + Duration::from_millis(50));
        assert!((ticks - 2.0).abs() < 1e-3);
    }

    #[test]
    fn test_long_stall_is_clamped() {
        let mut timer = FrameTimer::new(15.0);
        let start = Instant::now();
        timer.tick(start);
        assert_eq!(timer.tick(start + Duration::from_secs(3)), 15.0);
    }

    #[test]
    fn test_earlier_instant_counts_as_zero() {
        let mut timer = FrameTimer::new(15.0);
        let start = Instant::now() + Duration::from_secs(1);
        timer.tick(start);
        assert_eq!(timer.tick(start - Duration::from_millis(10)), 0.0);
    }
}
