//! Frame timing for the host loop.

use std::time::{Duration, Instant};

/// Upper bound on a single frame delta.
///
/// A window that was minimized or dragged can stall the loop for seconds;
/// camera movement would otherwise jump by the whole stall.
pub const MAX_FRAME_DELTA: Duration = Duration::from_millis(250);

/// Measures per-frame delta time and running totals.
#[derive(Debug)]
pub struct FrameTimer {
    start: Instant,
    last_tick: Instant,
    frames: u64,
}

impl FrameTimer {
    /// Create a new timer, starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
            frames: 0,
        }
    }

    /// Total time since the timer was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Advances one frame and returns the clamped delta in seconds.
    pub fn tick(&mut self) -> f32 {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> f32 {
        let delta = now.saturating_duration_since(self.last_tick);
        self.last_tick = now;
        self.frames += 1;
        delta.min(MAX_FRAME_DELTA).as_secs_f32()
    }

    /// Number of ticks so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Average frames per second since creation.
    pub fn average_fps(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_counts_frames() {
        let mut timer = FrameTimer::new();
        assert_eq!(timer.frames(), 0);
        timer.tick();
        timer.tick();
        assert_eq!(timer.frames(), 2);
    }

    #[test]
    fn test_tick_measures_delta() {
        let mut timer = FrameTimer::new();
        let start = timer.last_tick;
        let delta = timer.tick_at(start + Duration::from_millis(16));
        assert!((delta - 0.016).abs() < 1e-6);
    }

    #[test]
    fn test_tick_clamps_long_stalls() {
        let mut timer = FrameTimer::new();
        let start = timer.last_tick;
        let delta = timer.tick_at(start + Duration::from_secs(5));
        assert_eq!(delta, MAX_FRAME_DELTA.as_secs_f32());
    }
}
