//! Frame timing.

use std::time::{Duration, Instant};

/// High-resolution timer for frame delta times and a smoothed FPS estimate.
#[derive(Debug)]
pub struct FrameTimer {
    start: Instant,
    last_tick: Instant,
    /// Exponentially smoothed frames per second.
    fps: f64,
}

impl FrameTimer {
    /// Smoothing factor for the FPS estimate; closer to 1.0 reacts slower.
    const FPS_SMOOTHING: f64 = 0.9;

    /// Create a new timer, starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
            fps: 0.0,
        }
    }

    /// Total elapsed time since the timer was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time elapsed since the last call to `tick()`, updating the FPS
    /// estimate. Call once per frame.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now - self.last_tick;
        self.last_tick = now;

        let secs = delta.as_secs_f64();
        if secs > 0.0 {
            let instant_fps = 1.0 / secs;
            self.fps = if self.fps == 0.0 {
                instant_fps
            } else {
                self.fps * Self::FPS_SMOOTHING + instant_fps * (1.0 - Self::FPS_SMOOTHING)
            };
        }
        delta
    }

    /// Delta time in seconds since the last tick.
    pub fn delta_secs(&mut self) -> f64 {
        self.tick().as_secs_f64()
    }

    /// Smoothed frames-per-second estimate.
    pub fn fps(&self) -> f64 {
        self.fps
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
    fn test_tick_advances() {
        let mut timer = FrameTimer::new();
        std::thread::sleep(Duration::from_millis(5));
        let delta = timer.tick();
        assert!(delta >= Duration::from_millis(5));
        assert!(timer.fps() > 0.0);
    }

    #[test]
    fn test_elapsed_monotonic() {
        let timer = FrameTimer::new();
        let a = timer.elapsed();
        let b = timer.elapsed();
        assert!(b >= a);
    }
}
