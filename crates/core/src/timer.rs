//! High-resolution timer for frame timing and profiling.

use std::time::{Duration, Instant};

/// High-resolution timer for measuring elapsed time.
#[derive(Debug)]
pub struct Timer {
    start: Instant,
    last_tick: Instant,
}

impl Timer {
    /// Create a new timer, starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_tick: now,
        }
    }

    /// Get the total elapsed time since the timer was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Get the elapsed time in seconds since the timer was created.
    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }

    /// Get the time elapsed since the last call to `tick()`.
    /// This is useful for calculating delta time in a game loop.
    pub fn tick(&mut self) -> Duration {
        let now = Instant::now();
        let delta = now - self.last_tick;
        self.last_tick = now;
        delta
    }

    /// Get the delta time in seconds since the last tick.
    pub fn delta_secs(&mut self) -> f32 {
        self.tick().as_secs_f32()
    }

    /// Reset the timer to the current time.
    pub fn reset(&mut self) {
        let now = Instant::now();
        self.start = now;
        self.last_tick = now;
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

/// Rolling frames-per-second counter.
///
/// Finished frames are accumulated into a sampling window. Once the window
/// covers at least one second, [`FrameStats::record_frame`] averages the
/// frame count over the window, clears both accumulators, and returns the
/// sample. Between samples the most recent value stays available through
/// [`FrameStats::last_fps`].
#[derive(Debug, Default)]
pub struct FrameStats {
    /// Frames recorded in the current sampling window.
    frames: u32,
    /// Wall time accumulated in the current sampling window.
    window: Duration,
    /// Most recent completed sample, if a full window has elapsed yet.
    last_fps: Option<f32>,
}

impl FrameStats {
    /// Create an empty counter with no sample yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished frame that took `delta` of wall time.
    ///
    /// Returns `Some(fps)` when this frame completes a sampling window of
    /// at least one second. Both accumulators restart from zero afterwards,
    /// so each sample covers disjoint frames.
    pub fn record_frame(&mut self, delta: Duration) -> Option<f32> {
        self.frames += 1;
        self.window += delta;

        if self.window >= Duration::from_secs(1) {
            let fps = self.frames as f32 / self.window.as_secs_f32();
            self.frames = 0;
            self.window = Duration::ZERO;
            self.last_fps = Some(fps);
            Some(fps)
        } else {
            None
        }
    }

    /// Most recent completed sample, or `None` before the first full window.
    pub fn last_fps(&self) -> Option<f32> {
        self.last_fps
    }

    /// Frames recorded so far in the current sampling window.
    pub fn frames_in_window(&self) -> u32 {
        self.frames
    }

    /// Discard the current window and the last sample.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_sample_before_window_elapses() {
        let mut stats = FrameStats::new();
        for _ in 0..59 {
            assert_eq!(stats.record_frame(Duration::from_millis(16)), None);
        }
        assert_eq!(stats.frames_in_window(), 59);
        assert_eq!(stats.last_fps(), None);
    }

    #[test]
    fn sample_averages_the_whole_window() {
        let mut stats = FrameStats::new();
        let mut sample = None;
        for _ in 0..100 {
            if let Some(fps) = stats.record_frame(Duration::from_millis(20)) {
                sample = Some(fps);
                break;
            }
        }
        // 50 frames at 20ms each fill exactly one second.
        let fps = sample.unwrap();
        assert!((fps - 50.0).abs() < 0.5, "fps was {fps}");
    }

    #[test]
    fn accumulators_restart_after_each_sample() {
        let mut stats = FrameStats::new();
        stats.record_frame(Duration::from_secs(2));
        assert_eq!(stats.frames_in_window(), 0);

        // The next window starts fresh rather than inheriting leftover time.
        assert_eq!(stats.record_frame(Duration::from_millis(500)), None);
        assert_eq!(stats.frames_in_window(), 1);
    }

    #[test]
    fn consecutive_windows_produce_independent_samples() {
        let mut stats = FrameStats::new();
        let first = stats.record_frame(Duration::from_secs(1)).unwrap();
        assert!((first - 1.0).abs() < f32::EPSILON);

        for _ in 0..9 {
            assert_eq!(stats.record_frame(Duration::from_millis(100)), None);
        }
        let second = stats.record_frame(Duration::from_millis(100)).unwrap();
        assert!((second - 10.0).abs() < 0.5, "fps was {second}");
    }

    #[test]
    fn reset_discards_window_and_sample() {
        let mut stats = FrameStats::new();
        stats.record_frame(Duration::from_secs(1));
        stats.record_frame(Duration::from_millis(100));
        stats.reset();
        assert_eq!(stats.frames_in_window(), 0);
        assert_eq!(stats.last_fps(), None);
    }
}
