//! Wall-clock source for animation and frame-rate reporting.

use std::time::{Duration, Instant};

/// Interval between frame-rate reports.
const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Tracks time since startup and the number of frames rendered.
///
/// The renderer samples [`FrameClock::elapsed_secs`] once per frame to drive
/// the model rotation; the application loop calls [`FrameClock::tick`] after
/// each rendered frame and logs the returned rate when one is available.
#[derive(Debug)]
pub struct FrameClock {
    start: Instant,
    last_report: Instant,
    frames_since_report: u32,
    total_frames: u64,
}

impl FrameClock {
    /// Create a clock starting now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start: now,
            last_report: now,
            frames_since_report: 0,
            total_frames: 0,
        }
    }

    /// Time since the clock was created.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Seconds since the clock was created.
    pub fn elapsed_secs(&self) -> f32 {
        self.elapsed().as_secs_f32()
    }

    /// Total number of ticks recorded.
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Record one rendered frame.
    ///
    /// Returns the average frames per second once every report interval.
    pub fn tick(&mut self) -> Option<f32> {
        self.tick_at(Instant::now())
    }

    fn tick_at(&mut self, now: Instant) -> Option<f32> {
        self.frames_since_report += 1;
        self.total_frames += 1;

        let window = now.saturating_duration_since(self.last_report);
        if window < REPORT_INTERVAL {
            return None;
        }

        let fps = self.frames_since_report as f32 / window.as_secs_f32();
        self.frames_since_report = 0;
        self.last_report = now;
        Some(fps)
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

    #[test]
    fn test_tick_reports_once_per_interval() {
        let mut clock = FrameClock::new();
        let start = clock.last_report;

        assert_eq!(clock.tick_at(start + Duration::from_millis(100)), None);
        assert_eq!(clock.tick_at(start + Duration::from_millis(500)), None);

        let fps = clock
            .tick_at(start + Duration::from_secs(2))
            .expect("report after the interval");
        assert!((fps - 1.5).abs() < f32::EPSILON);
        assert_eq!(clock.total_frames(), 3);

        // Counter restarts after a report.
        assert_eq!(clock.tick_at(start + Duration::from_millis(2100)), None);
    }

    #[test]
    fn test_elapsed_is_monotonic() {
        let clock = FrameClock::new();
        let a = clock.elapsed();
        let b = clock.elapsed();
        assert!(b >= a);
    }
}
