//! Rolling frame-rate statistics.
//!
//! [`FpsTracker`] keeps the last `capacity` per-tick rates and reports
//! their mean and population standard deviation.

use std::collections::VecDeque;
use std::time::Duration;

/// Window size used by the console.
pub const DEFAULT_FPS_WINDOW: usize = 100;

/// Floor on tick duration so an instantaneous rate is always finite.
const MIN_TICK_SECS: f64 = 1e-9;

/// One frame-rate report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpsSample {
    /// Rate of the tick just measured.
    pub instant: f64,
    /// Mean rate over the window.
    pub mean: f64,
    /// Population standard deviation over the window.
    pub std: f64,
    /// Number of ticks in the window.
    pub samples: usize,
}

/// Fixed-size window of per-tick frame rates.
#[derive(Debug, Clone)]
pub struct FpsTracker {
    window: VecDeque<f64>,
    capacity: usize,
}

impl Default for FpsTracker {
    fn default() -> Self {
        Self::new(DEFAULT_FPS_WINDOW)
    }
}

impl FpsTracker {
    /// Create a tracker holding at most `capacity` samples (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            window: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Record one tick's wall-clock duration, evicting the oldest sample
    /// once the window is full.
    pub fn record(&mut self, tick: Duration) -> FpsSample {
        let instant = 1.0 / tick.as_secs_f64().max(MIN_TICK_SECS);
        self.push_rate(instant);
        let (mean, std) = self.mean_std();
        FpsSample {
            instant,
            mean,
            std,
            samples: self.window.len(),
        }
    }

    /// Record a rate directly.
    pub fn push_rate(&mut self, fps: f64) {
        if self.window.len() == self.capacity {
            self.window.pop_front();
        }
        self.window.push_back(fps);
    }

    /// Mean and std of the window; `(0, 0)` when empty.
    #[allow(clippy::cast_precision_loss)]
    pub fn mean_std(&self) -> (f64, f64) {
        if self.window.is_empty() {
            return (0.0, 0.0);
        }
        let n = self.window.len() as f64;
        let mean = self.window.iter().sum::<f64>() / n;
        let var = self.window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        (mean, var.sqrt())
    }

    /// Latest summary, if any tick was recorded.
    pub fn summary(&self) -> Option<FpsSample> {
        let instant = *self.window.back()?;
        let (mean, std) = self.mean_std();
        Some(FpsSample {
            instant,
            mean,
            std,
            samples: self.window.len(),
        })
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn empty_tracker() {
        let t = FpsTracker::default();
        assert_eq!(t.capacity(), 100);
        assert!(t.is_empty());
        assert!(t.summary().is_none());
        assert_eq!(t.mean_std(), (0.0, 0.0));
    }

    #[test]
    fn instant_rate_from_duration() {
        let mut t = FpsTracker::new(10);
        let s = t.record(Duration::from_millis(20));
        assert_relative_eq!(s.instant, 50.0, epsilon = 1e-9);
        assert_relative_eq!(s.mean, 50.0, epsilon = 1e-9);
        assert_relative_eq!(s.std, 0.0);
        assert_eq!(s.samples, 1);
    }

    #[test]
    fn mean_and_population_std() {
        let mut t = FpsTracker::new(10);
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            t.push_rate(v);
        }
        let (mean, std) = t.mean_std();
        assert_relative_eq!(mean, 5.0);
        assert_relative_eq!(std, 2.0);
    }

    #[test]
    fn window_evicts_oldest() {
        let mut t = FpsTracker::new(100);
        for i in 0..150 {
            t.push_rate(f64::from(i));
        }
        assert_eq!(t.len(), 100);
        // Remaining samples are 50..150.
        assert_relative_eq!(t.mean_std().0, 99.5);
        assert_relative_eq!(t.summary().unwrap().instant, 149.0);
    }

    #[test]
    fn zero_duration_is_finite() {
        let mut t = FpsTracker::new(4);
        assert!(t.record(Duration::ZERO).instant.is_finite());
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut t = FpsTracker::new(0);
        t.push_rate(1.0);
        t.push_rate(2.0);
        assert_eq!(t.len(), 1);
        t.reset();
        assert!(t.is_empty());
    }
}
