//! Rolling indicator primitives.
//!
//! All of these consume one series in date order.

use std::collections::VecDeque;

/// Rolling simple moving average with a minimum window of one observation:
/// until the window fills, the mean covers however many values exist.
pub struct RollingMean {
    /// Window size in observations.
    window: usize,
    /// Values currently in the window.
    values: VecDeque<f64>,
    /// Running sum of `values`.
    sum: f64,
}

impl RollingMean {
    /// Create a new rolling mean over `window` observations.
    pub fn new(window: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            values: VecDeque::with_capacity(window),
            sum: 0.0,
        }
    }

    /// Add an observation and return the mean including it.
    pub fn add(&mut self, value: f64) -> f64 {
        if self.values.len() >= self.window {
            if let Some(old) = self.values.pop_front() {
                self.sum -= old;
            }
        }
        self.values.push_back(value);
        self.sum += value;
        self.sum / self.values.len() as f64
    }

    /// Current mean, `None` before the first observation.
    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            None
        } else {
            Some(self.sum / self.values.len() as f64)
        }
    }

    /// Check if the window is full.
    pub fn is_ready(&self) -> bool {
        self.values.len() >= self.window
    }

    /// Get the number of observations in the window.
    pub fn count(&self) -> usize {
        self.values.len()
    }

    /// Clear all data.
    pub fn clear(&mut self) {
        self.values.clear();
        self.sum = 0.0;
    }
}

/// Percent change from `prev` to `current`.
///
/// Undefined when there is no usable previous value (first observation, or
/// a non-positive previous close).
#[inline]
pub fn pct_change(prev: Option<f64>, current: f64) -> Option<f64> {
    match prev {
        Some(p) if p > 0.0 && current.is_finite() => Some((current / p - 1.0) * 100.0),
        _ => None,
    }
}

/// First difference of a cumulative series.
#[derive(Debug, Default)]
pub struct FirstDifference {
    prev: Option<f64>,
}

impl FirstDifference {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the next cumulative value; returns the change since the previous
    /// one, `None` for the first.
    pub fn add(&mut self, value: f64) -> Option<f64> {
        let diff = self.prev.map(|p| value - p);
        self.prev = Some(value);
        diff
    }

    pub fn clear(&mut self) {
        self.prev = None;
    }
}
