//! 2-sigma volatility threshold
//!
//! Population standard deviation (divide by n) of the most recent daily
//! growth observations, doubled. Fewer than two usable points, or a
//! degenerate result, yields the fallback threshold.

use super::types::HistoryPoint;

/// Threshold used when history is missing or too short
pub const DEFAULT_FALLBACK_THRESHOLD: f64 = 1.5;

/// Maximum observations considered
pub const MAX_HISTORY_WINDOW: usize = 30;

const SIGMA_MULTIPLIER: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolatilityThresholdEstimator {
    window: usize,
    fallback: f64,
}

impl VolatilityThresholdEstimator {
    pub fn new(window: usize, fallback: f64) -> Self {
        Self {
            window: window.clamp(2, MAX_HISTORY_WINDOW),
            fallback,
        }
    }

    pub fn fallback(&self) -> f64 {
        self.fallback
    }

    /// Compute `2 × σ` over the trailing `window` observations
    ///
    /// `history` is ordered oldest to newest. Non-finite values are ignored.
    pub fn compute_threshold(&self, history: &[f64]) -> f64 {
        let start = history.len().saturating_sub(self.window);
        let values: Vec<f64> = history[start..]
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .collect();

        if values.len() < 2 {
            return self.fallback;
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let threshold = variance.sqrt() * SIGMA_MULTIPLIER;

        if threshold.is_finite() && threshold > 0.0 {
            threshold
        } else {
            tracing::debug!(threshold, "Degenerate threshold, using fallback");
            self.fallback
        }
    }

    /// Order history points by date and compute over their growth values
    pub fn compute_from_history(&self, history: &[HistoryPoint]) -> f64 {
        let mut points: Vec<&HistoryPoint> = history.iter().collect();
        points.sort_by_key(|p| p.date);
        let growth: Vec<f64> = points.iter().filter_map(|p| p.growth).collect();
        self.compute_threshold(&growth)
    }
}

impl Default for VolatilityThresholdEstimator {
    fn default() -> Self {
        Self::new(MAX_HISTORY_WINDOW, DEFAULT_FALLBACK_THRESHOLD)
    }
}
