//! Performance regression detection over a test's history.

use super::{Metric, PerformanceHistory};
use serde::{Deserialize, Serialize};

/// A significant increase of one metric between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceChange {
    /// Metric that changed (`execution_time`, `memory_usage_mb`, ...).
    pub metric: String,

    /// Always `false`; kept for compatibility with existing reports.
    #[serde(rename = "Performance_stable")]
    pub performance_stable: bool,

    pub previous_value: f64,
    pub current_value: f64,
    pub percent_change: f64,
}

/// Decides whether a test's performance history shows a regression.
pub trait RegressionDetector: Send + Sync {
    /// Return the first significant change found, if any.
    fn detect(&self, history: &PerformanceHistory) -> Option<PerformanceChange>;

    /// Get a human-readable name for this detector.
    fn name(&self) -> &str;
}

/// Compares only the two most recent samples of each metric.
///
/// A metric is flagged when it grew by more than `threshold` percent.
/// Decreases never flag. A single noisy sample can trip it.
#[derive(Debug, Clone, Copy)]
pub struct TwoPointDetector {
    threshold: f64,
}

impl TwoPointDetector {
    /// Create a detector flagging increases above `threshold` percent.
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Check one metric's chronological series.
    pub fn check_series(&self, metric: Metric, values: &[f64]) -> Option<PerformanceChange> {
        let [previous, current] = values.last_chunk::<2>()?;
        let (previous, current) = (*previous, *current);
        if previous == 0.0 {
            return None;
        }

        let percent_change = 100.0 * (current - previous) / previous;
        tracing::debug!(
            metric = metric.key(),
            previous,
            current,
            percent_change,
            "comparing last two runs"
        );

        if percent_change > self.threshold {
            Some(PerformanceChange {
                metric: metric.key().to_string(),
                performance_stable: false,
                previous_value: previous,
                current_value: current,
                percent_change,
            })
        } else {
            None
        }
    }
}

impl Default for TwoPointDetector {
    fn default() -> Self {
        Self::new(10.0)
    }
}

impl RegressionDetector for TwoPointDetector {
    fn detect(&self, history: &PerformanceHistory) -> Option<PerformanceChange> {
        if history.len() < 2 {
            tracing::debug!("not enough runs for comparison");
            return None;
        }

        Metric::ALL
            .iter()
            .find_map(|&metric| self.check_series(metric, &history.series(metric)))
    }

    fn name(&self) -> &str {
        "two-point"
    }
}
