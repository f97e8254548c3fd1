//! Suite summary report built from the per-test result files.

use super::TestCase;
use crate::compare::{ImageComparison, TextComparison};
use crate::core::error::Result;
use crate::metrics::{PerformanceChange, PerformanceHistory, RegressionDetector};
use crate::util::fs::read_json;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// `true` when stable, otherwise the change that was detected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Stability {
    Changed(PerformanceChange),
    Stable(bool),
}

impl Stability {
    pub fn is_stable(&self) -> bool {
        matches!(self, Stability::Stable(true))
    }
}

impl Default for Stability {
    fn default() -> Self {
        Stability::Stable(true)
    }
}

/// Pass/fail status of one test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestStatus {
    pub test_name: String,
    pub image_comparison_passed: bool,
    pub text_comparison_passed: bool,
    #[serde(default)]
    pub performance_stable: Stability,
}

impl TestStatus {
    fn new(name: &str) -> Self {
        Self {
            test_name: name.to_string(),
            image_comparison_passed: true,
            text_comparison_passed: true,
            performance_stable: Stability::default(),
        }
    }

    pub fn passed(&self) -> bool {
        self.image_comparison_passed
            && self.text_comparison_passed
            && self.performance_stable.is_stable()
    }
}

/// Suite-level report written to `Testing/<type>_<machine>_summary_report.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub test_results: BTreeMap<String, TestStatus>,
    pub any_tests_failed: bool,
    pub failed_image_comparisons: Vec<BTreeMap<String, ImageComparison>>,
    pub failed_text_comparisons: Vec<String>,
    pub significant_performance_changes: Vec<BTreeMap<String, PerformanceChange>>,
}

impl SummaryReport {
    /// Scan the `Testing/` directory of every case.
    ///
    /// Cases without a `Testing/` directory are left out. A result file that
    /// cannot be read or parsed is logged and ignored.
    pub fn collect(
        cases: &[TestCase],
        machine_name: &str,
        detector: &dyn RegressionDetector,
    ) -> Self {
        let mut report = Self::default();

        for case in cases {
            if !case.testing_dir().is_dir() {
                continue;
            }
            let mut status = TestStatus::new(&case.name);

            if let Some(images) = read_optional::<Vec<ImageComparison>>(&case.image_results_path()) {
                for result in images.into_iter().filter(|r| r.status.is_failure()) {
                    status.image_comparison_passed = false;
                    report
                        .failed_image_comparisons
                        .push(BTreeMap::from([(case.name.clone(), result)]));
                }
            }

            if let Some(texts) = read_optional::<Vec<TextComparison>>(&case.text_results_path()) {
                if texts.iter().any(|r| !r.logs_match) {
                    status.text_comparison_passed = false;
                    report.failed_text_comparisons.push(case.name.clone());
                }
            }

            let performance_path = case.performance_path(machine_name);
            if performance_path.is_file() {
                match PerformanceHistory::load(&performance_path) {
                    Ok(history) => {
                        if let Some(change) = detector.detect(&history) {
                            tracing::info!(
                                test = %case.name,
                                metric = %change.metric,
                                percent_change = change.percent_change,
                                "significant performance change"
                            );
                            status.performance_stable = Stability::Changed(change.clone());
                            report
                                .significant_performance_changes
                                .push(BTreeMap::from([(case.name.clone(), change)]));
                        }
                    }
                    Err(e) => tracing::warn!(
                        path = %performance_path.display(),
                        error = %e,
                        "skipping unreadable performance history"
                    ),
                }
            } else {
                tracing::debug!(path = %performance_path.display(), "no performance history");
            }

            if !status.passed() {
                report.any_tests_failed = true;
            }
            report.test_results.insert(case.name.clone(), status);
        }

        report
    }

    /// Number of tests in the report.
    pub fn total(&self) -> usize {
        self.test_results.len()
    }

    /// Number of failed tests.
    pub fn failed(&self) -> usize {
        self.test_results.values().filter(|s| !s.passed()).count()
    }

    /// Write the report as pretty JSON.
    pub fn write(&self, path: &Path) -> Result<()> {
        crate::util::fs::write_json_pretty(path, self)?;
        tracing::info!(path = %path.display(), "summary report saved");
        Ok(())
    }

    /// Load a previously written report.
    pub fn load(path: &Path) -> Result<Self> {
        read_json(path)
    }
}

fn read_optional<T: DeserializeOwned>(path: &Path) -> Option<T> {
    if !path.is_file() {
        return None;
    }
    match read_json(path) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "skipping malformed result file");
            None
        }
    }
}
