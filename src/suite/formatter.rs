//! Terminal output formatting for suite results.

use super::TestOutcome;
use super::report::{Stability, SummaryReport};
use std::fmt::Write as _;

/// Formats and prints suite results to the terminal.
pub struct ResultFormatter {
    verbose: bool,
}

impl ResultFormatter {
    /// Create a formatter; `verbose` adds per-image and per-metric detail.
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Print the summary report: one line per test, failure details, totals.
    pub fn report(&self, report: &SummaryReport) {
        print!("{}", self.render_report(report));
    }

    /// Print the outcome of a single test run.
    pub fn outcome(&self, outcome: &TestOutcome) {
        print!("{}", self.render_outcome(outcome));
    }

    /// Render the summary report as text.
    pub fn render_report(&self, report: &SummaryReport) -> String {
        let mut out = String::new();
        for (name, status) in &report.test_results {
            let marker = if status.passed() { "PASS" } else { "FAIL" };
            let _ = writeln!(out, "[{marker}] {name}");

            if status.passed() && !self.verbose {
                continue;
            }
            if !status.image_comparison_passed {
                for failed in report
                    .failed_image_comparisons
                    .iter()
                    .filter_map(|entry| entry.get(name))
                {
                    let _ = writeln!(
                        out,
                        "    image {} differs ({} pixels)",
                        failed.image,
                        failed
                            .diff_pixels
                            .map_or_else(|| "?".to_string(), |n| n.to_string())
                    );
                }
            }
            if !status.text_comparison_passed {
                let _ = writeln!(out, "    output.log does not match known_good_value.txt");
            }
            if let Stability::Changed(change) = &status.performance_stable {
                let _ = writeln!(
                    out,
                    "    {} rose {:.1}% ({} -> {})",
                    change.metric,
                    change.percent_change,
                    change.previous_value,
                    change.current_value
                );
            }
        }

        let status = if report.any_tests_failed {
            "FAILED"
        } else {
            "ok"
        };
        let failed = report.failed();
        let _ = writeln!(
            out,
            "\nsuite result: {status}. {} passed, {} failed",
            report.total() - failed,
            failed
        );
        out
    }

    /// Render a single test outcome as text.
    pub fn render_outcome(&self, outcome: &TestOutcome) -> String {
        let mut out = String::new();
        if outcome.submitted {
            let _ = writeln!(out, "[SUBMITTED] {}", outcome.name);
            return out;
        }

        let marker = if outcome.passed() { "PASS" } else { "FAIL" };
        let _ = writeln!(out, "[{marker}] {}", outcome.name);

        if let Some(run) = &outcome.run {
            if run.timed_out {
                let _ = writeln!(out, "    tool timed out");
            } else if self.verbose || !run.success {
                let _ = writeln!(out, "    tool exit code: {}", run.exit_code);
            }
        }
        for image in &outcome.images {
            if self.verbose || image.status.is_failure() {
                let status = serde_json::to_value(image.status)
                    .ok()
                    .and_then(|v| v.as_str().map(str::to_string))
                    .unwrap_or_default();
                let _ = writeln!(out, "    {}: {status}", image.image);
            }
        }
        if let Some(text) = outcome.text {
            if self.verbose || !text.logs_match {
                let _ = writeln!(out, "    logs match: {}", text.logs_match);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compare::{ImageComparison, ImageStatus, TextComparison};
    use crate::suite::report::TestStatus;
    use std::collections::BTreeMap;

    fn status(name: &str, images: bool, text: bool) -> TestStatus {
        TestStatus {
            test_name: name.to_string(),
            image_comparison_passed: images,
            text_comparison_passed: text,
            performance_stable: Stability::default(),
        }
    }

    #[test]
    fn test_render_report() {
        let mut report = SummaryReport::default();
        report
            .test_results
            .insert("ex00".to_string(), status("ex00", true, true));
        report
            .test_results
            .insert("ex01".to_string(), status("ex01", false, false));
        report.failed_image_comparisons.push(BTreeMap::from([(
            "ex01".to_string(),
            ImageComparison {
                image: "view.png".to_string(),
                diff_pixels: Some(4000),
                status: ImageStatus::Different,
            },
        )]));
        report.failed_text_comparisons.push("ex01".to_string());
        report.any_tests_failed = true;

        let text = ResultFormatter::new(false).render_report(&report);
        assert!(text.contains("[PASS] ex00"));
        assert!(text.contains("[FAIL] ex01"));
        assert!(text.contains("view.png differs (4000 pixels)"));
        assert!(text.contains("known_good_value.txt"));
        assert!(text.contains("suite result: FAILED. 1 passed, 1 failed"));
    }

    #[test]
    fn test_render_empty_report() {
        let text = ResultFormatter::new(true).render_report(&SummaryReport::default());
        assert!(text.contains("suite result: ok. 0 passed, 0 failed"));
    }

    #[test]
    fn test_render_outcome() {
        let outcome = TestOutcome {
            name: "ex02".to_string(),
            submitted: false,
            run: None,
            images: vec![ImageComparison {
                image: "a.png".to_string(),
                diff_pixels: None,
                status: ImageStatus::NoBaseline,
            }],
            text: Some(TextComparison { logs_match: true }),
            charts: Vec::new(),
        };

        let quiet = ResultFormatter::new(false).render_outcome(&outcome);
        assert_eq!(quiet, "[PASS] ex02\n");

        let verbose = ResultFormatter::new(true).render_outcome(&outcome);
        assert!(verbose.contains("a.png: NO BASELINE"));
        assert!(verbose.contains("logs match: true"));
    }

    #[test]
    fn test_render_submitted() {
        let outcome = TestOutcome {
            submitted: true,
            ..TestOutcome::new("ex03")
        };
        assert_eq!(
            ResultFormatter::new(false).render_outcome(&outcome),
            "[SUBMITTED] ex03\n"
        );
    }
}
