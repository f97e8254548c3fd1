//! Test suite orchestration.
//!
//! Each discovered test goes through
//! `run | submit | skip → baseline → compare images → compare text → chart`.
//! A full run then summarizes every test's persisted results into one report.

use crate::chart::{self, ChartRenderer};
use crate::compare::{
    BaselineManager, ImageComparator, ImageComparison, TextComparison, TextLogComparator,
};
use crate::config::ToolKind;
use crate::core::context::{Context, RunMode};
use crate::core::error::{Error, Result};
use crate::metrics::{MachineInfo, MetricsCollector, PerformanceHistory, RegressionDetector};
use crate::runner::{RunResult, Runner};
use crate::util::fs::{ensure_dir_exists, write_json_pretty};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::SystemTime;

pub mod clean;
pub mod discover;
pub mod formatter;
mod progress;
pub mod report;

pub use discover::discover;
pub use formatter::ResultFormatter;
pub use report::{Stability, SummaryReport, TestStatus};

/// One `ex*` test directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCase {
    /// Directory name, e.g. `ex01_pvScreenshot`.
    pub name: String,
    /// Number parsed from the `ex<NN>` prefix.
    pub number: Option<u32>,
    pub dir: PathBuf,
    /// Driver script, if one was found.
    pub script: Option<PathBuf>,
    /// Tool that runs the driver script.
    pub tool: Option<ToolKind>,
}

impl TestCase {
    /// A case with no script or tool resolved.
    pub fn new(name: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        let name = name.into();
        Self {
            number: discover::example_number(&name),
            name,
            dir: dir.into(),
            script: None,
            tool: None,
        }
    }

    pub fn testing_dir(&self) -> PathBuf {
        self.dir.join("Testing")
    }

    pub fn baseline_dir(&self) -> PathBuf {
        self.testing_dir().join("Baseline")
    }

    /// Where the driver script writes its images.
    pub fn output_images_dir(&self) -> PathBuf {
        self.dir.join("output")
    }

    pub fn output_log(&self) -> PathBuf {
        self.testing_dir().join("output.log")
    }

    pub fn error_log(&self) -> PathBuf {
        self.testing_dir().join("error.log")
    }

    pub fn known_good_path(&self) -> PathBuf {
        self.baseline_dir().join("known_good_value.txt")
    }

    pub fn image_results_path(&self) -> PathBuf {
        self.testing_dir().join("image_comparison_results.json")
    }

    pub fn text_results_path(&self) -> PathBuf {
        self.testing_dir().join("text_comparison_results.json")
    }

    pub fn performance_path(&self, machine_name: &str) -> PathBuf {
        self.testing_dir()
            .join(format!("performance_metrics_{machine_name}.json"))
    }
}

/// What happened to one test in this invocation.
#[derive(Debug)]
pub struct TestOutcome {
    pub name: String,
    /// The batch script was handed to the scheduler; nothing else ran.
    pub submitted: bool,
    /// Present when the tool was executed.
    pub run: Option<RunResult>,
    pub images: Vec<ImageComparison>,
    /// Present when both the log and the known-good reference exist.
    pub text: Option<TextComparison>,
    pub charts: Vec<PathBuf>,
}

impl TestOutcome {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            submitted: false,
            run: None,
            images: Vec::new(),
            text: None,
            charts: Vec::new(),
        }
    }

    /// No image is `DIFFERENT` and the log matched (when compared).
    pub fn passed(&self) -> bool {
        !self.images.iter().any(|i| i.status.is_failure())
            && self.text.is_none_or(|t| t.logs_match)
    }
}

/// Runs the tests of one test tree. Built with [`crate::core::SuiteBuilder`].
pub struct TestSuite {
    ctx: Context,
    runner: Box<dyn Runner>,
    detector: Box<dyn RegressionDetector>,
    renderer: Box<dyn ChartRenderer>,
    collector: MetricsCollector,
    text_comparator: TextLogComparator,
}

impl TestSuite {
    pub(crate) fn new(
        ctx: Context,
        runner: Box<dyn Runner>,
        detector: Box<dyn RegressionDetector>,
        renderer: Box<dyn ChartRenderer>,
    ) -> Result<Self> {
        let text_comparator =
            TextLogComparator::new(ctx.config.comparison.ignore_patterns.as_slice())?;
        Ok(Self {
            ctx,
            runner,
            detector,
            renderer,
            collector: MetricsCollector::new(),
            text_comparator,
        })
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Discover the suite's tests.
    pub fn discover(&self) -> Result<Vec<TestCase>> {
        discover(&self.ctx)
    }

    /// Run every test, then write and return the summary report.
    ///
    /// A test failing with a non-fatal error is logged and skipped;
    /// configuration errors abort the suite.
    pub fn run_all(&mut self) -> Result<SummaryReport> {
        let cases = self.discover()?;
        tracing::info!(
            count = cases.len(),
            runner = self.runner.name(),
            mode = ?self.ctx.mode,
            "running suite"
        );

        let progress = progress::SuiteProgress::new(cases.len());
        for case in &cases {
            progress.start(&case.name);
            match self.run_test(case) {
                Ok(outcome) => {
                    if !outcome.passed() {
                        tracing::warn!(test = %case.name, "comparisons failed");
                    }
                }
                Err(e) if !e.is_fatal() => {
                    tracing::error!(test = %case.name, error = %e, "test aborted");
                }
                Err(e) => {
                    progress.abandon();
                    return Err(e);
                }
            }
            progress.advance();
        }
        progress.finish();

        self.summarize(&cases)
    }

    /// Run only the `index`-th discovered test (0-based). No summary is written.
    pub fn run_one(&mut self, index: usize) -> Result<TestOutcome> {
        let cases = self.discover()?;
        let case = cases.get(index).ok_or_else(|| {
            if cases.is_empty() {
                Error::config(format!(
                    "test number {} is out of range: no tests in {}",
                    index,
                    self.ctx.tests_dir.display()
                ))
            } else {
                Error::config(format!(
                    "test number {} is out of range. Available tests: 0-{}",
                    index,
                    cases.len() - 1
                ))
            }
        })?;
        self.run_test(case)
    }

    /// Run one test through every phase of the current mode.
    pub fn run_test(&mut self, case: &TestCase) -> Result<TestOutcome> {
        tracing::info!(test = %case.name, "processing test");
        let mut outcome = TestOutcome::new(&case.name);

        match self.ctx.mode {
            RunMode::Submit => {
                outcome.submitted = self.submit(case)?;
                return Ok(outcome);
            }
            RunMode::Run => outcome.run = Some(self.execute(case)?),
            RunMode::MetricsOnly => tracing::debug!(test = %case.name, "skipping execution"),
        }

        ensure_dir_exists(&case.testing_dir())?;
        outcome.images = self.compare_images(case)?;
        outcome.text = self.compare_text(case)?;
        outcome.charts =
            chart::render_metric_charts(self.renderer.as_ref(), &case.testing_dir(), &case.name)?;
        Ok(outcome)
    }

    /// Remove generated files from every test and the report directory.
    pub fn clean(&self) -> Result<usize> {
        let cases = self.discover()?;
        let removed = clean::clean(&cases, &self.ctx.report_dir)?;
        tracing::info!(removed, "clean complete");
        Ok(removed)
    }

    /// Build the summary report from the persisted results and write it.
    pub fn summarize(&self, cases: &[TestCase]) -> Result<SummaryReport> {
        tracing::info!(machine = %self.ctx.machine_name, "creating summary report");
        let report = SummaryReport::collect(cases, &self.ctx.machine_name, self.detector.as_ref());
        report.write(&self.ctx.summary_report_path())?;
        Ok(report)
    }

    /// Hand the test's batch script to the scheduler. Returns whether it was submitted.
    fn submit(&self, case: &TestCase) -> Result<bool> {
        let runner = &self.ctx.config.runner;
        let script = case
            .dir
            .join(format!("{}{}", case.name, runner.submit_script_suffix));
        if !script.is_file() {
            tracing::warn!(test = %case.name, script = %script.display(), "no batch script found");
            return Ok(false);
        }

        let status = Command::new(&runner.submit_command)
            .arg(&script)
            .status()
            .map_err(|e| {
                Error::runner(format!("failed to execute {}: {}", runner.submit_command, e))
            })?;
        if !status.success() {
            tracing::warn!(test = %case.name, ?status, "submission failed");
        }
        Ok(status.success())
    }

    /// Run the tool and append this run's metrics to the machine's history.
    fn execute(&mut self, case: &TestCase) -> Result<RunResult> {
        tracing::info!(test = %case.name, runner = self.runner.name(), "running locally");
        let start = SystemTime::now();
        let result = self.runner.run(&self.ctx, case)?;
        let end = SystemTime::now();

        let mut record = self.collector.gather(&case.name, start, end);
        record.machine_info = Some(MachineInfo::detect(
            self.ctx.paraview_version.clone(),
            self.ctx.visit_version.clone(),
        ));
        PerformanceHistory::append(
            &case.performance_path(&self.ctx.machine_name),
            &PerformanceHistory::timestamp_now(),
            record,
        )?;
        Ok(result)
    }

    fn compare_images(&self, case: &TestCase) -> Result<Vec<ImageComparison>> {
        let config = &self.ctx.config.comparison;
        let output_dir = case.output_images_dir();
        let baseline_dir = case.baseline_dir();

        let selected = BaselineManager::new(config.max_baseline_images, config.baseline_policy)
            .ensure_baselines(&output_dir, &baseline_dir, self.ctx.accept_baseline)?;

        let comparator = ImageComparator::new(config.pixel_threshold);
        let results: Vec<ImageComparison> = selected
            .iter()
            .map(|name| comparator.compare(name, &baseline_dir, &output_dir))
            .collect();

        write_json_pretty(&case.image_results_path(), &results)?;
        Ok(results)
    }

    fn compare_text(&self, case: &TestCase) -> Result<Option<TextComparison>> {
        let log = case.output_log();
        let known_good = case.known_good_path();
        if !exists(&log, "output log") || !exists(&known_good, "known good value file") {
            return Ok(None);
        }

        let result = TextComparison {
            logs_match: self.text_comparator.compare_files(&log, &known_good)?,
        };
        write_json_pretty(&case.text_results_path(), &[result])?;
        Ok(Some(result))
    }
}

fn exists(path: &Path, what: &str) -> bool {
    let found = path.is_file();
    if !found {
        tracing::info!(path = %path.display(), "{what} not found, skipping text comparison");
    }
    found
}
