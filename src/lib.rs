//! vignette-runner: a regression and performance harness for scripted
//! ParaView and VisIt visualization tests.
//!
//! Each test directory (`ex<NN>_*`) holds a driver script. The harness runs it
//! under the matching tool, compares the images it writes against stored
//! baselines, checks its log against a known-good reference, appends resource
//! metrics to a per-machine history, and flags performance regressions in a
//! summary report. Separately, it aggregates per-rank in-situ timing logs into
//! chart-ready tables.
//!
//! # Quick Start
//!
//! ```no_run
//! use vignette_runner::builder;
//!
//! # fn main() -> vignette_runner::Result<()> {
//! let mut suite = builder()
//!     .root_dir("/path/to/repo")
//!     .test_type("ParaView")
//!     .load_config(None, None)?
//!     .build()?;
//!
//! let report = suite.run_all()?;
//! if report.any_tests_failed {
//!     eprintln!("{} tests failed", report.failed());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration in `vignette-runner.toml`
//!
//! ```toml
//! verbose = false
//!
//! [runner]
//! threads = 32
//! timeout = 1800
//!
//! [comparison]
//! pixel-threshold = 1000
//! baseline-policy = "explicit"
//!
//! [regression]
//! threshold = 10.0
//!
//! [profiles.laptop.runner]
//! threads = 4
//! ```
//!
//! # Architecture
//!
//! The suite is assembled from three replaceable parts:
//!
//! - [`Runner`](runner::Runner): executes a test's driver script
//! - [`RegressionDetector`](metrics::RegressionDetector): judges performance history
//! - [`ChartRenderer`](chart::ChartRenderer): draws metric and timing charts
//!
//! # Custom Runner Example
//!
//! ```no_run
//! use vignette_runner::core::{Context, Result};
//! use vignette_runner::runner::{RunResult, Runner};
//! use vignette_runner::suite::TestCase;
//!
//! struct DryRun;
//!
//! impl Runner for DryRun {
//!     fn run(&self, _ctx: &Context, case: &TestCase) -> Result<RunResult> {
//!         println!("would run {}", case.name);
//!         Ok(RunResult::success())
//!     }
//!
//!     fn name(&self) -> &str {
//!         "dry-run"
//!     }
//! }
//! ```
//!
//! # Features
//!
//! - `default` - Enables `cli`
//! - `cli` - The `vignette-runner` binary
//! - `progress` - Progress bar during suite runs

pub mod chart;
pub mod compare;
pub mod config;
pub mod core;
pub mod metrics;
pub mod runner;
pub mod suite;
pub mod timings;
pub mod util;

// Re-export commonly used types
pub use crate::core::{Error, Result, RunMode, SuiteBuilder};
pub use config::{Config, ToolKind};
pub use suite::{SummaryReport, TestSuite};

/// Create a new suite builder.
///
/// This is the main entry point for the fluent API.
pub fn builder() -> SuiteBuilder {
    SuiteBuilder::new()
}
