use crate::config::{Config, ToolKind};
use crate::core::error::{Error, Result};
use std::path::PathBuf;

/// How each test is handled in a suite invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Run the test locally through the runner and record metrics.
    #[default]
    Run,
    /// Submit the test's batch script to the scheduler and stop there.
    Submit,
    /// Skip execution; only regenerate comparisons, charts and reports.
    MetricsOnly,
}

/// Context object that carries state through a suite invocation.
pub struct Context {
    /// Configuration.
    pub config: Config,

    /// Repository root directory.
    pub root_dir: PathBuf,

    /// Test tree selector, e.g. `ParaView` or `VisIt`.
    pub test_type: String,

    /// Directory holding the `ex<NN>` test directories.
    pub tests_dir: PathBuf,

    /// Directory receiving suite-level artifacts (summary report).
    pub report_dir: PathBuf,

    /// Machine name keying performance history and reports.
    pub machine_name: String,

    /// ParaView version recorded with metrics.
    pub paraview_version: Option<String>,

    /// VisIt version recorded with metrics.
    pub visit_version: Option<String>,

    /// Execution mode.
    pub mode: RunMode,

    /// Whether missing baselines may be created under the explicit policy.
    pub accept_baseline: bool,
}

impl Context {
    /// Create a new context for the test tree `<root>/<test_type>_Vignettes`.
    ///
    /// A relative `root_dir` is resolved against the current directory, so
    /// every derived path stays valid once a tool runs inside a test directory.
    pub fn new(config: Config, root_dir: PathBuf, test_type: impl Into<String>) -> Result<Self> {
        let test_type = test_type.into();
        if test_type.trim().is_empty() {
            return Err(Error::MissingConfig("test_type".to_string()));
        }
        let root_dir = std::path::absolute(&root_dir)?;

        let tests_dir = root_dir.join(format!("{}_Vignettes", test_type));
        if !tests_dir.is_dir() {
            return Err(Error::config(format!(
                "test directory {} does not exist",
                tests_dir.display()
            )));
        }

        let report_dir = root_dir.join("Testing");

        Ok(Self {
            config,
            root_dir,
            test_type,
            tests_dir,
            report_dir,
            machine_name: default_machine_name(),
            paraview_version: None,
            visit_version: None,
            mode: RunMode::Run,
            accept_baseline: false,
        })
    }

    /// Tool implied by the configuration or the test type, if any.
    ///
    /// Per-test script names are consulted only when this returns `None`.
    pub fn default_tool(&self) -> Option<ToolKind> {
        self.config
            .runner
            .tool
            .or_else(|| self.test_type.parse().ok())
    }

    /// Path of the suite summary report.
    pub fn summary_report_path(&self) -> PathBuf {
        self.report_dir.join(format!(
            "{}_{}_summary_report.json",
            self.test_type, self.machine_name
        ))
    }
}

/// Host name of this machine, or `unknown` when it cannot be read.
pub fn default_machine_name() -> String {
    sysinfo::System::host_name()
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}
