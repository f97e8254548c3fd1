//! Configuration types and loading from `vignette-runner.toml`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod env;
mod loader;
pub use loader::ConfigLoader;

/// Name of the optional configuration file looked up in the repository root.
pub const CONFIG_FILE_NAME: &str = "vignette-runner.toml";

/// Complete configuration for the vignette runner.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// How test scripts are executed.
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Image and text comparison settings.
    #[serde(default)]
    pub comparison: ComparisonConfig,

    /// Performance regression policy.
    #[serde(default)]
    pub regression: RegressionConfig,

    /// Timing log aggregation settings.
    #[serde(default)]
    pub timings: TimingsConfig,

    /// Enable verbose output (debug-level logging, echo commands).
    #[serde(default)]
    pub verbose: bool,
}

/// Visualization tool that executes a vignette script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    /// ParaView, driven through `pvbatch`.
    ParaView,
    /// VisIt, driven through `visit -cli`.
    VisIt,
}

impl ToolKind {
    /// Guess the tool from a path by case-insensitive substring match.
    ///
    /// VisIt is checked first, so a path naming both resolves to VisIt.
    pub fn from_path_hint(path: &str) -> Option<Self> {
        let lower = path.to_lowercase();
        if lower.contains("visit") {
            Some(ToolKind::VisIt)
        } else if lower.contains("paraview") {
            Some(ToolKind::ParaView)
        } else {
            None
        }
    }

    /// Display name used in test-tree directory names (`<name>_Vignettes`).
    pub fn display_name(self) -> &'static str {
        match self {
            ToolKind::ParaView => "ParaView",
            ToolKind::VisIt => "VisIt",
        }
    }
}

impl FromStr for ToolKind {
    type Err = crate::core::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "paraview" => Ok(ToolKind::ParaView),
            "visit" => Ok(ToolKind::VisIt),
            _ => Err(crate::core::Error::InvalidConfig {
                field: "tool".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Runner configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RunnerConfig {
    /// Force a tool for every test instead of resolving it per test.
    pub tool: Option<ToolKind>,

    /// Value for `OMP_NUM_THREADS` and `TBB_NUM_THREADS` in the child.
    pub threads: u32,

    /// Kill the tool after this many seconds. No limit when unset.
    pub timeout: Option<u64>,

    /// Arguments placed between `mpirun` and the tool executable.
    pub mpi_args: Vec<String>,

    /// Arguments placed between `srun` and the tool executable.
    pub srun_args: Vec<String>,

    /// Batch scheduler submit command used in submit mode.
    pub submit_command: String,

    /// Suffix appended to the test name to locate its batch script.
    pub submit_script_suffix: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            tool: None,
            threads: 32,
            timeout: None,
            mpi_args: ["-np", "1", "--bind-to", "none"]
                .into_iter()
                .map(String::from)
                .collect(),
            srun_args: [
                "--hint=nomultithread",
                "--ntasks=2",
                "--ntasks-per-node=2",
                "--ntasks-per-socket=1",
                "--cpus-per-task=32",
                "--ntasks-per-core=1",
                "--mem-bind=v,none",
                "--cpu-bind=v,cores",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            submit_command: "sbatch".to_string(),
            submit_script_suffix: "_ibex_runScript.sbat".to_string(),
        }
    }
}

/// When baseline images are created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BaselinePolicy {
    /// Copy missing baselines from the current output on every run.
    #[default]
    Auto,
    /// Only copy baselines when explicitly accepted (`--accept-baseline`).
    Explicit,
}

/// Comparison configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ComparisonConfig {
    /// Differing pixel count above which an image is `DIFFERENT`.
    pub pixel_threshold: u64,

    /// Number of output images (sorted by name) kept as baselines.
    pub max_baseline_images: usize,

    /// Regexes stripped from log lines before text comparison.
    pub ignore_patterns: Vec<String>,

    /// Baseline creation policy.
    pub baseline_policy: BaselinePolicy,
}

impl Default for ComparisonConfig {
    fn default() -> Self {
        Self {
            pixel_threshold: 1000,
            max_baseline_images: 5,
            ignore_patterns: crate::compare::text::DEFAULT_IGNORE_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            baseline_policy: BaselinePolicy::Auto,
        }
    }
}

/// Regression detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RegressionConfig {
    /// Percent increase between the last two runs that flags a regression.
    pub threshold: f64,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self { threshold: 10.0 }
    }
}

/// How absent `(operation, timestep, rank)` samples are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum MissingSamplePolicy {
    /// Insert `0.0`.
    #[default]
    ZeroFill,
    /// Repeat the rank's last observed value for the operation (`0.0` if none).
    CarryForward,
}

/// Timing aggregation configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "kebab-case")]
pub struct TimingsConfig {
    /// Policy for ragged per-rank data.
    pub missing_samples: MissingSamplePolicy,
}
