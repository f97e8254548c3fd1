//! Environment variable processing for runtime configuration overrides.
//!
//! Env var prefix: `VIGNETTE_RUNNER_`
//!
//! - `VIGNETTE_RUNNER_PROFILE` — select a configuration profile
//! - `VIGNETTE_RUNNER_THREADS` — override the child thread count
//! - `VIGNETTE_RUNNER_TIMEOUT` — kill the tool after N seconds (0 disables)
//! - `VIGNETTE_RUNNER_TOOL` — force the tool (paraview/visit)
//! - `VIGNETTE_RUNNER_PIXEL_THRESHOLD` — differing pixels allowed before `DIFFERENT`
//! - `VIGNETTE_RUNNER_MAX_BASELINE_IMAGES` — number of baseline images kept
//! - `VIGNETTE_RUNNER_REGRESSION_THRESHOLD` — percent increase that flags a regression
//! - `VIGNETTE_RUNNER_VERBOSE` — enable verbose output (1/true/yes)
//!
//! Tool install locations are read by the runner, not here:
//! `PARAVIEW_PATH`, `VISIT_PATH`, `MPI_EXEC_PATH`, `SRUN_PATH`.

use super::{Config, ToolKind};

const PREFIX: &str = "VIGNETTE_RUNNER_";

/// Read the active profile name from `VIGNETTE_RUNNER_PROFILE`.
pub fn get_profile_name() -> Option<String> {
    env_str("PROFILE")
}

/// Apply individual env var overrides to a config.
///
/// Each override is applied only if the env var is set and parses correctly.
/// Invalid values are silently ignored.
pub fn apply_env_overrides(config: &mut Config) {
    if let Some(val) = env_parse::<u32>("THREADS") {
        config.runner.threads = val;
    }

    if let Some(val) = env_parse::<u64>("TIMEOUT") {
        config.runner.timeout = if val == 0 { None } else { Some(val) };
    }

    if let Some(val) = env_str("TOOL") {
        if let Ok(tool) = val.parse::<ToolKind>() {
            config.runner.tool = Some(tool);
        }
    }

    if let Some(val) = env_parse::<u64>("PIXEL_THRESHOLD") {
        config.comparison.pixel_threshold = val;
    }

    if let Some(val) = env_parse::<usize>("MAX_BASELINE_IMAGES") {
        config.comparison.max_baseline_images = val;
    }

    if let Some(val) = env_parse::<f64>("REGRESSION_THRESHOLD") {
        config.regression.threshold = val;
    }

    if let Some(val) = env_bool("VERBOSE") {
        config.verbose = val;
    }
}

/// Summarize which env var overrides are currently active.
///
/// Returns a list of `(env_var_name, value)` pairs for verbose startup output.
pub fn detect_active_overrides() -> Vec<(String, String)> {
    let keys = [
        "PROFILE",
        "THREADS",
        "TIMEOUT",
        "TOOL",
        "PIXEL_THRESHOLD",
        "MAX_BASELINE_IMAGES",
        "REGRESSION_THRESHOLD",
        "VERBOSE",
    ];

    let mut active = Vec::new();
    for key in keys {
        let full = format!("{PREFIX}{key}");
        if let Ok(val) = std::env::var(&full) {
            if !val.is_empty() {
                active.push((full, val));
            }
        }
    }
    active
}

// --- helpers ---

fn env_str(suffix: &str) -> Option<String> {
    std::env::var(format!("{PREFIX}{suffix}"))
        .ok()
        .filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(suffix: &str) -> Option<T> {
    env_str(suffix).and_then(|s| s.parse().ok())
}

fn env_bool(suffix: &str) -> Option<bool> {
    env_str(suffix).map(|s| matches!(s.to_lowercase().as_str(), "1" | "true" | "yes"))
}
