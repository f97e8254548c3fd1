use super::TestCase;
use crate::core::error::Result;
use std::path::{Path, PathBuf};

/// Generated files removed by a clean. Baselines and history are kept.
pub const CLEAN_PATTERNS: &[&str] = &[
    "image_comparison_results.json",
    "text_comparison_results.json",
    "output.log",
    "error.log",
    "execution_time_*",
    "cpu_usage_*",
    "memory_usage_*",
    "*_summary_report.json",
    "visitlog.py",
];

/// Match `name` against a pattern with at most one `*` wildcard.
pub fn matches_pattern(pattern: &str, name: &str) -> bool {
    match pattern.split_once('*') {
        Some((prefix, suffix)) => {
            name.len() >= prefix.len() + suffix.len()
                && name.starts_with(prefix)
                && name.ends_with(suffix)
        }
        None => pattern == name,
    }
}

/// Remove generated files directly inside `dir`. Subdirectories are untouched.
pub fn clean_dir(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    if !dir.is_dir() {
        return Ok(removed);
    }

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if CLEAN_PATTERNS.iter().any(|p| matches_pattern(p, name)) {
            std::fs::remove_file(&path)?;
            tracing::info!(path = %path.display(), "removed");
            removed.push(path);
        }
    }

    removed.sort();
    Ok(removed)
}

/// Clean every case's `Testing/` directory and the suite report directory.
pub fn clean(cases: &[TestCase], report_dir: &Path) -> Result<usize> {
    let mut count = 0;
    for case in cases {
        count += clean_dir(&case.testing_dir())?.len();
    }
    count += clean_dir(report_dir)?.len();
    Ok(count)
}
