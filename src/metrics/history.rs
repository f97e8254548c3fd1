//! Append-only per-machine performance history.
//!
//! File layout: `Testing/performance_metrics_<machine>.json`, a JSON object
//! mapping ISO-8601 timestamps to [`MetricsRecord`]s. Writers hold an
//! exclusive advisory lock on a sibling `.lock` file for the whole
//! read-modify-write, so concurrent orchestrators on one machine don't lose
//! entries.

use super::{Metric, MetricsRecord};
use crate::core::error::Result;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

/// Timestamp format used for history keys (local time, microseconds).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Performance history of one test on one machine, ordered by timestamp.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PerformanceHistory {
    entries: BTreeMap<String, MetricsRecord>,
}

impl PerformanceHistory {
    /// Load history from `path`; a missing file is an empty history.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parse history from JSON text.
    pub fn from_json(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let entries: BTreeMap<String, MetricsRecord> = serde_json::from_str(content)?;
        Ok(Self { entries })
    }

    /// Append `record` under `timestamp` to the file at `path`.
    ///
    /// Creates the file (and parent directory) when absent. Existing entries
    /// are never rewritten except to re-serialize them.
    pub fn append(path: &Path, timestamp: &str, record: MetricsRecord) -> Result<()> {
        if let Some(parent) = path.parent() {
            crate::util::fs::ensure_dir_exists(parent)?;
        }

        let _lock = FileLock::acquire(&lock_path(path))?;
        let mut history = Self::load(path)?;
        history.insert(timestamp, record);
        history.save(path)
    }

    /// Current local time formatted as a history key.
    pub fn timestamp_now() -> String {
        chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
    }

    /// Insert a record in memory.
    pub fn insert(&mut self, timestamp: impl Into<String>, record: MetricsRecord) {
        self.entries.insert(timestamp.into(), record);
    }

    /// Write the whole history to `path` as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Number of recorded runs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no runs are recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in chronological order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &MetricsRecord)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Values of `metric` in chronological order, skipping records without it.
    pub fn series(&self, metric: Metric) -> Vec<f64> {
        self.entries
            .values()
            .filter_map(|record| record.value(metric))
            .collect()
    }

    /// Most recent record, if any.
    pub fn latest(&self) -> Option<&MetricsRecord> {
        self.entries.values().next_back()
    }
}

/// List the `performance_metrics_<machine>.json` files in a Testing directory.
///
/// Returns `(machine_name, path)` pairs sorted by machine name.
pub fn machine_files(testing_dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    if !testing_dir.is_dir() {
        return Ok(files);
    }
    for entry in std::fs::read_dir(testing_dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(machine) = name
            .strip_prefix("performance_metrics_")
            .and_then(|rest| rest.strip_suffix(".json"))
        {
            if !machine.is_empty() {
                files.push((machine.to_string(), path.clone()));
            }
        }
    }
    files.sort();
    Ok(files)
}

fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".lock");
    path.with_file_name(name)
}

/// Exclusive advisory lock held for the lifetime of the value.
struct FileLock {
    file: File,
}

impl FileLock {
    fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            // SAFETY: the descriptor is owned by `file`, which outlives the lock.
            let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
            if rc != 0 {
                return Err(std::io::Error::last_os_error().into());
            }
        }

        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            // SAFETY: see `acquire`.
            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }
        #[cfg(not(unix))]
        {
            let _ = &self.file;
        }
    }
}
