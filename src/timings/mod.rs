//! Aggregation of per-rank timing logs into chart-ready tables.
//!
//! Each rank writes its own file (`timings.<rank>.txt` or
//! `ascent_filter_times_<rank>.csv`). Line order within a file is the
//! timestep order for that rank. The aggregate maps
//! `operation → timestep → [seconds per rank]`.

use crate::config::MissingSamplePolicy;
use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

pub mod breakdown;
pub mod parser;

pub use breakdown::OperationBreakdown;
pub use parser::{LineFormat, TimingSample};

/// Reserved operation holding whole-step elapsed time.
pub const TOTAL_OPERATION: &str = "[total]";

/// File written by [`TimingLogAggregator::write_summary`].
pub const SUMMARY_FILE_NAME: &str = "ascent_timings_summary.json";

/// A timing file and the rank parsed from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankFile {
    pub rank: u32,
    pub path: PathBuf,
}

/// Whether `name` looks like a per-rank timing file.
pub fn is_timing_file(name: &str) -> bool {
    (name.starts_with("timings.") && name.ends_with(".txt"))
        || (name.starts_with("ascent_filter_times_") && name.ends_with(".csv"))
}

/// Extract the rank from a timing file name (`..._<n>.csv`, `....<n>.txt`).
pub fn rank_from_file_name(name: &str) -> Option<u32> {
    let stem = name
        .strip_suffix(".txt")
        .or_else(|| name.strip_suffix(".csv"))?;
    let digits_start = stem
        .rfind(|c: char| !c.is_ascii_digit())
        .map_or(0, |i| i + 1);
    let (prefix, digits) = stem.split_at(digits_start);
    if digits.is_empty() || !(prefix.ends_with('_') || prefix.ends_with('.')) {
        return None;
    }
    digits.parse().ok()
}

/// Samples of one rank, keeping the order operations were first seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RankSamples {
    first_seen: Vec<String>,
    by_operation: HashMap<String, Vec<f64>>,
}

impl RankSamples {
    /// Record one sample; its index is the operation's next timestep.
    pub fn push(&mut self, operation: &str, seconds: f64) {
        match self.by_operation.get_mut(operation) {
            Some(values) => values.push(seconds),
            None => {
                self.first_seen.push(operation.to_string());
                self.by_operation.insert(operation.to_string(), vec![seconds]);
            }
        }
    }

    /// Samples of `operation` in timestep order.
    pub fn get(&self, operation: &str) -> &[f64] {
        self.by_operation
            .get(operation)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Whether no operation was recorded.
    pub fn is_empty(&self) -> bool {
        self.first_seen.is_empty()
    }

    /// Number of timesteps this rank ran: `[total]` count, else the first
    /// operation's count.
    pub fn step_count(&self) -> Option<usize> {
        if let Some(total) = self.by_operation.get(TOTAL_OPERATION) {
            return Some(total.len());
        }
        self.first_seen.first().map(|op| self.get(op).len())
    }

    fn operations(&self) -> impl Iterator<Item = &str> {
        self.first_seen.iter().map(|s| s.as_str())
    }
}

/// `operation → timestep → per-rank seconds`, ranks in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimingTable {
    pub operations: BTreeMap<String, BTreeMap<usize, Vec<f64>>>,
}

impl TimingTable {
    /// Number of timesteps (taken from any operation; all have the same count).
    pub fn num_steps(&self) -> usize {
        self.operations.values().next().map_or(0, |steps| steps.len())
    }

    /// Number of ranks per timestep entry.
    pub fn num_ranks(&self) -> usize {
        self.operations
            .values()
            .next()
            .and_then(|steps| steps.values().next())
            .map_or(0, |ranks| ranks.len())
    }

    /// Per-step entries of one operation.
    pub fn operation(&self, name: &str) -> Option<&BTreeMap<usize, Vec<f64>>> {
        self.operations.get(name)
    }

    /// Load a table previously written as JSON.
    pub fn load(path: &Path) -> Result<Self> {
        crate::util::fs::read_json(path)
    }
}

/// Turns a directory of per-rank timing files into one [`TimingTable`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TimingLogAggregator {
    policy: MissingSamplePolicy,
}

impl TimingLogAggregator {
    /// Create an aggregator filling ragged data with `policy`.
    pub fn new(policy: MissingSamplePolicy) -> Self {
        Self { policy }
    }

    /// Find timing files in `dir`, sorted by rank.
    ///
    /// Files whose name carries no rank are dropped with a warning.
    pub fn discover(&self, dir: &Path) -> Result<Vec<RankFile>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !is_timing_file(name) || !path.is_file() {
                continue;
            }
            match rank_from_file_name(name) {
                Some(rank) => files.push(RankFile {
                    rank,
                    path: path.clone(),
                }),
                None => tracing::warn!(file = name, "could not extract rank, skipping"),
            }
        }
        files.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.path.cmp(&b.path)));
        Ok(files)
    }

    /// Read every file into per-rank sample sequences.
    ///
    /// Several files naming the same rank are concatenated in path order.
    pub fn read(&self, files: &[RankFile]) -> Result<BTreeMap<u32, RankSamples>> {
        let mut per_rank: BTreeMap<u32, RankSamples> = BTreeMap::new();
        for file in files {
            let bytes = std::fs::read(&file.path)?;
            let content = String::from_utf8_lossy(&bytes);
            for sample in parser::parse_lines(&content) {
                per_rank
                    .entry(file.rank)
                    .or_default()
                    .push(&sample.operation, sample.elapsed_seconds);
            }
        }
        Ok(per_rank)
    }

    /// Build the table from per-rank samples.
    ///
    /// The first rank decides the number of timesteps. Every
    /// `(operation, timestep)` entry holds exactly one value per rank;
    /// absent samples are filled per the [`MissingSamplePolicy`].
    pub fn aggregate(&self, per_rank: &BTreeMap<u32, RankSamples>) -> Result<TimingTable> {
        let (first_rank, first) = per_rank
            .iter()
            .next()
            .ok_or_else(|| Error::timing("no valid timing data was parsed"))?;
        let num_steps = first.step_count().ok_or_else(|| {
            Error::timing(format!(
                "rank {} has no operations; cannot determine number of steps",
                first_rank
            ))
        })?;

        let mut all_ops: Vec<&str> = per_rank.values().flat_map(|r| r.operations()).collect();
        all_ops.sort_unstable();
        all_ops.dedup();

        let mut table = TimingTable::default();
        for op in all_ops {
            let mut steps = BTreeMap::new();
            for step in 0..num_steps {
                let row = per_rank
                    .values()
                    .map(|samples| self.sample_at(samples.get(op), step))
                    .collect();
                steps.insert(step, row);
            }
            table.operations.insert(op.to_string(), steps);
        }

        Ok(table)
    }

    fn sample_at(&self, values: &[f64], step: usize) -> f64 {
        match values.get(step) {
            Some(v) => *v,
            None => match self.policy {
                MissingSamplePolicy::ZeroFill => 0.0,
                MissingSamplePolicy::CarryForward => values.last().copied().unwrap_or(0.0),
            },
        }
    }

    /// Discover, read and aggregate the timing files in `dir`.
    pub fn aggregate_dir(&self, dir: &Path) -> Result<TimingTable> {
        let files = self.discover(dir)?;
        if files.is_empty() {
            return Err(Error::timing(format!(
                "no 'timings.*.txt' or 'ascent_filter_times_*.csv' files found in {}",
                dir.display()
            )));
        }
        tracing::info!(count = files.len(), "processing timing files");

        let per_rank = self.read(&files)?;
        if per_rank.values().all(|r| r.is_empty()) {
            return Err(Error::timing("no valid timing data was parsed"));
        }
        self.aggregate(&per_rank)
    }

    /// Aggregate `dir` and write [`SUMMARY_FILE_NAME`] into it.
    pub fn write_summary(&self, dir: &Path) -> Result<PathBuf> {
        let table = self.aggregate_dir(dir)?;
        let path = dir.join(SUMMARY_FILE_NAME);
        crate::util::fs::write_json_pretty(&path, &table)?;
        tracing::info!(path = %path.display(), "wrote timing summary");
        Ok(path)
    }
}
