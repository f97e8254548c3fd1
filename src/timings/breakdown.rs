use super::{is_timing_file, parser};
use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File written by [`OperationBreakdown::write`].
pub const BREAKDOWN_FILE_NAME: &str = "kombyne_breakdown.json";

const ROOT: &str = "Total";

/// Total time per operation across every rank and step, as a flat
/// hierarchy under a single `Total` root.
///
/// The four arrays are parallel; index 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationBreakdown {
    pub ids: Vec<String>,
    pub parents: Vec<String>,
    pub values: Vec<f64>,
    pub names: Vec<String>,
}

impl OperationBreakdown {
    /// Build from `(operation, seconds)` pairs. Operations are summed and
    /// sorted by name.
    pub fn from_samples<'a, I>(samples: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
        for (name, seconds) in samples {
            *totals.entry(name).or_insert(0.0) += seconds;
        }

        let total: f64 = totals.values().sum();
        let mut breakdown = Self {
            ids: vec![ROOT.to_string()],
            parents: vec![String::new()],
            values: vec![total],
            names: vec![ROOT.to_string()],
        };
        for (name, seconds) in totals {
            breakdown.ids.push(name.to_string());
            breakdown.parents.push(ROOT.to_string());
            breakdown.values.push(seconds);
            breakdown.names.push(name.to_string());
        }
        breakdown
    }

    /// Read the comma-format `timings.*.txt` files of `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| is_timing_file(n) && n.ends_with(".txt"))
            })
            .collect();
        if files.is_empty() {
            return Err(Error::timing(format!(
                "no 'timings.*.txt' files found in {}",
                dir.display()
            )));
        }
        files.sort();
        tracing::info!(count = files.len(), "processing timing files");

        let mut samples = Vec::new();
        for path in &files {
            let bytes = std::fs::read(path)?;
            samples.extend(
                parser::parse_lines(&String::from_utf8_lossy(&bytes))
                    .into_iter()
                    .filter(|s| s.format == parser::LineFormat::Timer),
            );
        }
        if samples.is_empty() {
            return Err(Error::timing("no valid timing data was parsed"));
        }

        Ok(Self::from_samples(
            samples
                .iter()
                .map(|s| (s.operation.as_str(), s.elapsed_seconds)),
        ))
    }

    /// Number of operations, excluding the root.
    pub fn len(&self) -> usize {
        self.ids.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write [`BREAKDOWN_FILE_NAME`] into `dir`.
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(BREAKDOWN_FILE_NAME);
        crate::util::fs::write_json_pretty(&path, self)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sums_across_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("timings.0.txt"),
            "# kombyne timers\nTimerId,Level,Start,End,Time,Name\n1,0,0,1,1.0,execute\n2,1,0,1,0.5,contour\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("timings.1.txt"),
            "1,0,0,1,2.0,execute\n2,1,0,1,0.25,contour\nbroken,line\nr1 contour 9.0\n",
        )
        .unwrap();

        let breakdown = OperationBreakdown::from_dir(dir.path()).unwrap();
        assert_eq!(breakdown.ids, ["Total", "contour", "execute"]);
        assert_eq!(breakdown.parents, ["", "Total", "Total"]);
        assert_eq!(breakdown.values, [3.75, 0.75, 3.0]);
        assert_eq!(breakdown.names, breakdown.ids);
        assert_eq!(breakdown.len(), 2);
    }

    #[test]
    fn test_arrays_are_parallel() {
        let breakdown = OperationBreakdown::from_samples([("a", 1.0), ("b", 2.0), ("a", 1.0)]);
        assert_eq!(breakdown.ids.len(), breakdown.values.len());
        assert_eq!(breakdown.parents.len(), breakdown.names.len());
        assert_eq!(breakdown.values[0], 4.0);
    }

    #[test]
    fn test_no_files() {
        let dir = tempfile::tempdir().unwrap();
        let err = OperationBreakdown::from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Timing(_)));
    }

    #[test]
    fn test_write() {
        let dir = tempfile::tempdir().unwrap();
        let path = OperationBreakdown::from_samples([("a", 1.0)])
            .write(dir.path())
            .unwrap();
        let back: OperationBreakdown = crate::util::fs::read_json(&path).unwrap();
        assert_eq!(back.names, ["Total", "a"]);
    }
}
