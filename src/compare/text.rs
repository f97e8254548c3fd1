use crate::core::error::{Error, Result};
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;

/// Patterns stripped from every log line before comparison.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    // POSIX paths
    r"/[^ ]+/",
    // Windows paths
    r"[a-zA-Z]:\\[^ ]+",
    // dates: YYYY-MM-DD, DD/MM/YYYY, ...
    r"\d{2,4}[-/]\d{2}[-/]\d{2,4}",
    // clock times
    r"\d+:\d+:\d+",
];

/// Checks that a captured log still contains every line of a reference log.
pub struct TextLogComparator {
    ignore: Vec<Regex>,
}

impl TextLogComparator {
    /// Create a comparator from a list of ignore patterns.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let ignore = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|e| {
                    Error::comparison(format!("invalid ignore pattern '{}': {}", p.as_ref(), e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { ignore })
    }

    /// Strip volatile substrings from one line and trim it.
    pub fn clean_line(&self, line: &str) -> String {
        let mut cleaned = line.to_string();
        for pattern in &self.ignore {
            cleaned = pattern.replace_all(&cleaned, "").into_owned();
        }
        cleaned.trim().to_string()
    }

    /// Whether every cleaned, non-empty reference line appears in the candidate.
    ///
    /// Set containment: one candidate line may satisfy several identical
    /// reference lines, and order is ignored.
    pub fn matches(&self, candidate: &str, reference: &str) -> bool {
        let candidate_lines: HashSet<String> = candidate
            .lines()
            .map(|l| self.clean_line(l))
            .filter(|l| !l.is_empty())
            .collect();

        reference
            .lines()
            .map(|l| self.clean_line(l))
            .filter(|l| !l.is_empty())
            .all(|l| candidate_lines.contains(&l))
    }

    /// Compare a log file against a reference file.
    pub fn compare_files(&self, candidate: &Path, reference: &Path) -> Result<bool> {
        let candidate = read_lossy(candidate)?;
        let reference = read_lossy(reference)?;
        Ok(self.matches(&candidate, &reference))
    }
}

impl Default for TextLogComparator {
    fn default() -> Self {
        Self {
            ignore: DEFAULT_IGNORE_PATTERNS
                .iter()
                .filter_map(|p| Regex::new(p).ok())
                .collect(),
        }
    }
}

fn read_lossy(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_only_difference_matches() {
        let cmp = TextLogComparator::default();
        let reference = "Loading /home/alice/data/gs.bp\nRendering done\n";
        let candidate = "Loading /scratch/ci/run42/gs.bp\nRendering done\n";
        assert!(cmp.matches(candidate, reference));
    }

    #[test]
    fn test_changed_message_fails() {
        let cmp = TextLogComparator::default();
        let reference = "Rendering done\n";
        let candidate = "Rendering failed\n";
        assert!(!cmp.matches(candidate, reference));
    }

    #[test]
    fn test_dates_and_times_stripped() {
        let cmp = TextLogComparator::default();
        let reference = "2024-01-05 10:11:12 step complete\n";
        let candidate = "2025-11-05 23:59:01 step complete\n";
        assert!(cmp.matches(candidate, reference));
    }

    #[test]
    fn test_windows_paths_stripped() {
        let cmp = TextLogComparator::default();
        assert_eq!(cmp.clean_line(r"wrote C:\Users\bob\out.png ok"), "wrote  ok");
    }

    #[test]
    fn test_set_containment_semantics() {
        let cmp = TextLogComparator::default();
        // duplicate reference lines are satisfied by a single candidate line
        assert!(cmp.matches("a\nextra\n", "a\na\n"));
        // order is ignored
        assert!(cmp.matches("b\na\n", "a\nb\n"));
        // blank reference lines are ignored
        assert!(cmp.matches("a\n", "\n   \na\n"));
    }

    #[test]
    fn test_empty_reference_matches() {
        let cmp = TextLogComparator::default();
        assert!(cmp.matches("anything", ""));
    }

    #[test]
    fn test_invalid_pattern() {
        let result = TextLogComparator::new(&["(unclosed"]);
        let err = result.err().unwrap();
        assert!(err.to_string().contains("invalid ignore pattern"));
    }

    #[test]
    fn test_compare_files() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("output.log");
        let known = dir.path().join("known_good_value.txt");
        std::fs::write(&log, "VisIt: Message - Rendering window 1...\nSaved /tmp/x/a.png\n").unwrap();
        std::fs::write(&known, "Saved /data/y/a.png\n").unwrap();

        let cmp = TextLogComparator::default();
        assert!(cmp.compare_files(&log, &known).unwrap());
    }
}
