//! Baseline comparison of generated images and captured logs.
//!
//! Comparison outcomes are data, not errors: a `DIFFERENT` image or a
//! mismatching log is recorded in the per-test JSON files and surfaces only in
//! the summary report.

use serde::{Deserialize, Serialize};

pub mod baseline;
pub mod image;
pub mod text;

pub use self::baseline::BaselineManager;
pub use self::image::ImageComparator;
pub use self::text::TextLogComparator;

/// Verdict for one generated image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageStatus {
    /// Pixel-identical to the baseline.
    #[serde(rename = "SAME")]
    Same,
    /// Some pixels differ, within the tolerated count.
    #[serde(rename = "ACCEPTABLE")]
    Acceptable,
    /// More pixels differ than tolerated.
    #[serde(rename = "DIFFERENT")]
    Different,
    /// No baseline image exists yet.
    #[serde(rename = "NO BASELINE")]
    NoBaseline,
}

impl ImageStatus {
    /// Whether this verdict fails the test.
    pub fn is_failure(self) -> bool {
        self == ImageStatus::Different
    }
}

/// Persisted result of one image comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageComparison {
    /// Image file name, shared by the output and baseline copies.
    pub image: String,

    /// Number of differing pixels; absent when there was no baseline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff_pixels: Option<u64>,

    pub status: ImageStatus,
}

/// Persisted result of the log comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextComparison {
    pub logs_match: bool,
}
