use crate::config::BaselinePolicy;
use crate::core::error::Result;
use crate::util::fs::{copy_file, ensure_dir_exists};
use std::path::Path;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

/// Selects comparison images and seeds missing baselines.
///
/// Under [`BaselinePolicy::Auto`] the first run of a test copies its images
/// into `Testing/Baseline/`, so a broken first run becomes the reference.
/// [`BaselinePolicy::Explicit`] only copies when the caller accepts.
#[derive(Debug, Clone, Copy)]
pub struct BaselineManager {
    max_images: usize,
    policy: BaselinePolicy,
}

impl BaselineManager {
    /// Create a manager keeping at most `max_images` baselines per test.
    pub fn new(max_images: usize, policy: BaselinePolicy) -> Self {
        Self { max_images, policy }
    }

    /// The first `max_images` image names in `output_dir`, sorted.
    ///
    /// Returns an empty list when the directory does not exist.
    pub fn selected_images(&self, output_dir: &Path) -> Result<Vec<String>> {
        if !output_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names: Vec<String> = std::fs::read_dir(output_dir)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| is_image(name))
            .collect();
        names.sort();
        names.truncate(self.max_images);
        Ok(names)
    }

    /// Copy missing baselines for the selected images.
    ///
    /// Existing baselines are never overwritten. Returns the selected image
    /// names, which are the ones to compare.
    pub fn ensure_baselines(
        &self,
        output_dir: &Path,
        baseline_dir: &Path,
        accept: bool,
    ) -> Result<Vec<String>> {
        ensure_dir_exists(baseline_dir)?;

        let selected = self.selected_images(output_dir)?;
        if selected.is_empty() {
            tracing::info!(
                dir = %output_dir.display(),
                "no output images found, skipping baseline creation"
            );
            return Ok(selected);
        }

        let may_create = match self.policy {
            BaselinePolicy::Auto => true,
            BaselinePolicy::Explicit => accept,
        };

        for name in &selected {
            let dest = baseline_dir.join(name);
            if dest.exists() {
                continue;
            }
            if may_create {
                copy_file(&output_dir.join(name), &dest)?;
                tracing::info!(image = %name, "created baseline");
            } else {
                tracing::warn!(
                    image = %name,
                    "no baseline; rerun with --accept-baseline to record one"
                );
            }
        }

        Ok(selected)
    }
}

impl Default for BaselineManager {
    fn default() -> Self {
        Self::new(5, BaselinePolicy::Auto)
    }
}

fn is_image(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output_with(names: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("output");
        std::fs::create_dir_all(&out).unwrap();
        for name in names {
            std::fs::write(out.join(name), name.as_bytes()).unwrap();
        }
        dir
    }

    #[test]
    fn test_selected_images_sorted_and_capped() {
        let dir = output_with(&[
            "f.png", "b.jpg", "a.png", "e.jpeg", "d.png", "c.png", "notes.txt",
        ]);
        let selected = BaselineManager::default()
            .selected_images(&dir.path().join("output"))
            .unwrap();
        assert_eq!(selected, ["a.png", "b.jpg", "c.png", "d.png", "e.jpeg"]);
    }

    #[test]
    fn test_missing_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let baseline = dir.path().join("Testing/Baseline");
        let selected = BaselineManager::default()
            .ensure_baselines(&dir.path().join("output"), &baseline, false)
            .unwrap();
        assert!(selected.is_empty());
        assert!(baseline.is_dir());
    }

    #[test]
    fn test_auto_policy_copies_missing() {
        let dir = output_with(&["a.png", "b.png"]);
        let baseline = dir.path().join("Testing/Baseline");
        std::fs::create_dir_all(&baseline).unwrap();
        std::fs::write(baseline.join("a.png"), b"old").unwrap();

        BaselineManager::default()
            .ensure_baselines(&dir.path().join("output"), &baseline, false)
            .unwrap();

        assert_eq!(std::fs::read(baseline.join("a.png")).unwrap(), b"old");
        assert_eq!(std::fs::read(baseline.join("b.png")).unwrap(), b"b.png");
    }

    #[test]
    fn test_explicit_policy_requires_accept() {
        let dir = output_with(&["a.png"]);
        let baseline = dir.path().join("Testing/Baseline");
        let manager = BaselineManager::new(5, BaselinePolicy::Explicit);

        manager
            .ensure_baselines(&dir.path().join("output"), &baseline, false)
            .unwrap();
        assert!(!baseline.join("a.png").exists());

        manager
            .ensure_baselines(&dir.path().join("output"), &baseline, true)
            .unwrap();
        assert!(baseline.join("a.png").exists());
    }
}
