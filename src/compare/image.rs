use super::{ImageComparison, ImageStatus};
use crate::core::error::Result;
use ::image::RgbaImage;
use std::path::Path;

/// Counts differing pixels between an output image and its baseline.
#[derive(Debug, Clone, Copy)]
pub struct ImageComparator {
    pixel_threshold: u64,
}

impl ImageComparator {
    /// Create a comparator tolerating up to `pixel_threshold` differing pixels.
    pub fn new(pixel_threshold: u64) -> Self {
        Self { pixel_threshold }
    }

    /// Classify a differing-pixel count.
    pub fn classify(&self, diff_pixels: u64) -> ImageStatus {
        if diff_pixels == 0 {
            ImageStatus::Same
        } else if diff_pixels <= self.pixel_threshold {
            ImageStatus::Acceptable
        } else {
            ImageStatus::Different
        }
    }

    /// Compare `<output_dir>/<name>` against `<baseline_dir>/<name>`.
    ///
    /// A missing baseline yields `NO BASELINE`. An output image that is
    /// missing or cannot be decoded is reported as `DIFFERENT`.
    pub fn compare(&self, name: &str, baseline_dir: &Path, output_dir: &Path) -> ImageComparison {
        let baseline_path = baseline_dir.join(name);
        if !baseline_path.is_file() {
            return ImageComparison {
                image: name.to_string(),
                diff_pixels: None,
                status: ImageStatus::NoBaseline,
            };
        }

        match self.diff_files(&baseline_path, &output_dir.join(name)) {
            Ok(diff_pixels) => ImageComparison {
                image: name.to_string(),
                diff_pixels: Some(diff_pixels),
                status: self.classify(diff_pixels),
            },
            Err(e) => {
                tracing::warn!(image = name, error = %e, "could not compare image");
                ImageComparison {
                    image: name.to_string(),
                    diff_pixels: None,
                    status: ImageStatus::Different,
                }
            }
        }
    }

    /// Decode two image files and count their differing pixels.
    pub fn diff_files(&self, baseline: &Path, output: &Path) -> Result<u64> {
        let baseline = ::image::open(baseline)?.to_rgba8();
        let output = ::image::open(output)?.to_rgba8();
        Ok(count_differing_pixels(&baseline, &output))
    }
}

impl Default for ImageComparator {
    fn default() -> Self {
        Self::new(1000)
    }
}

/// Count pixels whose summed absolute channel difference exceeds 1.
///
/// When sizes differ, pixels present in only one image count as differing.
pub fn count_differing_pixels(a: &RgbaImage, b: &RgbaImage) -> u64 {
    let (aw, ah) = a.dimensions();
    let (bw, bh) = b.dimensions();
    let mut count = 0u64;

    for y in 0..ah.max(bh) {
        for x in 0..aw.max(bw) {
            let in_a = x < aw && y < ah;
            let in_b = x < bw && y < bh;
            match (in_a, in_b) {
                (true, true) => {
                    let pa = a.get_pixel(x, y).0;
                    let pb = b.get_pixel(x, y).0;
                    let delta: u32 = pa
                        .iter()
                        .zip(pb.iter())
                        .map(|(ca, cb)| u32::from(ca.abs_diff(*cb)))
                        .sum();
                    if delta > 1 {
                        count += 1;
                    }
                }
                (true, false) | (false, true) => count += 1,
                (false, false) => {}
            }
        }
    }

    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::Rgba;

    fn solid(w: u32, h: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(color))
    }

    fn with_changed_pixels(base: &RgbaImage, k: u32) -> RgbaImage {
        let mut img = base.clone();
        let w = img.width();
        for i in 0..k {
            img.put_pixel(i % w, i / w, Rgba([255, 0, 0, 255]));
        }
        img
    }

    #[test]
    fn test_identical_images_same() {
        let a = solid(64, 64, [10, 20, 30, 255]);
        assert_eq!(count_differing_pixels(&a, &a), 0);
        assert_eq!(ImageComparator::default().classify(0), ImageStatus::Same);
    }

    #[test]
    fn test_small_channel_noise_ignored() {
        let a = solid(4, 4, [10, 20, 30, 255]);
        let mut b = a.clone();
        b.put_pixel(0, 0, Rgba([11, 20, 30, 255]));
        assert_eq!(count_differing_pixels(&a, &b), 0);
        b.put_pixel(1, 0, Rgba([11, 21, 30, 255]));
        assert_eq!(count_differing_pixels(&a, &b), 1);
    }

    #[test]
    fn test_classification_bands() {
        let base = solid(100, 100, [0, 0, 0, 255]);
        let comparator = ImageComparator::new(1000);

        let one = count_differing_pixels(&base, &with_changed_pixels(&base, 1));
        assert_eq!(one, 1);
        assert_eq!(comparator.classify(one), ImageStatus::Acceptable);

        let edge = count_differing_pixels(&base, &with_changed_pixels(&base, 1000));
        assert_eq!(edge, 1000);
        assert_eq!(comparator.classify(edge), ImageStatus::Acceptable);

        let over = count_differing_pixels(&base, &with_changed_pixels(&base, 1001));
        assert_eq!(over, 1001);
        assert_eq!(comparator.classify(over), ImageStatus::Different);
    }

    #[test]
    fn test_size_mismatch_counts_uncovered_pixels() {
        let a = solid(10, 10, [0, 0, 0, 255]);
        let b = solid(10, 12, [0, 0, 0, 255]);
        assert_eq!(count_differing_pixels(&a, &b), 20);
    }

    #[test]
    fn test_compare_files() {
        let dir = tempfile::tempdir().unwrap();
        let baseline_dir = dir.path().join("Baseline");
        let output_dir = dir.path().join("output");
        std::fs::create_dir_all(&baseline_dir).unwrap();
        std::fs::create_dir_all(&output_dir).unwrap();

        let base = solid(50, 50, [0, 0, 0, 255]);
        base.save(baseline_dir.join("view.png")).unwrap();
        with_changed_pixels(&base, 5)
            .save(output_dir.join("view.png"))
            .unwrap();

        let result = ImageComparator::default().compare("view.png", &baseline_dir, &output_dir);
        assert_eq!(result.status, ImageStatus::Acceptable);
        assert_eq!(result.diff_pixels, Some(5));
    }

    #[test]
    fn test_compare_without_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let result = ImageComparator::default().compare("view.png", dir.path(), dir.path());
        assert_eq!(result.status, ImageStatus::NoBaseline);
        assert_eq!(result.diff_pixels, None);
    }

    #[test]
    fn test_compare_undecodable_output() {
        let dir = tempfile::tempdir().unwrap();
        solid(2, 2, [0, 0, 0, 255])
            .save(dir.path().join("base.png"))
            .unwrap();
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        std::fs::write(out.join("base.png"), b"not a png").unwrap();

        let result = ImageComparator::default().compare("base.png", dir.path(), &out);
        assert_eq!(result.status, ImageStatus::Different);
    }
}
