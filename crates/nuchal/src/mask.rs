//! Probability map → binary mask at the original frame resolution.

use image::imageops::FilterType;
use image::{GrayImage, ImageBuffer, Luma};

use crate::raster::{gray_from_rows, rows_from_gray, RasterError};

/// Per-pixel foreground probability at the model working resolution.
pub type ProbabilityMap = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Thresholding parameters for segmentation output.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MaskConfig {
    /// Pixels with probability strictly above this value become foreground.
    pub threshold: f32,
}

impl Default for MaskConfig {
    fn default() -> Self {
        Self { threshold: 0.5 }
    }
}

/// Segmentation mask whose pixels are exactly 0 (background) or 1 (foreground).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask(GrayImage);

impl BinaryMask {
    /// All-background mask.
    pub fn zeros(width: u32, height: u32) -> Self {
        Self(GrayImage::new(width, height))
    }

    /// Treat every non-zero pixel of `img` as foreground.
    pub fn from_gray_nonzero(img: &GrayImage) -> Self {
        let mut out = img.clone();
        for p in out.pixels_mut() {
            p[0] = u8::from(p[0] != 0);
        }
        Self(out)
    }

    /// Build from row-major rows; non-zero values become foreground.
    pub fn from_rows(rows: &[Vec<u8>]) -> Result<Self, RasterError> {
        Ok(Self::from_gray_nonzero(&gray_from_rows(rows)?))
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    /// Value (0 or 1) at `(x, y)`; out-of-bounds reads as background.
    pub fn get(&self, x: u32, y: u32) -> u8 {
        if x < self.width() && y < self.height() {
            self.0.get_pixel(x, y)[0]
        } else {
            0
        }
    }

    /// Number of foreground pixels.
    pub fn foreground_count(&self) -> usize {
        self.0.as_raw().iter().filter(|&&v| v != 0).count()
    }

    /// True when no pixel is foreground.
    pub fn is_empty(&self) -> bool {
        self.0.as_raw().iter().all(|&v| v == 0)
    }

    /// Borrow the underlying 0/1 image.
    pub fn as_image(&self) -> &GrayImage {
        &self.0
    }

    /// Row-major 0/1 rows, the wire form of the mask.
    pub fn to_rows(&self) -> Vec<Vec<u8>> {
        rows_from_gray(&self.0)
    }

    /// 0/255 rendering suitable for saving as an image.
    pub fn to_display_image(&self) -> GrayImage {
        let mut out = self.0.clone();
        for p in out.pixels_mut() {
            p[0] = p[0].saturating_mul(255);
        }
        out
    }
}

/// Resize a probability map to `original_size = [width, height]` and threshold it.
///
/// Resampling uses Lanczos3, matching the interpolation used when the frame was
/// shrunk to the working resolution. NaN probabilities are background.
pub fn binarize_probabilities(
    probs: &ProbabilityMap,
    original_size: [u32; 2],
    config: &MaskConfig,
) -> BinaryMask {
    let [w, h] = original_size;
    if w == 0 || h == 0 {
        return BinaryMask::zeros(w, h);
    }
    if probs.width() == 0 || probs.height() == 0 {
        tracing::warn!("empty probability map; returning an all-background mask");
        return BinaryMask::zeros(w, h);
    }

    let resized;
    let source = if probs.dimensions() == (w, h) {
        probs
    } else {
        resized = image::imageops::resize(probs, w, h, FilterType::Lanczos3);
        &resized
    };

    let t = config.threshold;
    let mask = GrayImage::from_fn(w, h, |x, y| Luma([u8::from(source.get_pixel(x, y)[0] > t)]));
    let out = BinaryMask(mask);
    tracing::debug!(
        "binarized {}x{} map to {}x{} mask ({} foreground px)",
        probs.width(),
        probs.height(),
        w,
        h,
        out.foreground_count()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::disk_probability_map;

    #[test]
    fn every_cell_is_zero_or_one() {
        let probs = disk_probability_map(60, 40, [30.0, 20.0], 10.0);
        let mask = binarize_probabilities(&probs, [90, 70], &MaskConfig::default());
        assert_eq!(mask.dimensions(), (90, 70));
        assert!(mask.as_image().as_raw().iter().all(|&v| v <= 1));
        assert!(mask.foreground_count() > 0);
    }

    #[test]
    fn all_below_and_all_above_threshold() {
        let low = ProbabilityMap::from_pixel(30, 20, Luma([0.1]));
        let empty = binarize_probabilities(&low, [45, 30], &MaskConfig::default());
        assert!(empty.is_empty());
        assert_eq!(empty.dimensions(), (45, 30));

        let high = ProbabilityMap::from_pixel(30, 20, Luma([0.95]));
        let full = binarize_probabilities(&high, [45, 30], &MaskConfig::default());
        assert_eq!(full.foreground_count(), 45 * 30);
    }

    #[test]
    fn threshold_is_strict() {
        let at = ProbabilityMap::from_pixel(4, 4, Luma([0.5]));
        let mask = binarize_probabilities(&at, [4, 4], &MaskConfig { threshold: 0.5 });
        assert!(mask.is_empty());
    }

    #[test]
    fn nan_probabilities_are_background() {
        let nan = ProbabilityMap::from_pixel(3, 3, Luma([f32::NAN]));
        assert!(binarize_probabilities(&nan, [3, 3], &MaskConfig::default()).is_empty());
    }

    #[test]
    fn repeated_runs_are_bit_identical() {
        let probs = disk_probability_map(60, 40, [25.0, 22.0], 9.0);
        let cfg = MaskConfig::default();
        let a = binarize_probabilities(&probs, [123, 77], &cfg);
        let b = binarize_probabilities(&probs, [123, 77], &cfg);
        assert_eq!(a, b);
    }

    #[test]
    fn degenerate_sizes_do_not_panic() {
        let probs = ProbabilityMap::new(0, 0);
        let mask = binarize_probabilities(&probs, [5, 5], &MaskConfig::default());
        assert!(mask.is_empty());
        let disk = disk_probability_map(8, 8, [4.0, 4.0], 2.0);
        let zero = binarize_probabilities(&disk, [0, 3], &MaskConfig::default());
        assert_eq!(zero.dimensions(), (0, 3));
    }

    #[test]
    fn rows_and_display_forms() {
        let mask = BinaryMask::from_rows(&[vec![0, 9], vec![1, 0]]).unwrap();
        assert_eq!(mask.to_rows(), vec![vec![0, 1], vec![1, 0]]);
        assert_eq!(mask.to_display_image().get_pixel(1, 0)[0], 255);
        assert_eq!(mask.get(5, 5), 0);
    }
}
