//! Frame → model input tensor.

use image::imageops::FilterType;
use image::GrayImage;

/// Intensity scaling applied after resizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputNormalization {
    /// `v / 255` in `[0, 1]` (segmentation model).
    UnitRange,
    /// `(v / 255 − 0.5) / 0.5` in `[−1, 1]` (detection model).
    Symmetric,
}

impl InputNormalization {
    fn apply(self, v: u8) -> f32 {
        let unit = f32::from(v) / 255.0;
        match self {
            Self::UnitRange => unit,
            Self::Symmetric => (unit - 0.5) / 0.5,
        }
    }
}

/// Single-channel NCHW `f32` tensor, shape `[1, 1, height, width]`.
#[derive(Debug, Clone, PartialEq)]
pub struct InputTensor {
    shape: [usize; 4],
    data: Vec<f32>,
}

impl InputTensor {
    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    pub fn width(&self) -> usize {
        self.shape[3]
    }

    pub fn height(&self) -> usize {
        self.shape[2]
    }

    /// Row-major values.
    pub fn data(&self) -> &[f32] {
        &self.data
    }
}

/// Lanczos3-resize `img` to `working_size = [width, height]` and normalise.
pub fn prepare_input(
    img: &GrayImage,
    working_size: [u32; 2],
    normalization: InputNormalization,
) -> InputTensor {
    let [w, h] = working_size;
    let resized;
    let source = if img.dimensions() == (w, h) {
        img
    } else {
        resized = image::imageops::resize(img, w, h, FilterType::Lanczos3);
        &resized
    };
    tracing::trace!(
        "input {}x{} -> {}x{} ({:?})",
        img.width(),
        img.height(),
        w,
        h,
        normalization
    );
    InputTensor {
        shape: [1, 1, h as usize, w as usize],
        data: source
            .as_raw()
            .iter()
            .map(|&v| normalization.apply(v))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use image::Luma;

    #[test]
    fn tensor_has_working_shape() {
        let img = GrayImage::from_pixel(123, 77, Luma([200]));
        let t = prepare_input(&img, [600, 400], InputNormalization::UnitRange);
        assert_eq!(t.shape(), [1, 1, 400, 600]);
        assert_eq!(t.data().len(), 600 * 400);
        assert_eq!((t.width(), t.height()), (600, 400));
    }

    #[test]
    fn normalisation_ranges() {
        let img = GrayImage::from_fn(2, 1, |x, _| Luma([if x == 0 { 0 } else { 255 }]));
        let unit = prepare_input(&img, [2, 1], InputNormalization::UnitRange);
        assert_eq!(unit.data(), &[0.0, 1.0]);
        let sym = prepare_input(&img, [2, 1], InputNormalization::Symmetric);
        assert_relative_eq!(sym.data()[0], -1.0);
        assert_relative_eq!(sym.data()[1], 1.0);
    }

    #[test]
    fn uniform_frame_stays_uniform_after_resize() {
        let img = GrayImage::from_pixel(50, 30, Luma([51]));
        let t = prepare_input(&img, [20, 10], InputNormalization::UnitRange);
        assert!(t.data().iter().all(|&v| (v - 0.2).abs() < 1e-2));
    }
}
