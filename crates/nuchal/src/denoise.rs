//! Frequency-domain suppression of periodic noise.
//!
//! The frame is optionally histogram-equalised, transformed with a 2D DFT and
//! centred so that the zero frequency sits at `(w/2, h/2)`. Two thresholds on
//! the log-magnitude spectrum delimit a band:
//!
//! - `lower = mean + α·std`
//! - `upper = max − β·std`
//!
//! [`DenoiseMode::Signal`] keeps the bins inside the band and returns their
//! inverse transform. [`DenoiseMode::Noise`] keeps the bins outside the band,
//! treats their inverse as noise and subtracts it from the frame.

use image::{GrayImage, Luma};
use rustfft::num_complex::Complex;
use rustfft::{FftDirection, FftPlanner};

/// Floor applied to |F| before taking the logarithm.
const MAGNITUDE_FLOOR: f64 = 1e-12;

/// Which side of the log-magnitude band survives the mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenoiseMode {
    /// Keep bins inside `[lower, upper]`.
    #[default]
    Signal,
    /// Keep bins outside the band and subtract their reconstruction.
    Noise,
}

/// Parameters of the frequency-domain denoiser.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DenoiseConfig {
    /// Multiplier of the spectrum std added to the mean for the lower bound.
    pub alpha: f64,
    /// Multiplier of the spectrum std subtracted from the max for the upper bound.
    pub beta: f64,
    pub mode: DenoiseMode,
    /// Histogram-equalise the frame before the transform.
    pub equalize: bool,
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self {
            alpha: 0.5,
            beta: 0.5,
            mode: DenoiseMode::Signal,
            equalize: true,
        }
    }
}

/// Inclusive log-magnitude band `[lower, upper]` (dB).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandThresholds {
    pub lower: f64,
    pub upper: f64,
}

/// Centred complex spectrum of a grayscale frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencySpectrum {
    width: usize,
    height: usize,
    bins: Vec<Complex<f64>>,
}

impl FrequencySpectrum {
    /// Forward 2D DFT of `img`, shifted so the zero frequency is centred.
    pub fn forward(img: &GrayImage) -> Self {
        let (width, height) = (img.width() as usize, img.height() as usize);
        let mut bins: Vec<Complex<f64>> = img
            .as_raw()
            .iter()
            .map(|&v| Complex::new(f64::from(v), 0.0))
            .collect();
        fft2(&mut bins, width, height, FftDirection::Forward);
        Self {
            width,
            height,
            bins: quadrant_shift(&bins, width, height, false),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Centred bins, row-major.
    pub fn bins(&self) -> &[Complex<f64>] {
        &self.bins
    }

    /// `20·log10(|F|)` per bin, with |F| floored so empty bins stay finite.
    pub fn log_magnitude(&self) -> Vec<f64> {
        self.bins
            .iter()
            .map(|c| 20.0 * c.norm().max(MAGNITUDE_FLOOR).log10())
            .collect()
    }

    /// Copy with every bin where `keep` is false set to zero.
    pub fn masked(&self, keep: &[bool]) -> Self {
        let bins = self
            .bins
            .iter()
            .zip(keep.iter().chain(std::iter::repeat(&false)))
            .map(|(&c, &k)| if k { c } else { Complex::new(0.0, 0.0) })
            .collect();
        Self {
            width: self.width,
            height: self.height,
            bins,
        }
    }

    /// Uncentre, inverse DFT (scaled by `1/(w·h)`), real part, row-major.
    pub fn inverse_real(&self) -> Vec<f64> {
        let (w, h) = (self.width, self.height);
        let mut bins = quadrant_shift(&self.bins, w, h, true);
        fft2(&mut bins, w, h, FftDirection::Inverse);
        let scale = 1.0 / (w * h).max(1) as f64;
        bins.iter().map(|c| c.re * scale).collect()
    }
}

/// Band limits from the log-magnitude statistics.
///
/// Non-finite statistics (empty input, overflow) collapse to zero.
pub fn band_thresholds(log_mag: &[f64], alpha: f64, beta: f64) -> BandThresholds {
    if log_mag.is_empty() {
        return BandThresholds {
            lower: 0.0,
            upper: 0.0,
        };
    }
    let n = log_mag.len() as f64;
    let mean = log_mag.iter().sum::<f64>() / n;
    let var = log_mag.iter().map(|m| (m - mean) * (m - mean)).sum::<f64>() / n;
    let std = var.max(0.0).sqrt();
    let max = log_mag.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let finite_or_zero = |v: f64| if v.is_finite() { v } else { 0.0 };
    BandThresholds {
        lower: finite_or_zero(mean + alpha * std),
        upper: finite_or_zero(max - beta * std),
    }
}

/// Per-bin keep flags for `mode`. Signal and noise masks are complements.
pub fn frequency_mask(log_mag: &[f64], thresholds: &BandThresholds, mode: DenoiseMode) -> Vec<bool> {
    log_mag
        .iter()
        .map(|&m| {
            let inside = m >= thresholds.lower && m <= thresholds.upper;
            match mode {
                DenoiseMode::Signal => inside,
                DenoiseMode::Noise => !inside,
            }
        })
        .collect()
}

/// Suppress periodic noise in `img`. Output has the input's dimensions.
pub fn denoise(img: &GrayImage, config: &DenoiseConfig) -> GrayImage {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 {
        return img.clone();
    }
    let source = if config.equalize {
        imageproc::contrast::equalize_histogram(img)
    } else {
        img.clone()
    };

    let spectrum = FrequencySpectrum::forward(&source);
    let log_mag = spectrum.log_magnitude();
    let thresholds = band_thresholds(&log_mag, config.alpha, config.beta);
    let keep = frequency_mask(&log_mag, &thresholds, config.mode);
    let kept = keep.iter().filter(|&&k| k).count();
    tracing::debug!(
        "denoise {}x{} ({:?}): band [{:.2}, {:.2}] dB keeps {}/{} bins",
        w,
        h,
        config.mode,
        thresholds.lower,
        thresholds.upper,
        kept,
        keep.len()
    );

    let filtered = spectrum.masked(&keep).inverse_real();
    let values: Vec<u8> = match config.mode {
        DenoiseMode::Signal => filtered.iter().map(|&v| quantize(v)).collect(),
        DenoiseMode::Noise => source
            .as_raw()
            .iter()
            .zip(&filtered)
            .map(|(&p, &noise)| quantize(f64::from(p) - noise))
            .collect(),
    };

    GrayImage::from_fn(w, h, |x, y| Luma([values[(y * w + x) as usize]]))
}

fn quantize(v: f64) -> u8 {
    if v.is_finite() {
        v.clamp(0.0, 255.0).round() as u8
    } else {
        0
    }
}

/// In-place 2D DFT: rows, then columns through a transpose.
fn fft2(data: &mut Vec<Complex<f64>>, w: usize, h: usize, direction: FftDirection) {
    if w == 0 || h == 0 {
        return;
    }
    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft(w, direction).process(data);
    let mut cols = transpose(data, w, h);
    planner.plan_fft(h, direction).process(&mut cols);
    *data = transpose(&cols, h, w);
}

/// `w × h` row-major → `h × w` row-major.
fn transpose(data: &[Complex<f64>], w: usize, h: usize) -> Vec<Complex<f64>> {
    let mut out = vec![Complex::new(0.0, 0.0); data.len()];
    for y in 0..h {
        for x in 0..w {
            out[x * h + y] = data[y * w + x];
        }
    }
    out
}

/// Swap quadrants so index 0 moves to `(w/2, h/2)`; `inverse` undoes it for odd sizes too.
fn quadrant_shift(data: &[Complex<f64>], w: usize, h: usize, inverse: bool) -> Vec<Complex<f64>> {
    let mut out = vec![Complex::new(0.0, 0.0); data.len()];
    let (sx, sy) = (w / 2, h / 2);
    for y in 0..h {
        for x in 0..w {
            let (tx, ty) = ((x + sx) % w, (y + sy) % h);
            if inverse {
                out[y * w + x] = data[ty * w + tx];
            } else {
                out[ty * w + tx] = data[y * w + x];
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::striped_image;
    use approx::assert_relative_eq;

    fn keep_all(mode: DenoiseMode) -> DenoiseConfig {
        DenoiseConfig {
            alpha: -1e9,
            beta: 0.0,
            mode,
            equalize: false,
        }
    }

    #[test]
    fn dimensions_are_preserved() {
        let img = striped_image(37, 22, 4.0, 30.0);
        for mode in [DenoiseMode::Signal, DenoiseMode::Noise] {
            let cfg = DenoiseConfig {
                mode,
                ..DenoiseConfig::default()
            };
            assert_eq!(denoise(&img, &cfg).dimensions(), (37, 22));
        }
    }

    #[test]
    fn degenerate_frames_do_not_panic() {
        let cfg = DenoiseConfig::default();
        assert_eq!(denoise(&GrayImage::new(0, 0), &cfg).dimensions(), (0, 0));
        assert_eq!(denoise(&GrayImage::from_pixel(1, 1, Luma([42])), &cfg).dimensions(), (1, 1));
        let flat = denoise(&GrayImage::from_pixel(16, 9, Luma([128])), &cfg);
        assert_eq!(flat.dimensions(), (16, 9));

        let spectrum = FrequencySpectrum::forward(&GrayImage::from_pixel(16, 9, Luma([128])));
        let t = band_thresholds(&spectrum.log_magnitude(), 0.5, 0.5);
        assert!(t.lower.is_finite() && t.upper.is_finite());
    }

    #[test]
    fn full_band_reconstructs_the_frame() {
        let img = striped_image(24, 18, 6.0, 40.0);
        assert_eq!(denoise(&img, &keep_all(DenoiseMode::Signal)), img);
    }

    #[test]
    fn noise_mode_with_full_band_removes_nothing() {
        let img = striped_image(20, 15, 5.0, 25.0);
        assert_eq!(denoise(&img, &keep_all(DenoiseMode::Noise)), img);
    }

    #[test]
    fn spectrum_is_centred() {
        let img = GrayImage::from_pixel(4, 3, Luma([10]));
        let spectrum = FrequencySpectrum::forward(&img);
        let dc = spectrum.bins()[spectrum.width() + 2];
        assert_relative_eq!(dc.re, 120.0, epsilon = 1e-9);
        let off_dc: f64 = spectrum
            .bins()
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != spectrum.width() + 2)
            .map(|(_, c)| c.norm())
            .sum();
        assert!(off_dc < 1e-9);
    }

    #[test]
    fn forward_inverse_round_trip() {
        let img = striped_image(15, 11, 3.0, 50.0);
        let back = FrequencySpectrum::forward(&img).inverse_real();
        for (&p, &v) in img.as_raw().iter().zip(&back) {
            assert_relative_eq!(f64::from(p), v, epsilon = 1e-9);
        }
    }

    #[test]
    fn thresholds_and_masks_on_known_values() {
        let log_mag = [0.0, 1.0, 2.0, 3.0, 4.0];
        let t = band_thresholds(&log_mag, 0.5, 0.5);
        let std = 2.0_f64.sqrt();
        assert_relative_eq!(t.lower, 2.0 + 0.5 * std, epsilon = 1e-12);
        assert_relative_eq!(t.upper, 4.0 - 0.5 * std, epsilon = 1e-12);

        let signal = frequency_mask(&log_mag, &t, DenoiseMode::Signal);
        let noise = frequency_mask(&log_mag, &t, DenoiseMode::Noise);
        assert_eq!(signal, vec![false, false, false, true, false]);
        assert!(signal.iter().zip(&noise).all(|(s, n)| s != n));

        let empty = band_thresholds(&[], 0.5, 0.5);
        assert_eq!((empty.lower, empty.upper), (0.0, 0.0));
    }

    #[test]
    fn config_parses_snake_case_mode() {
        let cfg: DenoiseConfig = serde_json::from_str(r#"{"mode": "noise", "alpha": 1.0}"#).unwrap();
        assert_eq!(cfg.mode, DenoiseMode::Noise);
        assert_eq!(cfg.alpha, 1.0);
        assert_eq!(cfg.beta, 0.5);
        assert!(cfg.equalize);
    }
}
