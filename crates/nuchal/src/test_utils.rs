//! Shared synthetic inputs for unit tests.

use image::{GrayImage, Luma};

use crate::mask::{BinaryMask, ProbabilityMap};

/// Filled, rotated ellipse mask. `angle_deg` orients the `semi_a` axis.
pub(crate) fn ellipse_mask(
    w: u32,
    h: u32,
    center: [f64; 2],
    semi_a: f64,
    semi_b: f64,
    angle_deg: f64,
) -> BinaryMask {
    let (s, c) = angle_deg.to_radians().sin_cos();
    let img = GrayImage::from_fn(w, h, |x, y| {
        let dx = x as f64 - center[0];
        let dy = y as f64 - center[1];
        let u = c * dx + s * dy;
        let v = -s * dx + c * dy;
        let inside = (u / semi_a).powi(2) + (v / semi_b).powi(2) <= 1.0;
        Luma([u8::from(inside)])
    });
    BinaryMask::from_gray_nonzero(&img)
}

/// Filled disk mask.
pub(crate) fn disk_mask(w: u32, h: u32, center: [f64; 2], radius: f64) -> BinaryMask {
    ellipse_mask(w, h, center, radius, radius, 0.0)
}

/// Probability map that is 0.9 inside a disk and 0.05 outside.
pub(crate) fn disk_probability_map(w: u32, h: u32, center: [f32; 2], radius: f32) -> ProbabilityMap {
    ProbabilityMap::from_fn(w, h, |x, y| {
        let dx = x as f32 - center[0];
        let dy = y as f32 - center[1];
        let p = if dx * dx + dy * dy <= radius * radius {
            0.9
        } else {
            0.05
        };
        Luma([p])
    })
}

/// Uniform-plus-stripes test frame.
pub(crate) fn striped_image(w: u32, h: u32, period: f64, amplitude: f64) -> GrayImage {
    GrayImage::from_fn(w, h, |x, y| {
        let base = 60.0 + 80.0 * (y as f64 / h.max(1) as f64);
        let stripe = amplitude * (2.0 * std::f64::consts::PI * x as f64 / period).cos();
        Luma([(base + stripe).clamp(0.0, 255.0).round() as u8])
    })
}
