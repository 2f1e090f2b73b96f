//! External contour extraction and largest-region selection.

use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};

use crate::mask::BinaryMask;

/// Closed boundary of one connected foreground region.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    /// Boundary pixels `[x, y]` in tracing order.
    pub points: Vec<[i32; 2]>,
    /// Enclosed polygon area (shoelace) in px².
    pub area: f64,
}

impl Contour {
    /// Build from traced points, computing the enclosed area.
    pub fn from_points(points: Vec<[i32; 2]>) -> Self {
        let area = polygon_area(&points);
        Self { points, area }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points as floating-point coordinates for fitting.
    pub fn points_f64(&self) -> Vec<[f64; 2]> {
        self.points
            .iter()
            .map(|&[x, y]| [x as f64, y as f64])
            .collect()
    }
}

/// Trace the outermost border of every foreground region.
///
/// Holes and regions nested inside holes are skipped. Contours are returned in
/// raster-scan order of their first traced pixel (top-to-bottom, then
/// left-to-right).
pub fn find_external_contours(mask: &BinaryMask) -> Vec<Contour> {
    if mask.is_empty() {
        return Vec::new();
    }
    let (w, h) = mask.dimensions();

    // Border following only starts on a pixel with a background neighbour, so
    // regions touching the frame edge need a zero margin.
    let mut padded = GrayImage::new(w + 2, h + 2);
    for (x, y, p) in mask.as_image().enumerate_pixels() {
        if p[0] != 0 {
            padded.put_pixel(x + 1, y + 1, Luma([255]));
        }
    }

    find_contours::<i32>(&padded)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .map(|c| Contour::from_points(c.points.iter().map(|p| [p.x - 1, p.y - 1]).collect()))
        .collect()
}

/// Contour with the largest enclosed area; ties keep the earliest contour.
pub fn largest_contour(contours: &[Contour]) -> Option<&Contour> {
    contours.iter().fold(None, |best, c| match best {
        Some(b) if b.area >= c.area => Some(b),
        _ => Some(c),
    })
}

fn polygon_area(points: &[[i32; 2]]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let twice: i64 = points
        .iter()
        .zip(points.iter().cycle().skip(1))
        .map(|(p, q)| p[0] as i64 * q[1] as i64 - q[0] as i64 * p[1] as i64)
        .sum();
    (twice as f64 / 2.0).abs()
}
