//! Ellipse fitting on segmentation masks.
//!
//! Implements:
//! - External contour tracing and largest-region selection.
//! - Direct least-squares conic fit (Fitzgibbon et al., 1999) with a
//!   second-moment fallback for tiny or degenerate regions.
//!
//! One structure per measurement: when several disjoint regions are present
//! only the one enclosing the largest area is fitted.

mod contour;
mod eigen;
mod fit;

pub use contour::{find_external_contours, largest_contour, Contour};
pub use fit::fit_ellipse_to_points;

use crate::mask::BinaryMask;

/// Geometric ellipse in image pixel coordinates (y grows downwards).
///
/// Build through [`FittedEllipse::new`], which orders the axes; deserialised
/// values go through the same constructor.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(from = "EllipseFields")]
pub struct FittedEllipse {
    /// Center x (px).
    pub center_x: f64,
    /// Center y (px).
    pub center_y: f64,
    /// Full length of the major axis (px).
    pub major_axis: f64,
    /// Full length of the minor axis (px).
    pub minor_axis: f64,
    /// Orientation of the major axis from +x towards +y, degrees in (−90, 90].
    pub angle: f64,
}

impl FittedEllipse {
    /// Build a canonical ellipse: axes are made non-negative and ordered
    /// `major ≥ minor` (rotating the angle by 90° when swapped), and the angle is
    /// wrapped into (−90, 90].
    pub fn new(center_x: f64, center_y: f64, axis_a: f64, axis_b: f64, angle_deg: f64) -> Self {
        let (a, b) = (axis_a.abs(), axis_b.abs());
        let (major_axis, minor_axis, angle) = if a >= b {
            (a, b, angle_deg)
        } else {
            (b, a, angle_deg + 90.0)
        };
        Self {
            center_x,
            center_y,
            major_axis,
            minor_axis,
            angle: wrap_half_turn(angle),
        }
    }

    pub fn center(&self) -> [f64; 2] {
        [self.center_x, self.center_y]
    }

    /// True when every field is finite.
    pub fn is_finite(&self) -> bool {
        [
            self.center_x,
            self.center_y,
            self.major_axis,
            self.minor_axis,
            self.angle,
        ]
        .iter()
        .all(|v| v.is_finite())
    }

    /// `n` evenly parameterised points on the boundary.
    pub fn boundary_points(&self, n: usize) -> Vec<[f64; 2]> {
        let (sin_t, cos_t) = self.angle.to_radians().sin_cos();
        let (ra, rb) = (self.major_axis / 2.0, self.minor_axis / 2.0);
        (0..n)
            .map(|i| {
                let phi = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
                let (u, v) = (ra * phi.cos(), rb * phi.sin());
                [
                    self.center_x + cos_t * u - sin_t * v,
                    self.center_y + sin_t * u + cos_t * v,
                ]
            })
            .collect()
    }
}

#[derive(serde::Deserialize)]
struct EllipseFields {
    center_x: f64,
    center_y: f64,
    major_axis: f64,
    minor_axis: f64,
    angle: f64,
}

impl From<EllipseFields> for FittedEllipse {
    fn from(f: EllipseFields) -> Self {
        Self::new(f.center_x, f.center_y, f.major_axis, f.minor_axis, f.angle)
    }
}

fn wrap_half_turn(deg: f64) -> f64 {
    if !deg.is_finite() {
        return deg;
    }
    let mut a = deg.rem_euclid(180.0);
    if a > 90.0 {
        a -= 180.0;
    }
    if a <= -90.0 {
        a += 180.0;
    }
    a
}

/// Fit an ellipse to the largest external contour of `mask`.
///
/// Returns `None` when the mask has no foreground pixels; that means "no
/// measurement available", not a failure.
pub fn fit_mask_ellipse(mask: &BinaryMask) -> Option<FittedEllipse> {
    let contours = find_external_contours(mask);
    let best = largest_contour(&contours)?;
    if contours.len() > 1 {
        tracing::debug!(
            "{} foreground regions; fitting the largest (area {:.1} px², {} points)",
            contours.len(),
            best.area,
            best.len()
        );
    }
    for (i, c) in contours.iter().enumerate() {
        tracing::trace!("contour {}: {} points, area {:.1}", i, c.len(), c.area);
    }
    fit_ellipse_to_points(&best.points_f64())
}
