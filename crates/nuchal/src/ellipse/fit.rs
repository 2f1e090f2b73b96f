//! Least-squares ellipse fitting over contour points.
//!
//! The primary estimator is the direct constrained conic fit of Fitzgibbon,
//! Pilu & Fisher (1999), solved in the reduced 3×3 form on Hartley-normalised
//! coordinates. Point sets that cannot support a proper ellipse (fewer than six
//! points, collinear runs, duplicated points) fall back to the second-moment
//! ellipse of the points, so every non-empty input yields a fit.

use nalgebra::{DMatrix, Matrix3, Vector6};

use super::eigen::constrained_eigenvector;
use super::FittedEllipse;

/// Minimum number of points for the direct conic fit.
pub const MIN_DIRECT_FIT_POINTS: usize = 6;

/// Largest accepted major axis, as a multiple of the point-set diagonal.
const MAX_AXIS_PER_EXTENT: f64 = 2.0;

/// General conic `A x² + B xy + C y² + D x + E y + F = 0`, stored as `[A, B, C, D, E, F]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conic(pub [f64; 6]);

impl Conic {
    /// Discriminant test `B² − 4AC < 0`.
    pub fn is_ellipse(&self) -> bool {
        let [a, b, c, ..] = self.0;
        b * b - 4.0 * a * c < 0.0
    }

    /// Algebraic residual at `(x, y)`.
    pub fn eval(&self, x: f64, y: f64) -> f64 {
        let [a, b, c, d, e, f] = self.0;
        a * x * x + b * x * y + c * y * y + d * x + e * y + f
    }

    /// Geometric form, or `None` when the conic is not a real, finite ellipse.
    pub fn to_ellipse(&self) -> Option<FittedEllipse> {
        let [a, b, c, d, e, f] = self.0;
        let denom = 4.0 * a * c - b * b;
        if denom <= 0.0 {
            return None;
        }

        let cx = (b * e - 2.0 * c * d) / denom;
        let cy = (b * d - 2.0 * a * e) / denom;
        let f_center = self.eval(cx, cy);
        if f_center.abs() < 1e-15 {
            return None;
        }

        // Eigenvalues of the quadratic part; `theta` is the direction of `l_hi`.
        let mean = 0.5 * (a + c);
        let radius = (0.25 * (a - c) * (a - c) + 0.25 * b * b).sqrt();
        let l_hi = mean + radius;
        let l_lo = mean - radius;
        let theta = 0.5 * b.atan2(a - c);

        let r_short_sq = -f_center / l_hi;
        let r_long_sq = -f_center / l_lo;
        if !(r_short_sq > 0.0 && r_long_sq > 0.0) {
            return None;
        }
        let (r_long, r_short) = (r_long_sq.sqrt(), r_short_sq.sqrt());

        // The long axis is perpendicular to the high-curvature direction.
        let ellipse = FittedEllipse::new(
            cx,
            cy,
            2.0 * r_long,
            2.0 * r_short,
            (theta + std::f64::consts::FRAC_PI_2).to_degrees(),
        );
        ellipse.is_finite().then_some(ellipse)
    }
}

/// Direct least-squares conic fit. Returns `None` for too few or degenerate points.
pub fn fit_conic_direct(points: &[[f64; 2]]) -> Option<Conic> {
    let n = points.len();
    if n < MIN_DIRECT_FIT_POINTS {
        return None;
    }
    let norm = Normalization::of(points);

    let mut design = DMatrix::<f64>::zeros(n, 6);
    for (i, &p) in points.iter().enumerate() {
        let [x, y] = norm.apply(p);
        design[(i, 0)] = x * x;
        design[(i, 1)] = x * y;
        design[(i, 2)] = y * y;
        design[(i, 3)] = x;
        design[(i, 4)] = y;
        design[(i, 5)] = 1.0;
    }
    let scatter = design.transpose() * &design;
    let s1: Matrix3<f64> = scatter.fixed_view::<3, 3>(0, 0).into_owned();
    let s2: Matrix3<f64> = scatter.fixed_view::<3, 3>(0, 3).into_owned();
    let s3: Matrix3<f64> = scatter.fixed_view::<3, 3>(3, 3).into_owned();

    // Linear part expressed through the quadratic part: a₂ = T a₁.
    let t = -(s3.try_inverse()? * s2.transpose());
    let reduced = s1 + s2 * t;
    // Inverse of the constraint matrix [[0, 0, 2], [0, −1, 0], [2, 0, 0]].
    let c1_inv = Matrix3::new(0.0, 0.0, 0.5, 0.0, -1.0, 0.0, 0.5, 0.0, 0.0);

    let quad = constrained_eigenvector(&(c1_inv * reduced))?;
    let lin = t * quad;
    let normalized = Vector6::new(quad[0], quad[1], quad[2], lin[0], lin[1], lin[2]);

    let conic = norm.restore(&normalized);
    if !conic.is_ellipse() {
        return None;
    }
    // Thin point sets fit a near-parallel line pair that still passes the
    // ellipse constraint; its axes run far past the data.
    let ellipse = conic.to_ellipse()?;
    if !within_extent(&ellipse, points) {
        tracing::debug!(
            "direct fit with major axis {:.1} px exceeds the extent of {} points",
            ellipse.major_axis,
            n
        );
        return None;
    }
    Some(conic)
}

/// Center inside the (1 px padded) bounding box and major axis bounded by
/// its diagonal.
fn within_extent(ellipse: &FittedEllipse, points: &[[f64; 2]]) -> bool {
    let [x0, y0, x1, y1] = points.iter().fold(
        [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY],
        |[x0, y0, x1, y1], &[x, y]| [x0.min(x), y0.min(y), x1.max(x), y1.max(y)],
    );
    let diagonal = (x1 - x0).hypot(y1 - y0);
    ellipse.major_axis <= MAX_AXIS_PER_EXTENT * diagonal + 2.0
        && (x0 - 1.0..=x1 + 1.0).contains(&ellipse.center_x)
        && (y0 - 1.0..=y1 + 1.0).contains(&ellipse.center_y)
}

/// Ellipse sharing the first and second moments of the points.
///
/// For points spread evenly along an ellipse boundary the variance along a
/// principal axis is `r² / 2`, hence the `√(2λ)` semi-axis.
pub fn moment_ellipse(points: &[[f64; 2]]) -> Option<FittedEllipse> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let mx = points.iter().map(|p| p[0]).sum::<f64>() / n;
    let my = points.iter().map(|p| p[1]).sum::<f64>() / n;
    let (mut sxx, mut syy, mut sxy) = (0.0, 0.0, 0.0);
    for &[x, y] in points {
        sxx += (x - mx) * (x - mx);
        syy += (y - my) * (y - my);
        sxy += (x - mx) * (y - my);
    }
    sxx /= n;
    syy /= n;
    sxy /= n;

    let half_sum = 0.5 * (sxx + syy);
    let radius = (0.25 * (sxx - syy) * (sxx - syy) + sxy * sxy).sqrt();
    let l_hi = half_sum + radius;
    let l_lo = (half_sum - radius).max(0.0);
    let theta = 0.5 * (2.0 * sxy).atan2(sxx - syy);

    Some(FittedEllipse::new(
        mx,
        my,
        2.0 * (2.0 * l_hi).sqrt(),
        2.0 * (2.0 * l_lo).sqrt(),
        theta.to_degrees(),
    ))
}

/// Fit an ellipse to boundary points: direct fit first, moment ellipse otherwise.
///
/// Returns `None` only for an empty point set.
pub fn fit_ellipse_to_points(points: &[[f64; 2]]) -> Option<FittedEllipse> {
    if let Some(e) = fit_conic_direct(points).and_then(|c| c.to_ellipse()) {
        return Some(e);
    }
    if !points.is_empty() {
        tracing::debug!(
            "direct ellipse fit rejected for {} points; using moment ellipse",
            points.len()
        );
    }
    moment_ellipse(points)
}

/// Similarity transform to zero mean and √2 mean distance.
struct Normalization {
    mx: f64,
    my: f64,
    s: f64,
}

impl Normalization {
    fn of(points: &[[f64; 2]]) -> Self {
        let n = points.len() as f64;
        let mx = points.iter().map(|p| p[0]).sum::<f64>() / n;
        let my = points.iter().map(|p| p[1]).sum::<f64>() / n;
        let mean_dist = points
            .iter()
            .map(|p| (p[0] - mx).hypot(p[1] - my))
            .sum::<f64>()
            / n;
        let s = if mean_dist > 1e-15 {
            std::f64::consts::SQRT_2 / mean_dist
        } else {
            1.0
        };
        Self { mx, my, s }
    }

    fn apply(&self, p: [f64; 2]) -> [f64; 2] {
        [(p[0] - self.mx) * self.s, (p[1] - self.my) * self.s]
    }

    /// Substitute `x' = s(x − mx)`, `y' = s(y − my)` back into the conic.
    fn restore(&self, k: &Vector6<f64>) -> Conic {
        let (mx, my, s) = (self.mx, self.my, self.s);
        let s2 = s * s;
        let (a, b, c, d, e, f) = (k[0] * s2, k[1] * s2, k[2] * s2, k[3] * s, k[4] * s, k[5]);
        Conic([
            a,
            b,
            c,
            d - 2.0 * a * mx - b * my,
            e - b * mx - 2.0 * c * my,
            a * mx * mx + b * mx * my + c * my * my - d * mx - e * my + f,
        ])
    }
}
