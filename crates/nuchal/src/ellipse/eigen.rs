//! Eigenvector selection for the 3×3 reduced ellipse-fit system.

use nalgebra::{Matrix3, Vector3};

/// Return the eigenvector `v` of `system` that satisfies the ellipse
/// constraint `4 v₀ v₂ − v₁² > 0`.
///
/// Eigenvalues come from the characteristic cubic; each eigenvector is read off
/// the adjugate of `system − λI`. When several eigenvectors pass the
/// constraint (only possible with noise-free or near-degenerate data), the one
/// with the smallest |λ| wins.
pub(super) fn constrained_eigenvector(system: &Matrix3<f64>) -> Option<Vector3<f64>> {
    let m = system;
    let trace = m.trace();
    let principal_minors = m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)]
        + m[(0, 0)] * m[(2, 2)]
        - m[(0, 2)] * m[(2, 0)]
        + m[(1, 1)] * m[(2, 2)]
        - m[(1, 2)] * m[(2, 1)];
    let det = m.determinant();

    // λ³ − tr·λ² + minors·λ − det = 0
    let roots = real_cubic_roots(-trace, principal_minors, -det);

    roots
        .iter()
        .filter_map(|&lambda| {
            let v = adjugate_null_vector(&(m - Matrix3::identity() * lambda))?;
            (4.0 * v[0] * v[2] - v[1] * v[1] > 0.0).then_some((lambda.abs(), v))
        })
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, v)| v)
}

/// Unit null vector of a rank-2 matrix: the largest row of its adjugate.
fn adjugate_null_vector(m: &Matrix3<f64>) -> Option<Vector3<f64>> {
    let r0 = m.row(0).transpose();
    let r1 = m.row(1).transpose();
    let r2 = m.row(2).transpose();
    // Cross products of row pairs are the adjugate columns.
    let candidates = [r1.cross(&r2), r2.cross(&r0), r0.cross(&r1)];

    let best = candidates
        .iter()
        .max_by(|a, b| a.norm_squared().total_cmp(&b.norm_squared()))?;
    let n2 = best.norm_squared();
    if !n2.is_finite() || n2 < 1e-30 {
        return None;
    }
    Some(best / n2.sqrt())
}

/// Real roots of the monic cubic `x³ + b x² + c x + d`.
fn real_cubic_roots(b: f64, c: f64, d: f64) -> Vec<f64> {
    let p = c - b * b / 3.0;
    let q = 2.0 * b * b * b / 27.0 - b * c / 3.0 + d;
    let shift = -b / 3.0;
    let disc = -4.0 * p * p * p - 27.0 * q * q;

    if disc >= 0.0 {
        // three real roots (trigonometric form)
        let r = (-p / 3.0).max(0.0).sqrt();
        let cos_arg = if r < 1e-15 {
            0.0
        } else {
            (-q / (2.0 * r * r * r)).clamp(-1.0, 1.0)
        };
        let theta = cos_arg.acos() / 3.0;
        let tau = 2.0 * std::f64::consts::PI / 3.0;
        (0..3)
            .map(|k| 2.0 * r * (theta + tau * k as f64).cos() + shift)
            .collect()
    } else {
        let s = (q * q / 4.0 + p * p * p / 27.0).sqrt();
        vec![(-q / 2.0 + s).cbrt() + (-q / 2.0 - s).cbrt() + shift]
    }
}
