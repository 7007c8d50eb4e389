//! The `Ellipse` entity and direct least-squares fitting.
//!
//! Every downstream stage consumes the same record type instead of unpacking
//! positional tuples. Fitting follows the direct least-squares method of
//! Fitzgibbon et al. (1999) for 6+ points; exactly five points determine the
//! conic uniquely and are solved as a null-space problem, which is the path
//! taken by manual target marking.

use nalgebra::{DMatrix, Matrix3, Point2, Vector3, Vector6};
use serde::{Deserialize, Serialize};

/// Full axis lengths of an ellipse, canonicalized so `major >= minor`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Axes {
    pub major: f64,
    pub minor: f64,
}

/// Geometric ellipse: center in pixels, full axis lengths, major-axis angle
/// from +x in degrees, normalized to `[0, 180)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    pub center: Point2<f64>,
    pub axes: Axes,
    pub angle_deg: f64,
}

impl Ellipse {
    /// Canonicalizing constructor: swaps axes so `major >= minor` (rotating
    /// the angle by 90 accordingly) and wraps the angle into `[0, 180)`.
    pub fn new(center: Point2<f64>, major: f64, minor: f64, angle_deg: f64) -> Self {
        let (major, minor, angle_deg) = if major >= minor {
            (major, minor, angle_deg)
        } else {
            (minor, major, angle_deg + 90.0)
        };
        Self {
            center,
            axes: Axes { major, minor },
            angle_deg: angle_deg.rem_euclid(180.0),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.axes.major >= self.axes.minor
            && self.axes.minor >= 0.0
            && self.axes.major.is_finite()
            && self.center.x.is_finite()
            && self.center.y.is_finite()
            && (0.0..180.0).contains(&self.angle_deg)
    }

    /// Aspect ratio `major / minor` (>= 1 for a valid ellipse).
    pub fn aspect_ratio(&self) -> f64 {
        self.axes.major / self.axes.minor
    }

    /// Sample `n` boundary points, ordered by the parametric angle.
    pub fn sample_points(&self, n: usize) -> Vec<Point2<f64>> {
        let phi = self.angle_deg.to_radians();
        let (sin_p, cos_p) = phi.sin_cos();
        let a = self.axes.major / 2.0;
        let b = self.axes.minor / 2.0;
        (0..n)
            .map(|i| {
                let t = std::f64::consts::TAU * i as f64 / n as f64;
                let (px, py) = (a * t.cos(), b * t.sin());
                Point2::new(
                    self.center.x + cos_p * px - sin_p * py,
                    self.center.y + sin_p * px + cos_p * py,
                )
            })
            .collect()
    }
}

/// Fit an ellipse to image points.
///
/// Returns `None` for fewer than five points, for degenerate configurations
/// and when the best-fitting conic is not an ellipse.
pub fn fit_ellipse(points: &[Point2<f64>]) -> Option<Ellipse> {
    match points.len() {
        0..=4 => None,
        5 => conic_through_five(points).and_then(|c| conic_to_ellipse(&c)),
        _ => fit_direct(points).and_then(|c| conic_to_ellipse(&c)),
    }
}

// Conic coefficients [A, B, C, D, E, F] of A x^2 + B xy + C y^2 + D x + E y + F = 0.
type Conic = [f64; 6];

fn design_row(x: f64, y: f64) -> [f64; 6] {
    [x * x, x * y, y * y, x, y, 1.0]
}

/// Shift to the centroid and scale so the mean radius is sqrt(2); conditions
/// the design matrix.
fn normalization(points: &[Point2<f64>]) -> (f64, f64, f64) {
    let n = points.len() as f64;
    let mx = points.iter().map(|p| p.x).sum::<f64>() / n;
    let my = points.iter().map(|p| p.y).sum::<f64>() / n;
    let mean_dist = points
        .iter()
        .map(|p| ((p.x - mx).powi(2) + (p.y - my).powi(2)).sqrt())
        .sum::<f64>()
        / n;
    let scale = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    (mx, my, scale)
}

/// Exact conic through five points: null vector of the 5x6 design matrix.
fn conic_through_five(points: &[Point2<f64>]) -> Option<Conic> {
    let (mx, my, s) = normalization(points);
    let mut d = DMatrix::<f64>::zeros(5, 6);
    for (i, p) in points.iter().enumerate() {
        let row = design_row((p.x - mx) * s, (p.y - my) * s);
        for (j, v) in row.iter().enumerate() {
            d[(i, j)] = *v;
        }
    }
    let svd = d.svd(false, true);
    let v_t = svd.v_t?;
    // Smallest singular direction spans the null space.
    let null = v_t.row(v_t.nrows() - 1);
    let coeffs = Vector6::from_iterator(null.iter().copied());
    Some(denormalize(&coeffs, mx, my, s))
}

/// Direct least-squares fit with the ellipse constraint 4AC - B^2 > 0.
fn fit_direct(points: &[Point2<f64>]) -> Option<Conic> {
    let (mx, my, s) = normalization(points);
    let n = points.len();
    let mut d = DMatrix::<f64>::zeros(n, 6);
    for (i, p) in points.iter().enumerate() {
        let row = design_row((p.x - mx) * s, (p.y - my) * s);
        for (j, v) in row.iter().enumerate() {
            d[(i, j)] = *v;
        }
    }
    let scatter = d.transpose() * &d;

    let s11 = scatter.fixed_view::<3, 3>(0, 0).into_owned();
    let s12 = scatter.fixed_view::<3, 3>(0, 3).into_owned();
    let s22 = scatter.fixed_view::<3, 3>(3, 3).into_owned();

    // Constraint matrix encoding 4AC - B^2.
    let c1 = Matrix3::new(0.0, 0.0, 2.0, 0.0, -1.0, 0.0, 2.0, 0.0, 0.0);
    let s22_inv = s22.try_inverse()?;
    let reduced = s11 - s12 * s22_inv * s12.transpose();
    let system = c1.try_inverse()? * reduced;

    let a1 = constrained_eigenvector(&system)?;
    let a2 = -s22_inv * s12.transpose() * a1;
    let coeffs = Vector6::new(a1[0], a1[1], a1[2], a2[0], a2[1], a2[2]);
    Some(denormalize(&coeffs, mx, my, s))
}

/// Eigenvector of the 3x3 system whose quadratic part satisfies the ellipse
/// constraint. Eigenvalues come from the characteristic cubic; eigenvectors
/// from the adjugate of the shifted matrix.
fn constrained_eigenvector(a: &Matrix3<f64>) -> Option<Vector3<f64>> {
    let tr = a[(0, 0)] + a[(1, 1)] + a[(2, 2)];
    let minor_sum = a[(0, 0)] * a[(1, 1)] - a[(0, 1)] * a[(1, 0)] + a[(0, 0)] * a[(2, 2)]
        - a[(0, 2)] * a[(2, 0)]
        + a[(1, 1)] * a[(2, 2)]
        - a[(1, 2)] * a[(2, 1)];
    let det = a.determinant();

    let mut best: Option<(f64, Vector3<f64>)> = None;
    for ev in cubic_roots(-tr, minor_sum, -det) {
        let shifted = a - Matrix3::identity() * ev;
        let Some(v) = null_vector(&shifted) else {
            continue;
        };
        if 4.0 * v[0] * v[2] - v[1] * v[1] > 0.0
            && best.map(|(b, _)| ev.abs() < b).unwrap_or(true)
        {
            best = Some((ev.abs(), v));
        }
    }
    best.map(|(_, v)| v)
}

/// Null vector of a near-singular 3x3 matrix: the largest-norm row of the
/// adjugate.
fn null_vector(m: &Matrix3<f64>) -> Option<Vector3<f64>> {
    let rows = [
        Vector3::new(
            m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)],
            -(m[(1, 0)] * m[(2, 2)] - m[(1, 2)] * m[(2, 0)]),
            m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)],
        ),
        Vector3::new(
            -(m[(0, 1)] * m[(2, 2)] - m[(0, 2)] * m[(2, 1)]),
            m[(0, 0)] * m[(2, 2)] - m[(0, 2)] * m[(2, 0)],
            -(m[(0, 0)] * m[(2, 1)] - m[(0, 1)] * m[(2, 0)]),
        ),
        Vector3::new(
            m[(0, 1)] * m[(1, 2)] - m[(0, 2)] * m[(1, 1)],
            -(m[(0, 0)] * m[(1, 2)] - m[(0, 2)] * m[(1, 0)]),
            m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)],
        ),
    ];
    let best = rows
        .iter()
        .max_by(|a, b| a.norm_squared().total_cmp(&b.norm_squared()))?;
    let norm_sq = best.norm_squared();
    if norm_sq < 1e-30 {
        return None;
    }
    Some(best / norm_sq.sqrt())
}

/// Real roots of x^3 + b x^2 + c x + d = 0.
fn cubic_roots(b: f64, c: f64, d: f64) -> Vec<f64> {
    let p = c - b * b / 3.0;
    let q = 2.0 * b * b * b / 27.0 - b * c / 3.0 + d;
    let shift = -b / 3.0;
    let disc = -4.0 * p * p * p - 27.0 * q * q;

    if disc >= 0.0 {
        let r = (-p / 3.0).sqrt();
        let cos_arg = if r.abs() < 1e-15 {
            0.0
        } else {
            (-q / (2.0 * r * r * r)).clamp(-1.0, 1.0)
        };
        let theta = cos_arg.acos();
        (0..3)
            .map(|k| {
                2.0 * r * ((theta + 2.0 * std::f64::consts::PI * k as f64) / 3.0).cos() + shift
            })
            .collect()
    } else {
        let sqrt_disc = (q * q / 4.0 + p * p * p / 27.0).sqrt();
        vec![(-q / 2.0 + sqrt_disc).cbrt() + (-q / 2.0 - sqrt_disc).cbrt() + shift]
    }
}

/// Undo the centroid/scale normalization on conic coefficients.
fn denormalize(c: &Vector6<f64>, mx: f64, my: f64, s: f64) -> Conic {
    let [a_, b_, c_, d_, e_, f_] = [c[0], c[1], c[2], c[3], c[4], c[5]];
    let s2 = s * s;
    [
        a_ * s2,
        b_ * s2,
        c_ * s2,
        -2.0 * a_ * s2 * mx - b_ * s2 * my + d_ * s,
        -b_ * s2 * mx - 2.0 * c_ * s2 * my + e_ * s,
        a_ * s2 * mx * mx + b_ * s2 * mx * my + c_ * s2 * my * my - d_ * s * mx - e_ * s * my + f_,
    ]
}

/// Convert conic coefficients to geometric parameters; `None` when the conic
/// is not a finite ellipse.
fn conic_to_ellipse(coeffs: &Conic) -> Option<Ellipse> {
    let [a, b, c, d, e, f] = *coeffs;

    let disc = b * b - 4.0 * a * c;
    if disc >= 0.0 {
        return None;
    }

    let denom = -disc;
    let cx = (b * e - 2.0 * c * d) / denom;
    let cy = (b * d - 2.0 * a * e) / denom;

    let angle = if (a - c).abs() < 1e-15 {
        match b.partial_cmp(&0.0)? {
            std::cmp::Ordering::Greater => std::f64::consts::FRAC_PI_4,
            std::cmp::Ordering::Less => -std::f64::consts::FRAC_PI_4,
            std::cmp::Ordering::Equal => 0.0,
        }
    } else {
        0.5 * b.atan2(a - c)
    };

    // Semi-axes from the eigenvalues of the quadratic part.
    let sum = a + c;
    let diff = ((a - c).powi(2) + b * b).sqrt();
    let lambda1 = (sum + diff) / 2.0;
    let lambda2 = (sum - diff) / 2.0;

    // Conic value at the center.
    let f_c = a * cx * cx + b * cx * cy + c * cy * cy + d * cx + e * cy + f;
    if f_c.abs() < 1e-15 {
        return None;
    }

    let a_sq = -f_c / lambda1;
    let b_sq = -f_c / lambda2;
    if a_sq <= 0.0 || b_sq <= 0.0 {
        return None;
    }

    // `angle` belongs to the lambda1 direction, whose full length is
    // 2*sqrt(a_sq); `Ellipse::new` swaps the axes (rotating by 90) when that
    // direction turns out to be the minor one.
    let ell = Ellipse::new(
        Point2::new(cx, cy),
        2.0 * a_sq.sqrt(),
        2.0 * b_sq.sqrt(),
        angle.to_degrees(),
    );
    ell.is_valid().then_some(ell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_ellipse_close(e: &Ellipse, center: (f64, f64), major: f64, minor: f64) {
        assert_relative_eq!(e.center.x, center.0, epsilon = 1e-6);
        assert_relative_eq!(e.center.y, center.1, epsilon = 1e-6);
        assert_relative_eq!(e.axes.major, major, epsilon = 1e-6);
        assert_relative_eq!(e.axes.minor, minor, epsilon = 1e-6);
    }

    #[test]
    fn constructor_canonicalizes_axes_and_angle() {
        let e = Ellipse::new(Point2::new(0.0, 0.0), 10.0, 40.0, 170.0);
        assert_eq!(e.axes.major, 40.0);
        assert_eq!(e.axes.minor, 10.0);
        assert!((0.0..180.0).contains(&e.angle_deg));
        assert!(e.is_valid());
    }

    #[test]
    fn fit_recovers_axis_aligned_ellipse() {
        let truth = Ellipse::new(Point2::new(120.0, 80.0), 100.0, 60.0, 0.0);
        let pts = truth.sample_points(64);
        let fitted = fit_ellipse(&pts).expect("fit");
        assert_ellipse_close(&fitted, (120.0, 80.0), 100.0, 60.0);
        assert!(fitted.angle_deg < 1.0 || fitted.angle_deg > 179.0);
    }

    #[test]
    fn fit_recovers_rotated_ellipse() {
        let truth = Ellipse::new(Point2::new(-5.0, 3.0), 80.0, 30.0, 30.0);
        let pts = truth.sample_points(128);
        let fitted = fit_ellipse(&pts).expect("fit");
        assert_ellipse_close(&fitted, (-5.0, 3.0), 80.0, 30.0);
        assert_relative_eq!(fitted.angle_deg, 30.0, epsilon = 1e-4);
    }

    #[test]
    fn five_points_determine_the_conic() {
        let truth = Ellipse::new(Point2::new(150.0, 150.0), 80.0, 60.0, 90.0);
        let pts: Vec<_> = truth.sample_points(5);
        let fitted = fit_ellipse(&pts).expect("fit");
        assert_ellipse_close(&fitted, (150.0, 150.0), 80.0, 60.0);
    }

    #[test]
    fn too_few_points_fail() {
        let pts = vec![Point2::new(0.0, 0.0); 4];
        assert!(fit_ellipse(&pts).is_none());
    }

    #[test]
    fn collinear_points_are_not_an_ellipse() {
        let pts: Vec<_> = (0..8).map(|i| Point2::new(i as f64, 2.0 * i as f64)).collect();
        assert!(fit_ellipse(&pts).is_none());
    }

    #[test]
    fn fitted_invariants_hold() {
        let truth = Ellipse::new(Point2::new(10.0, 20.0), 50.0, 50.0, 45.0);
        let pts = truth.sample_points(32);
        let fitted = fit_ellipse(&pts).expect("fit");
        assert!(fitted.axes.major >= fitted.axes.minor);
        assert!((0.0..180.0).contains(&fitted.angle_deg));
    }
}
