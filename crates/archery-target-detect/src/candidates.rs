//! Ellipse candidate generation and joint red/blue pair scoring.
//!
//! Admissible contours are fitted to ellipses, every red/blue pair is scored
//! in a joint quality matrix (center distance, axis-ratio match against the
//! layout calibration, cross-channel axis-ratio consistency) and the best
//! pair is synthesized into a single target ellipse.

use archery_target_core::{fit_ellipse, Ellipse};
use nalgebra::{DMatrix, Point2};

use crate::calibration::{RingCalibration, RingPlacement, TargetKind};
use crate::contours::ContourSet;

/// Surviving fitted candidates per channel.
#[derive(Clone, Debug)]
pub struct EllipseCandidates {
    pub red: Vec<Ellipse>,
    pub blue: Vec<Ellipse>,
}

/// Joint pair-quality matrix: final score (1 = best) and the estimated ring
/// placement per pair.
#[derive(Clone, Debug)]
pub struct CandidateMatrix {
    pub score: DMatrix<f64>,
    pub placement: DMatrix<RingPlacement>,
}

/// Safety margins on the frame-bound rejection test. The blue ring is
/// expected closer to the target edge, so its margin is tighter.
const RED_BOUND_MARGIN: f64 = 2.5;
const BLUE_BOUND_MARGIN: f64 = 5.0 / 3.0;

/// Fit ellipses to admissible contours of both channels.
///
/// A contour qualifies when its point count reaches the size floor
/// (`0.01*pi*diag` for red, 1.5x that for blue) and the fitted ellipse,
/// inflated by the per-channel safety margin, still fits inside the frame.
/// Returns `None` when either channel ends up empty.
pub fn ellipse_candidates(
    width: usize,
    height: usize,
    contours: &ContourSet,
) -> Option<EllipseCandidates> {
    let diag = ((width * width + height * height) as f64).sqrt();
    let floor = 0.01 * std::f64::consts::PI * diag;

    let collect = |channel: &[Option<crate::contours::Contour>], floor: f64, margin: f64| {
        channel
            .iter()
            .flatten()
            .filter(|c| c.len() as f64 >= floor)
            .filter_map(|c| fit_ellipse(c))
            .filter(|e| fits_frame(e, margin, width, height))
            .collect::<Vec<_>>()
    };

    let red = collect(&contours.red, floor, RED_BOUND_MARGIN);
    let blue = collect(&contours.blue, 1.5 * floor, BLUE_BOUND_MARGIN);

    if red.is_empty() || blue.is_empty() {
        return None;
    }
    Some(EllipseCandidates { red, blue })
}

/// Reject detection artifacts whose rotated extents, scaled by the safety
/// margin, would leave the frame.
fn fits_frame(e: &Ellipse, margin: f64, width: usize, height: usize) -> bool {
    let rad = e.angle_deg.to_radians();
    let quarter = std::f64::consts::FRAC_PI_4;
    let h_major = (rad.sin() * e.axes.major / 2.0).abs();
    let h_minor = ((rad + quarter).sin() * e.axes.minor / 2.0).abs();
    let l_major = (rad.cos() * e.axes.major / 2.0).abs();
    let l_minor = ((rad + quarter).cos() * e.axes.minor / 2.0).abs();

    let v_extent = margin * h_major.max(h_minor);
    let h_extent = margin * l_major.max(l_minor);

    e.center.y + v_extent <= height as f64
        && e.center.y - v_extent >= 0.0
        && e.center.x + h_extent <= width as f64
        && e.center.x - h_extent >= 0.0
}

/// Min-max normalize to [0, 1] and invert so that 1 is best. A constant
/// matrix normalizes to all ones instead of dividing by zero.
fn normalize_inverted(m: &mut DMatrix<f64>) {
    let min = m.iter().copied().fold(f64::INFINITY, f64::min);
    let max = m.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let span = max - min;
    if span <= f64::EPSILON {
        m.fill(1.0);
        return;
    }
    for v in m.iter_mut() {
        *v = 1.0 - (*v - min) / span;
    }
}

/// Build the joint quality matrix over all candidate pairs.
pub fn detection_matrix(candidates: &EllipseCandidates, kind: TargetKind) -> CandidateMatrix {
    let calib = RingCalibration::for_kind(kind);
    let (m, n) = (candidates.red.len(), candidates.blue.len());

    let mut center_distance = DMatrix::zeros(m, n);
    let mut axis_ratio = DMatrix::zeros(m, n);
    let mut ratio_consistency = DMatrix::zeros(m, n);
    let mut placement = DMatrix::from_element(m, n, RingPlacement::OutRedInBlue);

    for (r, red) in candidates.red.iter().enumerate() {
        for (b, blue) in candidates.blue.iter().enumerate() {
            center_distance[(r, b)] = (red.center - blue.center).norm();

            let ratio =
                (blue.axes.major / red.axes.major + blue.axes.minor / red.axes.minor) / 2.0;
            let row = calib.nearest(ratio);
            axis_ratio[(r, b)] = (ratio - row.score_ratio).abs();
            placement[(r, b)] = row.placement;

            ratio_consistency[(r, b)] = (red.aspect_ratio() - blue.aspect_ratio()).abs();
        }
    }

    normalize_inverted(&mut center_distance);
    normalize_inverted(&mut axis_ratio);
    normalize_inverted(&mut ratio_consistency);

    let score = center_distance.component_mul(&axis_ratio).component_mul(&ratio_consistency);
    CandidateMatrix { score, placement }
}

/// Select the best pair and synthesize the target ellipse: centers and
/// angles averaged, axes combined with the calibration weights of the
/// winning placement.
pub fn best_pair(
    candidates: &EllipseCandidates,
    matrix: &CandidateMatrix,
    kind: TargetKind,
) -> Ellipse {
    let calib = RingCalibration::for_kind(kind);

    let mut best = (0, 0);
    let mut best_score = f64::NEG_INFINITY;
    for r in 0..matrix.score.nrows() {
        for b in 0..matrix.score.ncols() {
            if matrix.score[(r, b)] > best_score {
                best_score = matrix.score[(r, b)];
                best = (r, b);
            }
        }
    }

    let red = &candidates.red[best.0];
    let blue = &candidates.blue[best.1];
    let (wr, wb) = calib.weights(matrix.placement[best]);

    Ellipse::new(
        Point2::new(
            (red.center.x + blue.center.x) / 2.0,
            (red.center.y + blue.center.y) / 2.0,
        ),
        (wr * red.axes.major + wb * blue.axes.major) / 2.0,
        (wr * red.axes.minor + wb * blue.axes.minor) / 2.0,
        (red.angle_deg + blue.angle_deg) / 2.0,
    )
}
