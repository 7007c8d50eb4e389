//! Arrow shaft localization on a binarized difference frame.
//!
//! The brightest pixels of the difference frame are kept, the dominant Hough
//! line near the expected shaft orientation is found under progressive
//! threshold relaxation, and the shaft itself is the longest nonzero run of
//! the masked trace along that line.

use archery_target_core::GrayImage;
use log::debug;
use nalgebra::Point2;

use crate::hough::{angle_diff_deg, HoughLine, HoughTransform};

/// Orientation window around the expected shaft for accepting a Hough line.
const ANGLE_TOL_DEG: f64 = 30.0;

/// Fraction of pixels left below the binarization cut.
const BINARIZE_QUANTILE: f64 = 0.95;

/// Localized arrow shaft, endpoints in pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ArrowLine {
    pub start: Point2<f64>,
    pub end: Point2<f64>,
}

impl ArrowLine {
    /// Endpoint closer to `center`. The impact point is the shaft end near
    /// the target middle, the other end is fletching.
    pub fn impact_point(&self, center: Point2<f64>) -> Point2<f64> {
        if (self.start - center).norm() <= (self.end - center).norm() {
            self.start
        } else {
            self.end
        }
    }
}

/// Keep only the top 5% brightest pixels of the difference frame.
pub fn binarize(diff: &GrayImage) -> GrayImage {
    let hist = diff.histogram();
    let cutoff = (diff.data.len() as f64 * BINARIZE_QUANTILE).ceil() as u64;
    let mut level = 255usize;
    let mut cumulative = 0u64;
    for (i, &count) in hist.iter().enumerate() {
        cumulative += count as u64;
        if cumulative >= cutoff {
            level = i;
            break;
        }
    }
    let mut out = diff.clone();
    for v in &mut out.data {
        *v = if (*v as usize) > level { 255 } else { 0 };
    }
    out
}

/// Hough lines within the orientation window, found by relaxing the vote
/// threshold from `(w + h) / 2` down to `(w + h) / 8`. A real shaft spans a
/// sizable fraction of the canonical frame; below that floor the accumulator
/// is all clutter, so the search gives up instead of latching onto a
/// one-vote line. Returns the qualifying lines of the first threshold that
/// yields any, strongest first.
pub fn find_arrow_lines(binary: &GrayImage, expected_angle_deg: f64) -> Vec<HoughLine> {
    let hough = HoughTransform::new(binary);
    let base = (binary.width + binary.height) as u32;
    for divisor in 2..=8 {
        let threshold = base / divisor;
        if threshold == 0 {
            break;
        }
        let qualifying: Vec<HoughLine> = hough
            .lines_above(threshold)
            .into_iter()
            .filter(|l| angle_diff_deg(l.theta_deg, expected_angle_deg) < ANGLE_TOL_DEG)
            .collect();
        if !qualifying.is_empty() {
            debug!("{} arrow line(s) at threshold {threshold}", qualifying.len());
            return qualifying;
        }
    }
    Vec::new()
}

/// Intersections of the line with the frame border, the two farthest apart.
fn boundary_endpoints(
    line: &HoughLine,
    width: usize,
    height: usize,
) -> Option<(Point2<f64>, Point2<f64>)> {
    let rad = line.theta_deg.to_radians();
    let (cos, sin) = (rad.cos(), rad.sin());
    let (w, h) = (width as f64 - 1.0, height as f64 - 1.0);

    let mut hits: Vec<Point2<f64>> = Vec::with_capacity(4);
    // x*cos + y*sin = rho against each border.
    if sin.abs() > 1e-9 {
        for x in [0.0, w] {
            let y = (line.rho - x * cos) / sin;
            if (0.0..=h).contains(&y) {
                hits.push(Point2::new(x, y));
            }
        }
    }
    if cos.abs() > 1e-9 {
        for y in [0.0, h] {
            let x = (line.rho - y * sin) / cos;
            if (0.0..=w).contains(&x) {
                hits.push(Point2::new(x, y));
            }
        }
    }

    let mut best: Option<(Point2<f64>, Point2<f64>)> = None;
    let mut best_len = 0.0;
    for i in 0..hits.len() {
        for j in i + 1..hits.len() {
            let len = (hits[i] - hits[j]).norm();
            if len > best_len {
                best_len = len;
                best = Some((hits[i], hits[j]));
            }
        }
    }
    best.filter(|_| best_len > 1.0)
}

/// 1-D median filter, window 5, replicated borders.
fn median_trace(trace: &[u8]) -> Vec<u8> {
    let n = trace.len() as i64;
    (0..n)
        .map(|i| {
            let mut window = [0u8; 5];
            for (k, d) in (-2i64..=2).enumerate() {
                window[k] = trace[(i + d).clamp(0, n - 1) as usize];
            }
            window.sort_unstable();
            window[2]
        })
        .collect()
}

/// Longest run of nonzero samples, as an inclusive index range.
fn longest_run(trace: &[u8]) -> Option<(usize, usize)> {
    let mut best: Option<(usize, usize)> = None;
    let mut start = None;
    for (i, &v) in trace.iter().enumerate() {
        match (v != 0, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                if best.is_none_or(|(bs, be)| i - s > be - bs + 1) {
                    best = Some((s, i - 1));
                }
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        let end = trace.len() - 1;
        if best.is_none_or(|(bs, be)| end - s + 1 > be - bs + 1) {
            best = Some((s, end));
        }
    }
    best
}

/// Shaft candidate on one Hough line: the longest nonzero run of the masked,
/// median-filtered trace along the line.
fn shaft_on_line(
    binary: &GrayImage,
    mask: &GrayImage,
    line: &HoughLine,
) -> Option<(usize, ArrowLine)> {
    let (p0, p1) = boundary_endpoints(line, binary.width, binary.height)?;

    let samples = (p0 - p1).norm().ceil().max(2.0) as usize;
    let trace: Vec<u8> = (0..samples)
        .map(|i| {
            let t = i as f64 / (samples - 1) as f64;
            let p = p0 + (p1 - p0) * t;
            let (x, y) = (p.x.round() as i64, p.y.round() as i64);
            if x < 0
                || y < 0
                || x >= binary.width as i64
                || y >= binary.height as i64
                || mask.get(x as usize, y as usize) == 0
            {
                0
            } else {
                binary.get(x as usize, y as usize)
            }
        })
        .collect();

    let filtered = median_trace(&trace);
    let (s, e) = longest_run(&filtered)?;
    let at = |i: usize| p0 + (p1 - p0) * (i as f64 / (samples - 1) as f64);
    Some((
        e - s + 1,
        ArrowLine {
            start: at(s),
            end: at(e),
        },
    ))
}

/// Localize the arrow shaft on a binarized difference frame.
///
/// `mask` (255 = keep) removes static structure and perpendicular clutter
/// before the trace along each accepted Hough line is evaluated; of all
/// qualifying lines the one carrying the longest solid run wins.
pub fn locate_arrow(
    binary: &GrayImage,
    mask: &GrayImage,
    expected_angle_deg: f64,
) -> Option<ArrowLine> {
    let mut best: Option<(usize, ArrowLine)> = None;
    for line in find_arrow_lines(binary, expected_angle_deg) {
        if let Some((run, shaft)) = shaft_on_line(binary, mask, &line) {
            if best.as_ref().is_none_or(|&(b, _)| run > b) {
                best = Some((run, shaft));
            }
        }
    }
    best.map(|(_, shaft)| shaft)
}
