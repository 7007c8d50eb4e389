//! Standard Hough line transform over binary images.
//!
//! The accumulator is built once per image and can then be queried at
//! different vote thresholds, which keeps progressive threshold relaxation
//! cheap.

use archery_target_core::GrayImage;

/// One detected line in normal form: `x*cos(theta) + y*sin(theta) = rho`,
/// theta in degrees in `[0, 180)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HoughLine {
    pub rho: f64,
    pub theta_deg: f64,
    pub votes: u32,
}

/// Vote accumulator with 1 px rho resolution and 1 degree theta resolution.
pub struct HoughTransform {
    acc: Vec<u32>,
    diag: i64,
}

const THETA_BINS: usize = 180;

impl HoughTransform {
    /// Accumulate votes from every nonzero pixel.
    pub fn new(binary: &GrayImage) -> Self {
        let diag = ((binary.width * binary.width + binary.height * binary.height) as f64)
            .sqrt()
            .ceil() as i64;
        let rho_bins = (2 * diag + 1) as usize;
        let mut acc = vec![0u32; THETA_BINS * rho_bins];

        let mut trig = [(0.0f64, 0.0f64); THETA_BINS];
        for (t, entry) in trig.iter_mut().enumerate() {
            let rad = (t as f64).to_radians();
            *entry = (rad.cos(), rad.sin());
        }

        for y in 0..binary.height {
            for x in 0..binary.width {
                if binary.get(x, y) == 0 {
                    continue;
                }
                for (t, &(cos, sin)) in trig.iter().enumerate() {
                    let rho = (x as f64 * cos + y as f64 * sin).round() as i64;
                    acc[t * rho_bins + (rho + diag) as usize] += 1;
                }
            }
        }
        Self { acc, diag }
    }

    /// All lines with at least `threshold` votes, strongest first. Ties
    /// break on (theta, rho) so the result is deterministic.
    pub fn lines_above(&self, threshold: u32) -> Vec<HoughLine> {
        let rho_bins = (2 * self.diag + 1) as usize;
        let mut lines = Vec::new();
        for t in 0..THETA_BINS {
            for r in 0..rho_bins {
                let votes = self.acc[t * rho_bins + r];
                if votes >= threshold && threshold > 0 {
                    lines.push(HoughLine {
                        rho: (r as i64 - self.diag) as f64,
                        theta_deg: t as f64,
                        votes,
                    });
                }
            }
        }
        lines.sort_by(|a, b| {
            b.votes
                .cmp(&a.votes)
                .then(a.theta_deg.total_cmp(&b.theta_deg))
                .then(a.rho.total_cmp(&b.rho))
        });
        lines
    }
}

/// Smallest angular distance between two line orientations, in degrees.
/// Orientations are 180-periodic.
pub fn angle_diff_deg(a: f64, b: f64) -> f64 {
    let d = (a - b).rem_euclid(180.0);
    d.min(180.0 - d)
}
