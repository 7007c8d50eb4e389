//! Target detection: color segmentation, contour extraction and ellipse
//! candidate scoring.
//!
//! The entry point is [`detect_target`]: raw color frame in, one synthesized
//! target ellipse out (or `None` when no admissible red/blue candidate pair
//! exists — a normal outcome the caller handles by re-prompting or manual
//! marking, never an error).

mod calibration;
mod candidates;
mod contours;
mod segment;

pub use calibration::{PlacementCalib, RingCalibration, RingPlacement, TargetKind};
pub use candidates::{
    best_pair, detection_matrix, ellipse_candidates, CandidateMatrix, EllipseCandidates,
};
pub use contours::{extract_contours, trace_contours, Contour, ContourSet};
pub use segment::{color_mask, rgb_to_hsv, ColorBand};

use archery_target_core::{Ellipse, RgbImage};
use log::debug;

/// Detect the scoring target on a raw color frame.
pub fn detect_target(image: &RgbImage, kind: TargetKind) -> Option<Ellipse> {
    let red = color_mask(image, ColorBand::Red);
    let blue = color_mask(image, ColorBand::Blue);

    let contours = extract_contours(&red, &blue)?;
    debug!(
        "contours: {} red / {} blue (padded)",
        contours.red.len(),
        contours.blue.len()
    );

    let candidates = ellipse_candidates(image.width, image.height, &contours)?;
    debug!(
        "candidates: {} red x {} blue",
        candidates.red.len(),
        candidates.blue.len()
    );

    let matrix = detection_matrix(&candidates, kind);
    let target = best_pair(&candidates, &matrix, kind);
    debug!("selected target: {target:?}");
    Some(target)
}
