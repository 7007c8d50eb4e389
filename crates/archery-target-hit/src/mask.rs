//! Suppression masks for arrow localization.
//!
//! Straight edges that are not the arrow, static frame structure and lines
//! perpendicular to the expected shaft, are painted out of a mask so they
//! cannot contribute to the shaft trace.

use archery_target_core::{draw_line, erode, median_blur, sobel_edges, GrayImage};
use log::debug;

use crate::hough::{angle_diff_deg, HoughTransform};

/// Mask (255 = keep, 0 = suppress) that zeroes every strong Hough line of
/// `binary` whose orientation is within `tol_deg` of `ref_angle_deg`. The
/// painted lines are widened by erosion with a `ksize` kernel.
pub fn suppression_mask(
    binary: &GrayImage,
    ref_angle_deg: f64,
    tol_deg: f64,
    threshold: u32,
    ksize: usize,
) -> GrayImage {
    let (w, h) = (binary.width, binary.height);
    let mut mask = GrayImage::filled(w, h, 255);

    let hough = HoughTransform::new(binary);
    let lines = hough.lines_above(threshold);
    let mut suppressed = 0usize;
    let reach = ((w + h) / 2) as f64;
    for line in &lines {
        if angle_diff_deg(line.theta_deg, ref_angle_deg) >= tol_deg {
            continue;
        }
        suppressed += 1;
        let rad = line.theta_deg.to_radians();
        let (cos, sin) = (rad.cos(), rad.sin());
        // Foot of the normal, extended both ways along the line direction.
        let (x0, y0) = (line.rho * cos, line.rho * sin);
        let p0 = (
            (x0 - reach * sin).round() as i64,
            (y0 + reach * cos).round() as i64,
        );
        let p1 = (
            (x0 + reach * sin).round() as i64,
            (y0 - reach * cos).round() as i64,
        );
        draw_line(&mut mask, p0, p1, 0);
    }
    debug!("suppressed {suppressed} of {} lines", lines.len());

    erode(&mask, ksize)
}

/// Static suppression mask built from the reference frame of the canonical
/// view: strong straight edges near the expected shaft orientation would
/// otherwise fake an arrow on every difference frame.
pub fn hit_detection_mask(reference: &GrayImage, arrow_angle_deg: f64) -> GrayImage {
    let smooth = median_blur(reference);
    let edges = sobel_edges(&smooth, 100.0);
    let threshold = ((reference.width + reference.height) / 8) as u32;
    suppression_mask(&edges, arrow_angle_deg, 20.0, threshold, 7)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_line_is_painted_out() {
        let mut img = GrayImage::new(64, 64);
        for x in 0..64 {
            img.set(x, 30, 255);
        }
        let mask = suppression_mask(&img, 90.0, 20.0, 40, 3);
        assert_eq!(mask.get(32, 30), 0);
        assert_eq!(mask.get(32, 10), 255);
    }

    #[test]
    fn mismatched_orientation_is_kept() {
        let mut img = GrayImage::new(64, 64);
        for y in 0..64 {
            img.set(30, y, 255);
        }
        // The line's orientation (theta 0) is far from the reference.
        let mask = suppression_mask(&img, 90.0, 20.0, 40, 3);
        assert_eq!(mask.get(30, 32), 255);
    }

    #[test]
    fn erosion_widens_the_suppressed_band() {
        let mut img = GrayImage::new(64, 64);
        for x in 0..64 {
            img.set(x, 30, 255);
        }
        let mask = suppression_mask(&img, 90.0, 20.0, 40, 7);
        for dy in -3i64..=3 {
            assert_eq!(mask.get_clamped(32, 30 + dy), 0);
        }
    }

    #[test]
    fn flat_reference_suppresses_nothing() {
        let flat = GrayImage::filled(48, 48, 128);
        let mask = hit_detection_mask(&flat, 90.0);
        assert!(mask.data.iter().all(|&v| v == 255));
    }
}
