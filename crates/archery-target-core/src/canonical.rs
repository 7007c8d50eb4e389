//! Canonical frame transform.
//!
//! Rotates and anisotropically scales a frame so the target ellipse becomes a
//! circle centered at a known point, then restricts the view to a disk-masked
//! region of interest around the scoring area. The two affine matrices, the
//! recovered center, the bounds and the mask are cached so later frames can
//! be mapped without refitting anything.

use log::debug;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::affine::{warp_gray, warp_rgb, Affine2};
use crate::ellipse::Ellipse;
use crate::filter::draw_disk;
use crate::image::{GrayImage, RgbImage};

/// Crop window `[left, right) x [top, bottom)` in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub top: usize,
    pub bottom: usize,
    pub left: usize,
    pub right: usize,
}

/// Round half-up, matching the integer snapping used throughout the
/// transform chain.
#[inline]
fn snap(v: f64) -> i64 {
    (v + 0.5).floor() as i64
}

/// Symmetric box of half-size `half` around `center`, clipped to the frame
/// with a center-preserving fallback: when one side hits an edge the
/// opposite side is pulled in so the center stays at the box midpoint.
fn clipped_box(center: Point2<f64>, half: f64, width: usize, height: usize) -> Bounds {
    let (w, h) = (width as i64 - 1, height as i64 - 1);
    let mut top = snap(center.y - half).max(0);
    let mut bottom = snap(center.y + half).min(h);
    let mut left = snap(center.x - half).max(0);
    let mut right = snap(center.x + half).min(w);

    if top == 0 {
        bottom = snap(2.0 * center.y).min(h);
    } else if bottom == h {
        top = snap(bottom as f64 - 2.0 * (bottom as f64 - center.y).abs()).max(0);
    }
    if left == 0 {
        right = snap(2.0 * center.x).min(w);
    } else if right == w {
        left = snap(right as f64 - 2.0 * (right as f64 - center.x).abs()).max(0);
    }

    Bounds {
        top: top as usize,
        bottom: bottom.max(top) as usize,
        left: left as usize,
        right: right.max(left) as usize,
    }
}

/// Crop window around the ellipse with a symmetric margin equal to the major
/// axis length. Cached by callers that must crop later frames identically.
pub fn ellipse_crop_bounds(width: usize, height: usize, ellipse: &Ellipse) -> Bounds {
    clipped_box(ellipse.center, ellipse.axes.major, width, height)
}

/// Crop tightly around the ellipse with a symmetric margin equal to the
/// major axis length.
pub fn crop_to_ellipse(image: &RgbImage, ellipse: &Ellipse) -> RgbImage {
    let b = ellipse_crop_bounds(image.width, image.height, ellipse);
    image.crop(b.top, b.bottom, b.left, b.right)
}

/// Crop around the ellipse and recompute the ellipse relative to the crop:
/// the new center is the crop midpoint, axes and angle are unchanged.
pub fn crop_to_ellipse_centered(image: &RgbImage, ellipse: &Ellipse) -> (RgbImage, Ellipse) {
    let cropped = crop_to_ellipse(image, ellipse);
    let recentered = Ellipse {
        center: Point2::new(cropped.width as f64 / 2.0, cropped.height as f64 / 2.0),
        ..*ellipse
    };
    (cropped, recentered)
}

/// Cached per-session transform: rotation + scaling affines, the recovered
/// canonical center, the region-of-interest bounds and the disk mask.
#[derive(Clone, Debug)]
pub struct TransformState {
    pub rotation: Affine2,
    pub scaling: Affine2,
    pub center: (i32, i32),
    pub bounds: Bounds,
    pub region_mask: GrayImage,
    /// Canonical circle radius (the semi-major axis), fixed at build time.
    /// Not derivable from `bounds`, which may be clipped at frame edges.
    pub radius: f64,
}

impl TransformState {
    /// Derive the transform from a crop-relative ellipse.
    ///
    /// The rotation brings the major axis onto the vertical frame axis; the
    /// horizontal scale `major/minor` then equalizes the extents, so the
    /// ellipse becomes a circle of radius `major/2`. The canonical center is
    /// recovered as the median coordinate of a synthetic marker pixel
    /// carried through both warps, which sidesteps analytic recomputation
    /// and nearest-neighbour bleeding alike.
    pub fn build(image: &RgbImage, ellipse: &Ellipse) -> Option<(RgbImage, TransformState)> {
        if image.width == 0 || image.height == 0 || ellipse.axes.minor <= f64::EPSILON {
            return None;
        }

        let rotation = Affine2::rotation(ellipse.center, ellipse.angle_deg - 90.0);
        let k = ellipse.axes.major / ellipse.axes.minor;
        let scaling = Affine2::horizontal_scale(k, ellipse.center.x);

        let rotated = warp_rgb(image, &rotation)?;
        let scaled = warp_rgb(&rotated, &scaling)?;

        let mut marker = GrayImage::new(image.width, image.height);
        let mx = snap(ellipse.center.x).clamp(0, image.width as i64 - 1) as usize;
        let my = snap(ellipse.center.y).clamp(0, image.height as i64 - 1) as usize;
        marker.set(mx, my, 255);
        let marker = warp_gray(&warp_gray(&marker, &rotation)?, &scaling)?;
        let center = median_nonzero(&marker)?;
        debug!(
            "canonical center recovered at ({}, {}), scale {:.3}",
            center.0, center.1, k
        );

        let radius = ellipse.axes.major / 2.0;
        let (bounds, region_mask) = bounds_and_mask(
            scaled.width,
            scaled.height,
            Point2::new(center.0 as f64, center.1 as f64),
            radius,
        );

        Some((
            scaled,
            TransformState {
                rotation,
                scaling,
                center,
                bounds,
                region_mask,
                radius,
            },
        ))
    }

    /// Apply the cached rotation and scaling to a later frame (fast path, no
    /// refitting).
    pub fn warp(&self, image: &RgbImage) -> Option<RgbImage> {
        warp_rgb(&warp_rgb(image, &self.rotation)?, &self.scaling)
    }

    /// Crop to the cached bounds and zero the background outside the disk
    /// mask.
    pub fn reduce_and_mask(&self, image: &RgbImage) -> RgbImage {
        let b = self.bounds;
        image
            .crop(b.top, b.bottom, b.left, b.right)
            .masked(&self.region_mask)
    }

    /// Full cached pipeline for one crop-relative frame.
    pub fn canonical(&self, image: &RgbImage) -> Option<RgbImage> {
        Some(self.reduce_and_mask(&self.warp(image)?))
    }

    /// Canonical circle radius.
    pub fn canonical_radius(&self) -> f64 {
        self.radius
    }
}

/// Region-of-interest box (half-size 1.2x the canonical radius) and the disk
/// mask of the same radius centered in the box.
fn bounds_and_mask(
    width: usize,
    height: usize,
    center: Point2<f64>,
    radius: f64,
) -> (Bounds, GrayImage) {
    let half = 1.2 * radius;
    let bounds = clipped_box(center, half, width, height);

    let (m, n) = (bounds.bottom - bounds.top, bounds.right - bounds.left);
    let mut mask = GrayImage::new(n, m);
    draw_disk(
        &mut mask,
        (n as i64 / 2, m as i64 / 2),
        half.round() as i64,
        1,
    );
    (bounds, mask)
}

/// Median coordinate of all nonzero pixels; `None` on an all-zero image.
fn median_nonzero(img: &GrayImage) -> Option<(i32, i32)> {
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for y in 0..img.height {
        for x in 0..img.width {
            if img.get(x, y) != 0 {
                xs.push(x as i32);
                ys.push(y as i32);
            }
        }
    }
    if xs.is_empty() {
        return None;
    }
    xs.sort_unstable();
    ys.sort_unstable();
    Some((xs[xs.len() / 2], ys[ys.len() / 2]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ellipse::fit_ellipse;

    fn frame_with_ellipse(width: usize, height: usize, ell: &Ellipse) -> RgbImage {
        let mut img = RgbImage::new(width, height);
        for p in ell.sample_points(2048) {
            let (x, y) = (p.x.round() as i64, p.y.round() as i64);
            if x >= 0 && y >= 0 && (x as usize) < width && (y as usize) < height {
                img.set(x as usize, y as usize, [255, 255, 255]);
            }
        }
        img
    }

    #[test]
    fn clipped_box_is_symmetric_in_the_interior() {
        let b = clipped_box(Point2::new(100.0, 100.0), 30.0, 300, 300);
        assert_eq!(b, Bounds { top: 70, bottom: 130, left: 70, right: 130 });
    }

    #[test]
    fn clipped_box_preserves_center_at_edges() {
        let b = clipped_box(Point2::new(20.0, 100.0), 50.0, 300, 300);
        // Left side clipped to 0, right side pulled in to keep the center.
        assert_eq!(b.left, 0);
        assert_eq!(b.right, 40);
    }

    #[test]
    fn crop_recenters_the_ellipse() {
        let ell = Ellipse::new(Point2::new(150.0, 150.0), 80.0, 60.0, 90.0);
        let img = RgbImage::new(300, 300);
        let (cropped, recentered) = crop_to_ellipse_centered(&img, &ell);
        assert_eq!(cropped.width, 160);
        assert_eq!(cropped.height, 160);
        assert_eq!(recentered.center, Point2::new(80.0, 80.0));
        assert_eq!(recentered.axes, ell.axes);
    }

    #[test]
    fn crop_then_refit_recovers_reported_center() {
        let ell = Ellipse::new(Point2::new(150.0, 140.0), 90.0, 70.0, 0.0);
        let img = frame_with_ellipse(320, 320, &ell);
        let (cropped, recentered) = crop_to_ellipse_centered(&img, &ell);
        let pts: Vec<Point2<f64>> = (0..cropped.height)
            .flat_map(|y| (0..cropped.width).map(move |x| (x, y)))
            .filter(|&(x, y)| cropped.get(x, y)[0] != 0)
            .map(|(x, y)| Point2::new(x as f64, y as f64))
            .collect();
        let refit = fit_ellipse(&pts).expect("refit");
        assert!((refit.center.x - recentered.center.x).abs() <= 1.5);
        assert!((refit.center.y - recentered.center.y).abs() <= 1.5);
    }

    #[test]
    fn transform_turns_the_ellipse_into_a_circle() {
        let ell = Ellipse::new(Point2::new(150.0, 150.0), 100.0, 50.0, 90.0);
        let img = frame_with_ellipse(300, 300, &ell);
        let (cropped, recentered) = crop_to_ellipse_centered(&img, &ell);
        let (_, state) = TransformState::build(&cropped, &recentered).expect("transform");

        // Point-wise check: boundary points pushed through both cached
        // matrices must land on a circle of radius major/2.
        let r = ell.axes.major / 2.0;
        let center = Point2::new(state.center.0 as f64, state.center.1 as f64);
        for p in recentered.sample_points(64) {
            let q = state.scaling.apply(state.rotation.apply(p));
            let dist = ((q.x - center.x).powi(2) + (q.y - center.y).powi(2)).sqrt();
            assert!((dist - r).abs() < 2.5, "dist {dist} vs radius {r}");
        }
    }

    #[test]
    fn cached_matrices_are_idempotent_across_reapplication() {
        let ell = Ellipse::new(Point2::new(150.0, 150.0), 100.0, 50.0, 90.0);
        let img = frame_with_ellipse(300, 300, &ell);
        let (cropped, recentered) = crop_to_ellipse_centered(&img, &ell);
        let (first, state) = TransformState::build(&cropped, &recentered).expect("transform");
        let second = state.warp(&cropped).expect("warp");
        assert_eq!(first.width, second.width);
        assert_eq!(first.height, second.height);
        // Fit on the re-applied warp: aspect ratio within 1% of circular.
        let pts: Vec<Point2<f64>> = (0..second.height)
            .flat_map(|y| (0..second.width).map(move |x| (x, y)))
            .filter(|&(x, y)| second.get(x, y)[0] > 64)
            .map(|(x, y)| Point2::new(x as f64, y as f64))
            .collect();
        let refit = fit_ellipse(&pts).expect("refit");
        assert!(
            (refit.aspect_ratio() - 1.0).abs() < 0.01,
            "aspect {}",
            refit.aspect_ratio()
        );
    }

    #[test]
    fn canonical_radius_survives_edge_clipping() {
        // Target near the top edge: the ROI box is clipped and shrinks, the
        // canonical radius must not shrink with it.
        let ell = Ellipse::new(Point2::new(80.0, 45.0), 80.0, 60.0, 90.0);
        let img = RgbImage::new(160, 100);
        let (_, state) = TransformState::build(&img, &ell).expect("transform");
        assert!(state.bounds.bottom - state.bounds.top < 96);
        assert_eq!(state.canonical_radius(), 40.0);
    }

    #[test]
    fn region_mask_is_a_centered_disk() {
        let (bounds, mask) = bounds_and_mask(300, 300, Point2::new(150.0, 150.0), 50.0);
        assert_eq!(bounds.bottom - bounds.top, mask.height);
        assert_eq!(bounds.right - bounds.left, mask.width);
        assert_eq!(mask.get(mask.width / 2, mask.height / 2), 1);
        assert_eq!(mask.get(0, 0), 0);
    }
}
