//! Stateful target tracking session.
//!
//! `TargetModel` ties the pipeline together: target ellipse acquisition
//! (automatic or manually marked), the cached canonical transform, the
//! rolling three-frame window and hit detection with impact localization.

use archery_target_core::{
    abs_diff, ellipse_crop_bounds, Bounds, Ellipse, GrayImage, RgbImage, TransformState,
};
use archery_target_detect::{detect_target, TargetKind};
use archery_target_hit::{
    binarize, hit_detection_mask, locate_arrow, suppression_mask, DatasetError, HitClassifier,
    HitDataset,
};
use log::{debug, info};
use nalgebra::Point2;

/// Expected shaft orientation in the canonical view, as a Hough normal
/// angle: the shaft projects roughly horizontally, its normal is vertical.
const ARROW_ANGLE_DEG: f64 = 90.0;

/// Orientation tolerance and erosion size of the perpendicular clutter pass.
const PERP_TOL_DEG: f64 = 20.0;
const PERP_ERODE: usize = 3;

/// One tracking session against a fixed camera and target.
pub struct TargetModel {
    kind: TargetKind,
    classifier: HitClassifier,
    ellipse: Option<Ellipse>,
    crop: Option<Bounds>,
    transform: Option<TransformState>,
    hit_mask: Option<GrayImage>,
    frames: Vec<GrayImage>,
}

impl TargetModel {
    /// Fit the change classifier and start an empty session.
    pub fn new(kind: TargetKind, dataset: &HitDataset) -> Result<Self, DatasetError> {
        Ok(Self {
            kind,
            classifier: HitClassifier::fit(dataset)?,
            ellipse: None,
            crop: None,
            transform: None,
            hit_mask: None,
            frames: Vec::new(),
        })
    }

    /// Currently acquired target ellipse, in raw frame coordinates.
    pub fn ellipse(&self) -> Option<&Ellipse> {
        self.ellipse.as_ref()
    }

    /// Whether the canonical transform has been prepared.
    pub fn is_ready(&self) -> bool {
        self.transform.is_some()
    }

    /// Acquire the target automatically on a raw frame. Replaces any earlier
    /// acquisition and invalidates the prepared transform.
    pub fn detect_target(&mut self, frame: &RgbImage) -> Option<&Ellipse> {
        let ellipse = detect_target(frame, self.kind)?;
        info!("target acquired: {ellipse:?}");
        self.set_ellipse(ellipse);
        self.ellipse.as_ref()
    }

    /// Acquire the target from exactly five manually marked boundary points,
    /// which determine the ellipse uniquely.
    pub fn mark_ellipse(&mut self, points: &[Point2<f64>]) -> Option<&Ellipse> {
        if points.len() != 5 {
            return None;
        }
        let ellipse = archery_target_core::fit_ellipse(points)?;
        info!("target marked manually: {ellipse:?}");
        self.set_ellipse(ellipse);
        self.ellipse.as_ref()
    }

    fn set_ellipse(&mut self, ellipse: Ellipse) {
        self.ellipse = Some(ellipse);
        self.crop = None;
        self.transform = None;
        self.hit_mask = None;
        self.frames.clear();
    }

    /// Build the canonical transform from the acquired ellipse and a
    /// reference frame. A no-op when the transform is already prepared;
    /// `None` without an acquired ellipse or on a degenerate geometry.
    pub fn prepare_transform(&mut self, frame: &RgbImage) -> Option<()> {
        if self.transform.is_some() {
            return Some(());
        }
        let ellipse = self.ellipse.as_ref()?;

        let crop = ellipse_crop_bounds(frame.width, frame.height, ellipse);
        let cropped = frame.crop(crop.top, crop.bottom, crop.left, crop.right);
        let recentered = Ellipse {
            center: Point2::new(cropped.width as f64 / 2.0, cropped.height as f64 / 2.0),
            ..*ellipse
        };
        let (_, state) = TransformState::build(&cropped, &recentered)?;

        let reference = state.canonical(&cropped)?;
        let mask = hit_detection_mask(&reference.to_gray(), ARROW_ANGLE_DEG);
        debug!(
            "transform prepared: crop {crop:?}, canonical {}x{}",
            mask.width, mask.height
        );

        self.crop = Some(crop);
        self.transform = Some(state);
        self.hit_mask = Some(mask);
        self.frames.clear();
        Some(())
    }

    /// Map a raw frame into the canonical view through the cached transform.
    pub fn transformed(&self, frame: &RgbImage) -> Option<RgbImage> {
        let crop = self.crop.as_ref()?;
        let state = self.transform.as_ref()?;
        let cropped = frame.crop(crop.top, crop.bottom, crop.left, crop.right);
        state.canonical(&cropped)
    }

    fn push_canonical(&mut self, gray: GrayImage) {
        self.frames.push(gray);
        if self.frames.len() > 3 {
            self.frames.remove(0);
        }
    }

    /// Feed the next raw frame and report an arrow hit.
    ///
    /// Returns the normalized impact distance (0 at the target center, 1 on
    /// the canonical circle) when an arrow arrived between the two most
    /// recent frames and its shaft could be localized; `None` otherwise.
    pub fn get_hit(&mut self, frame: &RgbImage) -> Option<f64> {
        let canonical = self.transformed(frame)?;
        self.push_canonical(canonical.to_gray());
        if self.frames.len() < 3 {
            return None;
        }

        let older = abs_diff(&self.frames[0], &self.frames[1]);
        let newer = abs_diff(&self.frames[1], &self.frames[2]);
        if !self.classifier.detect_hit(&older, &newer) {
            return None;
        }
        info!("hit transition detected, localizing the shaft");

        // Static edges are removed before the line search, not just the trace.
        let static_mask = self.hit_mask.as_ref()?;
        let binary = binarize(&newer).masked(static_mask);
        let threshold = ((binary.width + binary.height) / 8) as u32;
        let perpendicular = suppression_mask(
            &binary,
            ARROW_ANGLE_DEG + 90.0,
            PERP_TOL_DEG,
            threshold,
            PERP_ERODE,
        );

        let shaft = locate_arrow(&binary, &perpendicular, ARROW_ANGLE_DEG)?;
        let center = Point2::new(binary.width as f64 / 2.0, binary.height as f64 / 2.0);
        let impact = shaft.impact_point(center);
        let radius = self.transform.as_ref()?.canonical_radius();
        let distance = (impact - center).norm() / radius;
        info!("impact at {impact:?}, normalized distance {distance:.3}");
        Some(distance)
    }

    /// Feed a raw frame during data collection and record the newest
    /// difference frame as a labeled example.
    pub fn record_example(
        &mut self,
        frame: &RgbImage,
        hit: bool,
        dataset: &mut HitDataset,
    ) -> Option<()> {
        let canonical = self.transformed(frame)?;
        self.push_canonical(canonical.to_gray());
        let n = self.frames.len();
        if n < 2 {
            return None;
        }
        dataset.append(&abs_diff(&self.frames[n - 2], &self.frames[n - 1]), hit);
        Some(())
    }

    /// Drop the acquired target and all cached state; the classifier stays.
    pub fn reset(&mut self) {
        self.ellipse = None;
        self.crop = None;
        self.transform = None;
        self.hit_mask = None;
        self.frames.clear();
    }
}
