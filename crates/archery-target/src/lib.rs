//! Archery target tracking: detection, canonical scoring geometry and arrow
//! hit localization.
//!
//! The session type is [`TargetModel`]; the building blocks live in the
//! member crates and are re-exported here, so an application depends on this
//! crate only.
//!
//! A session runs in three phases:
//! 1. acquire the target ellipse on a raw frame, automatically
//!    ([`TargetModel::detect_target`]) or from marked points
//!    ([`TargetModel::mark_ellipse`]);
//! 2. prepare the canonical transform against a reference frame
//!    ([`TargetModel::prepare_transform`]);
//! 3. feed frames ([`TargetModel::get_hit`]) and receive normalized impact
//!    distances when arrows arrive.

mod draw;
mod model;

pub use draw::{draw_ellipse, draw_marks};
pub use model::TargetModel;

pub use archery_target_core::{
    abs_diff, crop_to_ellipse, crop_to_ellipse_centered, ellipse_crop_bounds, fit_ellipse,
    init_with_level, warp_gray, warp_rgb, Affine2, Axes, Bounds, Ellipse, GrayImage, RgbImage,
    TransformState,
};
pub use archery_target_detect::{
    best_pair, color_mask, detect_target, detection_matrix, ellipse_candidates, extract_contours,
    CandidateMatrix, ColorBand, Contour, ContourSet, EllipseCandidates, PlacementCalib,
    RingCalibration, RingPlacement, TargetKind,
};
pub use archery_target_hit::{
    binarize, diff_features, find_arrow_lines, hit_detection_mask, locate_arrow,
    suppression_mask, ArrowLine, DatasetError, HitClassifier, HitDataset, HitExample, HoughLine,
    HoughTransform,
};
