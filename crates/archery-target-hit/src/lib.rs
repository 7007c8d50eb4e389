//! Hit detection and arrow impact localization.
//!
//! Works on the canonical (circle-normalized) view produced by
//! `archery-target-core`: consecutive frames are differenced, a 3-NN
//! classifier over difference statistics decides whether an arrow just
//! arrived, and a Hough-based search localizes the shaft on the difference
//! frame.

mod arrow;
mod classifier;
mod dataset;
mod hough;
mod mask;

pub use arrow::{binarize, find_arrow_lines, locate_arrow, ArrowLine};
pub use classifier::{diff_features, HitClassifier};
pub use dataset::{DatasetError, HitDataset, HitExample};
pub use hough::{angle_diff_deg, HoughLine, HoughTransform};
pub use mask::{hit_detection_mask, suppression_mask};
