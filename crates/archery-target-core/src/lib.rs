//! Core types and utilities for archery target tracking.
//!
//! This crate holds the pixel-level and geometric primitives shared by the
//! detection and hit-localization crates: owned image containers, small
//! filtering kernels, the `Ellipse` entity with direct least-squares fitting,
//! 2x3 affine warps and the canonical (top-down) frame transform.

mod affine;
mod canonical;
mod ellipse;
mod filter;
mod image;
mod logger;

pub use affine::{warp_gray, warp_rgb, Affine2};
pub use canonical::{
    crop_to_ellipse, crop_to_ellipse_centered, ellipse_crop_bounds, Bounds, TransformState,
};
pub use ellipse::{fit_ellipse, Axes, Ellipse};
pub use filter::{draw_disk, draw_line, erode, median_blur, sobel_edges};
pub use image::{abs_diff, GrayImage, RgbImage};
pub use logger::init_with_level;
