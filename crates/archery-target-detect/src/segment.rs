//! Multi-channel color segmentation.
//!
//! Targets are segmented in HSV space with OpenCV-convention hue in
//! `[0, 180)`. Red wraps around the hue wheel, blue sits in a contiguous
//! mid band; yellow, black and white predicates exist for layouts with more
//! ring families.

use archery_target_core::{median_blur, GrayImage, RgbImage};

/// Supported ring color families.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ColorBand {
    Red,
    Blue,
    Yellow,
    Black,
    White,
}

impl ColorBand {
    /// Threshold predicate over `(h, s, v)` with h in `[0, 180)`.
    fn matches(self, h: u8, s: u8, v: u8) -> bool {
        match self {
            ColorBand::Red => (h > 160 || h < 10) && s > 50 && v > 50,
            ColorBand::Blue => h > 90 && h < 140 && s > 75 && v > 75,
            ColorBand::Yellow => h > 20 && h < 40 && s > 50 && v > 50,
            ColorBand::Black => v < 50,
            ColorBand::White => s < 30 && v > 200,
        }
    }
}

/// RGB to HSV, hue scaled to `[0, 180)`, saturation and value in `[0, 255]`.
pub fn rgb_to_hsv(rgb: [u8; 3]) -> (u8, u8, u8) {
    let r = rgb[0] as f64 / 255.0;
    let g = rgb[1] as f64 / 255.0;
    let b = rgb[2] as f64 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let hue_deg = if delta < 1e-9 {
        0.0
    } else if max == r {
        60.0 * ((g - b) / delta).rem_euclid(6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };

    let s = if max < 1e-9 { 0.0 } else { delta / max };
    (
        (hue_deg / 2.0).round().min(179.0) as u8,
        (s * 255.0).round() as u8,
        (max * 255.0).round() as u8,
    )
}

/// Binary mask (0/255) of pixels in the color band, de-speckled with
/// repeated median filtering scaled to the image size.
pub fn color_mask(image: &RgbImage, band: ColorBand) -> GrayImage {
    let mut mask = GrayImage::new(image.width, image.height);
    for y in 0..image.height {
        for x in 0..image.width {
            let (h, s, v) = rgb_to_hsv(image.get(x, y));
            if band.matches(h, s, v) {
                mask.set(x, y, 1);
            }
        }
    }
    for _ in 0..image.width.max(image.height) / 100 {
        mask = median_blur(&mask);
    }
    for v in &mut mask.data {
        *v *= 255;
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsv_conversion_of_primaries() {
        assert_eq!(rgb_to_hsv([255, 0, 0]), (0, 255, 255));
        let (h, s, v) = rgb_to_hsv([0, 0, 255]);
        assert_eq!((h, s, v), (120, 255, 255));
        let (h, ..) = rgb_to_hsv([0, 255, 0]);
        assert_eq!(h, 60);
    }

    #[test]
    fn red_band_wraps_the_hue_wheel() {
        // Slightly orange red and slightly purple red both pass.
        assert!(ColorBand::Red.matches(5, 200, 200));
        assert!(ColorBand::Red.matches(170, 200, 200));
        assert!(!ColorBand::Red.matches(90, 200, 200));
        // Desaturated pixels are rejected regardless of hue.
        assert!(!ColorBand::Red.matches(5, 20, 200));
    }

    #[test]
    fn masks_separate_red_from_blue() {
        let mut img = RgbImage::new(40, 40);
        for y in 0..40 {
            for x in 0..20 {
                img.set(x, y, [220, 20, 20]);
            }
            for x in 20..40 {
                img.set(x, y, [20, 20, 220]);
            }
        }
        let red = color_mask(&img, ColorBand::Red);
        let blue = color_mask(&img, ColorBand::Blue);
        assert_eq!(red.get(5, 20), 255);
        assert_eq!(red.get(35, 20), 0);
        assert_eq!(blue.get(35, 20), 255);
        assert_eq!(blue.get(5, 20), 0);
    }

    #[test]
    fn black_and_white_bands_use_value_and_saturation() {
        let (h, s, v) = rgb_to_hsv([10, 10, 10]);
        assert!(ColorBand::Black.matches(h, s, v));
        let (h, s, v) = rgb_to_hsv([250, 250, 250]);
        assert!(ColorBand::White.matches(h, s, v));
    }
}
