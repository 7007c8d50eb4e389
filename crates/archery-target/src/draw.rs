//! Overlay drawing on color frames, for UI feedback during marking and
//! acquisition.

use archery_target_core::{Ellipse, RgbImage};
use nalgebra::Point2;

/// Rasterize the ellipse outline. Out-of-frame samples are skipped.
pub fn draw_ellipse(image: &mut RgbImage, ellipse: &Ellipse, color: [u8; 3]) {
    let samples = (std::f64::consts::PI * ellipse.axes.major).ceil().max(64.0) as usize;
    for p in ellipse.sample_points(samples) {
        put_pixel(image, p, color);
    }
}

/// Draw small filled squares at the marked points.
pub fn draw_marks(image: &mut RgbImage, points: &[Point2<f64>], radius: i64, color: [u8; 3]) {
    for p in points {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                put_pixel(image, Point2::new(p.x + dx as f64, p.y + dy as f64), color);
            }
        }
    }
}

fn put_pixel(image: &mut RgbImage, p: Point2<f64>, color: [u8; 3]) {
    let (x, y) = (p.x.round() as i64, p.y.round() as i64);
    if x >= 0 && y >= 0 && (x as usize) < image.width && (y as usize) < image.height {
        image.set(x as usize, y as usize, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outline_touches_the_axis_extremes() {
        let mut img = RgbImage::new(100, 100);
        let ell = Ellipse::new(Point2::new(50.0, 50.0), 60.0, 40.0, 0.0);
        draw_ellipse(&mut img, &ell, [0, 255, 0]);
        assert_eq!(img.get(80, 50), [0, 255, 0]);
        assert_eq!(img.get(50, 30), [0, 255, 0]);
        assert_eq!(img.get(50, 50), [0, 0, 0]);
    }

    #[test]
    fn drawing_clips_at_the_frame_border() {
        let mut img = RgbImage::new(20, 20);
        let ell = Ellipse::new(Point2::new(0.0, 0.0), 30.0, 30.0, 0.0);
        draw_ellipse(&mut img, &ell, [255, 0, 0]);
        draw_marks(&mut img, &[Point2::new(-5.0, -5.0)], 2, [255, 0, 0]);
        assert_eq!(img.get(15, 0), [255, 0, 0]);
    }
}
