//! 2x3 affine transforms and bilinear image warping.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::image::{GrayImage, RgbImage};

/// Row-major 2x3 affine matrix mapping source points to destination points:
/// `dst = M * [x, y, 1]^T`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Affine2 {
    pub m: [[f64; 3]; 2],
}

impl Affine2 {
    pub fn identity() -> Self {
        Self {
            m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
        }
    }

    /// Rotation by `angle_deg` about `center` (positive angles rotate image
    /// content counter-clockwise in standard coordinates).
    pub fn rotation(center: Point2<f64>, angle_deg: f64) -> Self {
        let (sin_a, cos_a) = angle_deg.to_radians().sin_cos();
        Self {
            m: [
                [
                    cos_a,
                    sin_a,
                    (1.0 - cos_a) * center.x - sin_a * center.y,
                ],
                [
                    -sin_a,
                    cos_a,
                    sin_a * center.x + (1.0 - cos_a) * center.y,
                ],
            ],
        }
    }

    /// Anisotropic horizontal scale by `k` pinned at `x_pin`: x maps to
    /// `k*x + (1-k)*x_pin`, y is unchanged.
    pub fn horizontal_scale(k: f64, x_pin: f64) -> Self {
        Self {
            m: [[k, 0.0, (1.0 - k) * x_pin], [0.0, 1.0, 0.0]],
        }
    }

    #[inline]
    pub fn apply(&self, p: Point2<f64>) -> Point2<f64> {
        Point2::new(
            self.m[0][0] * p.x + self.m[0][1] * p.y + self.m[0][2],
            self.m[1][0] * p.x + self.m[1][1] * p.y + self.m[1][2],
        )
    }

    /// Inverse transform; `None` when the linear part is singular.
    pub fn inverse(&self) -> Option<Self> {
        let [[a, b, tx], [c, d, ty]] = self.m;
        let det = a * d - b * c;
        if det.abs() < 1e-12 {
            return None;
        }
        let inv_det = 1.0 / det;
        let (ia, ib, ic, id) = (d * inv_det, -b * inv_det, -c * inv_det, a * inv_det);
        Some(Self {
            m: [
                [ia, ib, -(ia * tx + ib * ty)],
                [ic, id, -(ic * tx + id * ty)],
            ],
        })
    }
}

#[inline]
fn bilinear(img: &GrayImage, x: f64, y: f64) -> f64 {
    if x < -1.0 || y < -1.0 || x > img.width as f64 || y > img.height as f64 {
        return 0.0;
    }
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let sample = |dx: i64, dy: i64| {
        let xi = x0 as i64 + dx;
        let yi = y0 as i64 + dy;
        if xi < 0 || yi < 0 || xi >= img.width as i64 || yi >= img.height as i64 {
            0.0
        } else {
            img.get(xi as usize, yi as usize) as f64
        }
    };
    let top = sample(0, 0) + fx * (sample(1, 0) - sample(0, 0));
    let bot = sample(0, 1) + fx * (sample(1, 1) - sample(0, 1));
    top + fy * (bot - top)
}

/// Warp a gray image with the given forward affine (inverse-mapped bilinear
/// sampling, out-of-frame source pixels read as 0). Output has the same size
/// as the input.
pub fn warp_gray(src: &GrayImage, affine: &Affine2) -> Option<GrayImage> {
    let inv = affine.inverse()?;
    let mut out = GrayImage::new(src.width, src.height);
    for y in 0..src.height {
        for x in 0..src.width {
            let p = inv.apply(Point2::new(x as f64, y as f64));
            out.set(x, y, bilinear(src, p.x, p.y).round().clamp(0.0, 255.0) as u8);
        }
    }
    Some(out)
}

/// Channel-wise warp of an RGB image.
pub fn warp_rgb(src: &RgbImage, affine: &Affine2) -> Option<RgbImage> {
    let inv = affine.inverse()?;
    let mut out = RgbImage::new(src.width, src.height);
    for y in 0..src.height {
        for x in 0..src.width {
            let p = inv.apply(Point2::new(x as f64, y as f64));
            let x0 = p.x.floor();
            let y0 = p.y.floor();
            let fx = p.x - x0;
            let fy = p.y - y0;
            let mut rgb = [0u8; 3];
            for (ch, v) in rgb.iter_mut().enumerate() {
                let sample = |dx: i64, dy: i64| {
                    let xi = x0 as i64 + dx;
                    let yi = y0 as i64 + dy;
                    if xi < 0 || yi < 0 || xi >= src.width as i64 || yi >= src.height as i64 {
                        0.0
                    } else {
                        src.get(xi as usize, yi as usize)[ch] as f64
                    }
                };
                let top = sample(0, 0) + fx * (sample(1, 0) - sample(0, 0));
                let bot = sample(0, 1) + fx * (sample(1, 1) - sample(0, 1));
                *v = (top + fy * (bot - top)).round().clamp(0.0, 255.0) as u8;
            }
            out.set(x, y, rgb);
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rotation_keeps_center_fixed() {
        let c = Point2::new(10.0, 20.0);
        let r = Affine2::rotation(c, 37.0);
        let p = r.apply(c);
        assert_relative_eq!(p.x, c.x, epsilon = 1e-9);
        assert_relative_eq!(p.y, c.y, epsilon = 1e-9);
    }

    #[test]
    fn rotation_by_90_swaps_offsets() {
        let c = Point2::new(0.0, 0.0);
        let r = Affine2::rotation(c, 90.0);
        let p = r.apply(Point2::new(1.0, 0.0));
        assert_relative_eq!(p.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(p.y, -1.0, epsilon = 1e-9);
    }

    #[test]
    fn horizontal_scale_is_pinned() {
        let s = Affine2::horizontal_scale(2.0, 50.0);
        let pinned = s.apply(Point2::new(50.0, 7.0));
        assert_relative_eq!(pinned.x, 50.0);
        assert_relative_eq!(pinned.y, 7.0);
        let moved = s.apply(Point2::new(60.0, 7.0));
        assert_relative_eq!(moved.x, 70.0);
    }

    #[test]
    fn inverse_round_trips_points() {
        let a = Affine2::rotation(Point2::new(3.0, 4.0), 25.0);
        let inv = a.inverse().expect("invertible");
        let p = Point2::new(12.0, -5.0);
        let q = inv.apply(a.apply(p));
        assert_relative_eq!(q.x, p.x, epsilon = 1e-9);
        assert_relative_eq!(q.y, p.y, epsilon = 1e-9);
    }

    #[test]
    fn warp_identity_preserves_pixels() {
        let mut img = GrayImage::new(8, 8);
        img.set(3, 5, 200);
        let out = warp_gray(&img, &Affine2::identity()).expect("warp");
        assert_eq!(out.get(3, 5), 200);
        assert_eq!(out.get(0, 0), 0);
    }
}
