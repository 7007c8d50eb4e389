//! Small fixed-kernel filters and raster helpers.

use crate::image::GrayImage;

/// 5x5 median filter with replicated borders.
///
/// Used repeatedly on color masks to knock out speckle; the caller decides
/// the iteration count (scaled to image size).
pub fn median_blur(src: &GrayImage) -> GrayImage {
    let mut out = GrayImage::new(src.width, src.height);
    let mut window = [0u8; 25];
    for y in 0..src.height {
        for x in 0..src.width {
            let mut k = 0;
            for dy in -2i64..=2 {
                for dx in -2i64..=2 {
                    window[k] = src.get_clamped(x as i64 + dx, y as i64 + dy);
                    k += 1;
                }
            }
            window.sort_unstable();
            out.set(x, y, window[12]);
        }
    }
    out
}

/// Morphological erosion with a square all-ones kernel of odd size `ksize`,
/// replicated borders.
pub fn erode(src: &GrayImage, ksize: usize) -> GrayImage {
    let r = (ksize / 2) as i64;
    let mut out = GrayImage::new(src.width, src.height);
    for y in 0..src.height {
        for x in 0..src.width {
            let mut m = u8::MAX;
            for dy in -r..=r {
                for dx in -r..=r {
                    m = m.min(src.get_clamped(x as i64 + dx, y as i64 + dy));
                }
            }
            out.set(x, y, m);
        }
    }
    out
}

/// Fixed-threshold Sobel edge operator.
///
/// Marks a pixel 255 where the gradient magnitude exceeds `threshold`.
pub fn sobel_edges(src: &GrayImage, threshold: f64) -> GrayImage {
    let mut out = GrayImage::new(src.width, src.height);
    for y in 0..src.height {
        for x in 0..src.width {
            let p = |dx: i64, dy: i64| src.get_clamped(x as i64 + dx, y as i64 + dy) as f64;
            let gx = (p(1, -1) + 2.0 * p(1, 0) + p(1, 1)) - (p(-1, -1) + 2.0 * p(-1, 0) + p(-1, 1));
            let gy = (p(-1, 1) + 2.0 * p(0, 1) + p(1, 1)) - (p(-1, -1) + 2.0 * p(0, -1) + p(1, -1));
            if (gx * gx + gy * gy).sqrt() > threshold {
                out.set(x, y, 255);
            }
        }
    }
    out
}

/// Bresenham line raster; out-of-frame pixels are clipped silently.
pub fn draw_line(img: &mut GrayImage, p0: (i64, i64), p1: (i64, i64), value: u8) {
    let (mut x, mut y) = p0;
    let (x1, y1) = p1;
    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        if x >= 0 && y >= 0 && (x as usize) < img.width && (y as usize) < img.height {
            img.set(x as usize, y as usize, value);
        }
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Filled disk raster, clipped to the frame.
pub fn draw_disk(img: &mut GrayImage, center: (i64, i64), radius: i64, value: u8) {
    let (cx, cy) = center;
    for y in (cy - radius).max(0)..=(cy + radius).min(img.height as i64 - 1) {
        for x in (cx - radius).max(0)..=(cx + radius).min(img.width as i64 - 1) {
            let (dx, dy) = (x - cx, y - cy);
            if dx * dx + dy * dy <= radius * radius {
                img.set(x as usize, y as usize, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn median_blur_removes_single_speck() {
        let mut img = GrayImage::new(9, 9);
        img.set(4, 4, 255);
        let out = median_blur(&img);
        assert_eq!(out.max_value(), 0);
    }

    #[test]
    fn erode_shrinks_a_block() {
        let mut img = GrayImage::new(9, 9);
        for y in 2..7 {
            for x in 2..7 {
                img.set(x, y, 255);
            }
        }
        let out = erode(&img, 3);
        assert_eq!(out.get(4, 4), 255);
        assert_eq!(out.get(2, 2), 0);
    }

    #[test]
    fn sobel_marks_a_step_edge() {
        let mut img = GrayImage::new(10, 10);
        for y in 0..10 {
            for x in 5..10 {
                img.set(x, y, 200);
            }
        }
        let edges = sobel_edges(&img, 100.0);
        assert!(edges.get(5, 5) != 0 || edges.get(4, 5) != 0);
        assert_eq!(edges.get(8, 5), 0);
    }

    #[test]
    fn draw_disk_fills_and_clips() {
        let mut img = GrayImage::new(10, 10);
        draw_disk(&mut img, (0, 0), 3, 1);
        assert_eq!(img.get(0, 0), 1);
        assert_eq!(img.get(3, 0), 1);
        assert_eq!(img.get(3, 3), 0);
    }

    #[test]
    fn draw_line_clips_outside_frame() {
        let mut img = GrayImage::new(5, 5);
        draw_line(&mut img, (-3, 2), (8, 2), 255);
        assert!(img.data.iter().filter(|&&v| v != 0).count() == 5);
    }
}
