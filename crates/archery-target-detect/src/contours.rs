//! Contour extraction from binary color masks.
//!
//! Masks are smoothed, run through the fixed-threshold edge operator and
//! split into 8-connected point sequences. Hierarchy is ignored: every
//! sequence holds the outer boundary pixels of one edge component, in
//! deterministic scan order.

use archery_target_core::{median_blur, sobel_edges, GrayImage};
use nalgebra::Point2;

/// One traced contour: boundary pixel coordinates of a single component.
pub type Contour = Vec<Point2<f64>>;

/// Paired per-channel contour lists, padded with `None` to equal length so
/// downstream stages can iterate them pairwise.
#[derive(Clone, Debug, Default)]
pub struct ContourSet {
    pub red: Vec<Option<Contour>>,
    pub blue: Vec<Option<Contour>>,
}

const EDGE_THRESHOLD: f64 = 100.0;

/// Trace contours of a binary edge image.
///
/// Components are discovered in scan order; within a component only boundary
/// pixels (those with an empty 4-neighbor) are kept, which on thin edge maps
/// is every pixel.
pub fn trace_contours(edges: &GrayImage) -> Vec<Contour> {
    let (w, h) = (edges.width as i64, edges.height as i64);
    let mut visited = vec![false; edges.data.len()];
    let mut contours = Vec::new();

    let idx = |x: i64, y: i64| (y * w + x) as usize;
    let on = |x: i64, y: i64| x >= 0 && y >= 0 && x < w && y < h && edges.get_clamped(x, y) != 0;

    for y in 0..h {
        for x in 0..w {
            if !on(x, y) || visited[idx(x, y)] {
                continue;
            }
            // Flood one 8-connected component.
            let mut stack = vec![(x, y)];
            visited[idx(x, y)] = true;
            let mut component = Vec::new();
            while let Some((px, py)) = stack.pop() {
                component.push((px, py));
                for dy in -1..=1 {
                    for dx in -1..=1 {
                        let (nx, ny) = (px + dx, py + dy);
                        if on(nx, ny) && !visited[idx(nx, ny)] {
                            visited[idx(nx, ny)] = true;
                            stack.push((nx, ny));
                        }
                    }
                }
            }
            component.sort_unstable_by_key(|&(px, py)| (py, px));
            let contour: Contour = component
                .into_iter()
                .filter(|&(px, py)| {
                    !(on(px - 1, py) && on(px + 1, py) && on(px, py - 1) && on(px, py + 1))
                })
                .map(|(px, py)| Point2::new(px as f64, py as f64))
                .collect();
            if !contour.is_empty() {
                contours.push(contour);
            }
        }
    }
    contours
}

/// Extract paired contour lists from the red and blue color masks.
///
/// Returns `None` when either channel yields no contour at all, in which
/// case target detection is impossible for this frame.
pub fn extract_contours(red_mask: &GrayImage, blue_mask: &GrayImage) -> Option<ContourSet> {
    let iterations = red_mask.width.max(red_mask.height) / 100;
    let mut red = red_mask.clone();
    let mut blue = blue_mask.clone();
    for _ in 0..iterations {
        red = median_blur(&red);
        blue = median_blur(&blue);
    }

    let red_contours = trace_contours(&sobel_edges(&red, EDGE_THRESHOLD));
    let blue_contours = trace_contours(&sobel_edges(&blue, EDGE_THRESHOLD));

    if red_contours.is_empty() || blue_contours.is_empty() {
        return None;
    }

    let mut set = ContourSet {
        red: red_contours.into_iter().map(Some).collect(),
        blue: blue_contours.into_iter().map(Some).collect(),
    };
    let len = set.red.len().max(set.blue.len());
    set.red.resize(len, None);
    set.blue.resize(len, None);
    Some(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect_outline(w: usize, h: usize, x0: usize, y0: usize, x1: usize, y1: usize) -> GrayImage {
        let mut img = GrayImage::new(w, h);
        for x in x0..=x1 {
            img.set(x, y0, 255);
            img.set(x, y1, 255);
        }
        for y in y0..=y1 {
            img.set(x0, y, 255);
            img.set(x1, y, 255);
        }
        img
    }

    #[test]
    fn separate_components_become_separate_contours() {
        let mut img = rect_outline(40, 40, 2, 2, 10, 10);
        let other = rect_outline(40, 40, 20, 20, 30, 30);
        for (dst, &src) in img.data.iter_mut().zip(&other.data) {
            *dst |= src;
        }
        let contours = trace_contours(&img);
        assert_eq!(contours.len(), 2);
    }

    #[test]
    fn contour_covers_the_outline() {
        let img = rect_outline(20, 20, 3, 3, 12, 12);
        let contours = trace_contours(&img);
        assert_eq!(contours.len(), 1);
        // 4 sides of length 10 minus shared corners.
        assert_eq!(contours[0].len(), 36);
    }

    #[test]
    fn tracing_is_deterministic() {
        let img = rect_outline(24, 24, 1, 1, 20, 20);
        assert_eq!(trace_contours(&img), trace_contours(&img));
    }

    #[test]
    fn empty_channel_fails_extraction() {
        let empty = GrayImage::new(64, 64);
        let mut red = GrayImage::new(64, 64);
        for x in 20..40 {
            for y in 20..40 {
                red.set(x, y, 255);
            }
        }
        assert!(extract_contours(&red, &empty).is_none());
    }

    #[test]
    fn lists_are_padded_to_equal_length() {
        let mut red = GrayImage::new(64, 64);
        for (x0, y0) in [(4usize, 4usize), (40, 40)] {
            for x in x0..x0 + 10 {
                for y in y0..y0 + 10 {
                    red.set(x, y, 255);
                }
            }
        }
        let mut blue = GrayImage::new(64, 64);
        for x in 20..34 {
            for y in 20..34 {
                blue.set(x, y, 255);
            }
        }
        let set = extract_contours(&red, &blue).expect("contours");
        assert_eq!(set.red.len(), set.blue.len());
        assert!(set.blue.iter().any(|c| c.is_none()));
    }
}
