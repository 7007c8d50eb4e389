//! Owned image containers.
//!
//! Images are row-major with `(x, y)` pixel coordinates, x to the right and
//! y down. `GrayImage` doubles as a binary mask holder (0 / nonzero).

/// Single-channel 8-bit image, row-major, `data.len() == width * height`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

/// Three-channel 8-bit image, row-major RGB interleaved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RgbImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height],
        }
    }

    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }

    /// Border-replicating accessor for filter kernels.
    #[inline]
    pub fn get_clamped(&self, x: i64, y: i64) -> u8 {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: u8) {
        self.data[y * self.width + x] = value;
    }

    /// Rectangular sub-image `[left, right) x [top, bottom)`.
    pub fn crop(&self, top: usize, bottom: usize, left: usize, right: usize) -> GrayImage {
        let w = right.saturating_sub(left);
        let h = bottom.saturating_sub(top);
        let mut out = GrayImage::new(w, h);
        for y in 0..h {
            let src = (top + y) * self.width + left;
            out.data[y * w..(y + 1) * w].copy_from_slice(&self.data[src..src + w]);
        }
        out
    }

    /// Zero out pixels where the mask is zero.
    pub fn masked(&self, mask: &GrayImage) -> GrayImage {
        debug_assert_eq!(self.data.len(), mask.data.len());
        let data = self
            .data
            .iter()
            .zip(&mask.data)
            .map(|(&v, &m)| if m != 0 { v } else { 0 })
            .collect();
        GrayImage {
            width: self.width,
            height: self.height,
            data,
        }
    }

    pub fn max_value(&self) -> u8 {
        self.data.iter().copied().max().unwrap_or(0)
    }

    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|&v| v as f64).sum::<f64>() / self.data.len() as f64
    }

    /// Population standard deviation over all pixels.
    pub fn std_dev(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let var = self
            .data
            .iter()
            .map(|&v| {
                let d = v as f64 - mean;
                d * d
            })
            .sum::<f64>()
            / self.data.len() as f64;
        var.sqrt()
    }

    /// 256-bucket intensity histogram.
    pub fn histogram(&self) -> [u32; 256] {
        let mut hist = [0u32; 256];
        for &v in &self.data {
            hist[v as usize] += 1;
        }
        hist
    }

    /// Count of pixels strictly above `level`.
    pub fn count_above(&self, level: f64) -> u64 {
        self.data.iter().filter(|&&v| v as f64 > level).count() as u64
    }
}

impl RgbImage {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width * height * 3],
        }
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.width + x) * 3;
        [self.data[i], self.data[i + 1], self.data[i + 2]]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, rgb: [u8; 3]) {
        let i = (y * self.width + x) * 3;
        self.data[i..i + 3].copy_from_slice(&rgb);
    }

    /// Luma conversion (ITU-R BT.601 weights).
    pub fn to_gray(&self) -> GrayImage {
        let mut out = GrayImage::new(self.width, self.height);
        for (dst, px) in out.data.iter_mut().zip(self.data.chunks_exact(3)) {
            let v = 0.299 * px[0] as f64 + 0.587 * px[1] as f64 + 0.114 * px[2] as f64;
            *dst = v.round().clamp(0.0, 255.0) as u8;
        }
        out
    }

    pub fn crop(&self, top: usize, bottom: usize, left: usize, right: usize) -> RgbImage {
        let w = right.saturating_sub(left);
        let h = bottom.saturating_sub(top);
        let mut out = RgbImage::new(w, h);
        for y in 0..h {
            let src = ((top + y) * self.width + left) * 3;
            out.data[y * w * 3..(y + 1) * w * 3].copy_from_slice(&self.data[src..src + w * 3]);
        }
        out
    }

    /// Zero out pixels where the mask is zero.
    pub fn masked(&self, mask: &GrayImage) -> RgbImage {
        debug_assert_eq!(self.width, mask.width);
        debug_assert_eq!(self.height, mask.height);
        let mut out = self.clone();
        for (px, &m) in out.data.chunks_exact_mut(3).zip(&mask.data) {
            if m == 0 {
                px.fill(0);
            }
        }
        out
    }
}

/// Absolute pixel-wise difference of two equally sized images.
pub fn abs_diff(a: &GrayImage, b: &GrayImage) -> GrayImage {
    debug_assert_eq!(a.width, b.width);
    debug_assert_eq!(a.height, b.height);
    let data = a
        .data
        .iter()
        .zip(&b.data)
        .map(|(&x, &y)| x.abs_diff(y))
        .collect();
    GrayImage {
        width: a.width,
        height: a.height,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn crop_extracts_expected_window() {
        let mut img = GrayImage::new(4, 4);
        for y in 0..4 {
            for x in 0..4 {
                img.set(x, y, (y * 4 + x) as u8);
            }
        }
        let sub = img.crop(1, 3, 2, 4);
        assert_eq!((sub.width, sub.height), (2, 2));
        assert_eq!(sub.data, vec![6, 7, 10, 11]);
    }

    #[test]
    fn diff_stats_on_constant_images_are_zero() {
        let a = GrayImage::filled(8, 8, 40);
        let b = GrayImage::filled(8, 8, 40);
        let d = abs_diff(&a, &b);
        assert_eq!(d.max_value(), 0);
        assert_relative_eq!(d.std_dev(), 0.0);
    }

    #[test]
    fn masked_zeroes_outside_mask() {
        let img = GrayImage::filled(2, 2, 9);
        let mut mask = GrayImage::new(2, 2);
        mask.set(1, 1, 1);
        let out = img.masked(&mask);
        assert_eq!(out.data, vec![0, 0, 0, 9]);
    }

    #[test]
    fn histogram_counts_every_pixel() {
        let img = GrayImage::filled(3, 3, 7);
        let hist = img.histogram();
        assert_eq!(hist[7], 9);
        assert_eq!(hist.iter().sum::<u32>(), 9);
    }
}
