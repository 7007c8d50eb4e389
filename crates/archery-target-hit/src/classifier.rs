//! k-nearest-neighbor change classifier over difference-frame features.
//!
//! A difference frame is summarized by `(std_dev, max_diff)` and classified
//! against the labeled dataset with a 3-NN majority vote. A hit is the
//! transition where the older frame pair is still stable and the newer pair
//! shows change.

use archery_target_core::GrayImage;
use log::debug;

use crate::dataset::{DatasetError, HitDataset};

const K: usize = 3;

/// Fitted 3-NN classifier.
#[derive(Clone, Debug)]
pub struct HitClassifier {
    samples: Vec<([f64; 2], bool)>,
}

/// Summary features of a difference frame.
pub fn diff_features(diff: &GrayImage) -> [f64; 2] {
    [diff.std_dev(), diff.max_value() as f64]
}

impl HitClassifier {
    /// Index the dataset. Fails on an empty dataset; with fewer than `K`
    /// examples the vote simply runs over what is there.
    pub fn fit(dataset: &HitDataset) -> Result<Self, DatasetError> {
        if dataset.is_empty() {
            return Err(DatasetError::Empty);
        }
        let samples = dataset
            .examples
            .iter()
            .map(|e| ([e.std_dev, e.max_diff], e.hit))
            .collect();
        Ok(Self { samples })
    }

    /// Majority vote among the 3 nearest neighbors in feature space.
    pub fn predict(&self, features: [f64; 2]) -> bool {
        let mut dist: Vec<(f64, bool)> = self
            .samples
            .iter()
            .map(|&(s, label)| {
                let dx = s[0] - features[0];
                let dy = s[1] - features[1];
                (dx * dx + dy * dy, label)
            })
            .collect();
        dist.sort_by(|a, b| a.0.total_cmp(&b.0));

        let k = K.min(dist.len());
        let positive = dist[..k].iter().filter(|&&(_, label)| label).count();
        positive * 2 > k
    }

    /// Classify a difference frame directly.
    pub fn classify(&self, diff: &GrayImage) -> bool {
        let features = diff_features(diff);
        let changed = self.predict(features);
        debug!(
            "diff features std={:.2} max={:.0} -> {}",
            features[0],
            features[1],
            if changed { "change" } else { "stable" }
        );
        changed
    }

    /// Hit transition: the older pair of consecutive frames was stable and
    /// the newer pair shows change, i.e. the arrow arrived between the two
    /// most recent frames.
    pub fn detect_hit(&self, older_diff: &GrayImage, newer_diff: &GrayImage) -> bool {
        !self.classify(older_diff) && self.classify(newer_diff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_dataset() -> HitDataset {
        let mut ds = HitDataset::default();
        // Stable frames: tiny spread and peak.
        for v in [0u8, 1, 2] {
            ds.append(&GrayImage::filled(8, 8, 0), false);
            let mut d = GrayImage::new(8, 8);
            d.set(0, 0, v * 5);
            ds.append(&d, false);
        }
        // Change frames: strong peaks over much of the frame.
        for v in [200u8, 230, 255] {
            let mut d = GrayImage::new(8, 8);
            for x in 0..8 {
                d.set(x, 3, v);
            }
            ds.append(&d, true);
        }
        ds
    }

    #[test]
    fn fit_rejects_empty_dataset() {
        assert!(matches!(
            HitClassifier::fit(&HitDataset::default()),
            Err(DatasetError::Empty)
        ));
    }

    #[test]
    fn predicts_by_nearest_neighbors() {
        let clf = HitClassifier::fit(&toy_dataset()).expect("fit");
        assert!(!clf.predict([0.5, 3.0]));
        assert!(clf.predict([75.0, 240.0]));
    }

    #[test]
    fn hit_requires_the_stable_to_change_transition() {
        let clf = HitClassifier::fit(&toy_dataset()).expect("fit");

        let stable = GrayImage::new(8, 8);
        let mut changed = GrayImage::new(8, 8);
        for x in 0..8 {
            changed.set(x, 4, 220);
        }

        assert!(clf.detect_hit(&stable, &changed));
        // Still shaking, or already settled: no hit either way.
        assert!(!clf.detect_hit(&changed, &changed));
        assert!(!clf.detect_hit(&changed, &stable));
        assert!(!clf.detect_hit(&stable, &stable));
    }
}
