//! Labeled difference-frame dataset, persisted as JSON.
//!
//! Every example stores the summary features the classifier consumes plus
//! the full intensity histogram of the difference frame, so feature
//! engineering can be redone offline without the original footage.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use archery_target_core::GrayImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("dataset io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("dataset is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("dataset holds no examples")]
    Empty,
}

/// One labeled difference frame.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HitExample {
    /// Population standard deviation of the difference frame.
    pub std_dev: f64,
    /// Maximum pixel difference.
    pub max_diff: f64,
    /// Pixels above the mean difference.
    pub changed_pixels: u64,
    /// 256-bucket intensity histogram of the difference frame.
    pub histogram: Vec<u32>,
    /// Whether this difference frame contains an arriving arrow.
    pub hit: bool,
}

impl HitExample {
    /// Measure a difference frame.
    pub fn from_diff(diff: &GrayImage, hit: bool) -> Self {
        Self {
            std_dev: diff.std_dev(),
            max_diff: diff.max_value() as f64,
            changed_pixels: diff.count_above(diff.mean()),
            histogram: diff.histogram().to_vec(),
            hit,
        }
    }
}

/// Collection of labeled examples.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HitDataset {
    pub examples: Vec<HitExample>,
}

impl HitDataset {
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn save(&self, path: &Path) -> Result<(), DatasetError> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Measure a difference frame and record it.
    pub fn append(&mut self, diff: &GrayImage, hit: bool) {
        self.examples.push(HitExample::from_diff(diff, hit));
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }
}
