//! Ring-layout calibration tables.
//!
//! Each supported target layout defines, per estimated ring placement, the
//! canonical blue/red axis ratio and the weights used to synthesize the
//! final target axes from the winning red/blue pair. The constants encode
//! empirically tuned ring proportions and are looked up, never re-derived.

use serde::{Deserialize, Serialize};

/// Supported target layouts (which score rings are printed on the face).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// Full face, rings 1-10.
    Regular1To10,
    /// Compact face, rings 5-10.
    Regular5To10,
    /// Compact face, rings 6-10.
    Regular6To10,
}

/// Which detected ring is estimated to lie inside which: `In`/`Out` name the
/// inner and outer edge of the respective ring family.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum RingPlacement {
    InRedInBlue,
    InRedOutBlue,
    OutRedInBlue,
    OutRedOutBlue,
}

/// One calibration row: the placement hypothesis with its canonical axis
/// ratio and synthesis weights.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlacementCalib {
    pub placement: RingPlacement,
    /// Canonical blue/red mean axis ratio selecting this placement.
    pub match_ratio: f64,
    /// Reference value whose deviation enters the axis-ratio score. Differs
    /// from `match_ratio` only for the 6-10 layout.
    pub score_ratio: f64,
    /// Weight on the red axes in the synthesized target.
    pub red_weight: f64,
    /// Weight on the blue axes in the synthesized target.
    pub blue_weight: f64,
}

/// Calibration table of the four placement hypotheses for one layout.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RingCalibration {
    pub rows: [PlacementCalib; 4],
}

impl RingCalibration {
    /// Calibration constants for the given layout.
    pub fn for_kind(kind: TargetKind) -> Self {
        use RingPlacement::*;
        let rows = match kind {
            TargetKind::Regular1To10 => [
                row(OutRedInBlue, 1.0, 1.0, 2.5, 2.5),
                row(OutRedOutBlue, 1.5, 1.5, 2.5, 5.0 / 3.0),
                row(InRedInBlue, 2.0, 2.0, 5.0, 2.5),
                row(InRedOutBlue, 3.0, 3.0, 5.0, 5.0 / 3.0),
            ],
            TargetKind::Regular5To10 => [
                row(OutRedInBlue, 1.0, 1.0, 1.5, 1.5),
                row(OutRedOutBlue, 1.5, 1.5, 1.5, 1.0),
                row(InRedInBlue, 2.0, 2.0, 3.0, 1.5),
                row(InRedOutBlue, 3.0, 3.0, 3.0, 1.0),
            ],
            TargetKind::Regular6To10 => [
                row(OutRedInBlue, 1.0, 1.0, 1.25, 1.25),
                row(OutRedOutBlue, 1.5, 1.2, 1.25, 1.0),
                row(InRedInBlue, 2.0, 2.0, 2.5, 1.25),
                row(InRedOutBlue, 3.0, 2.5, 2.5, 1.0),
            ],
        };
        Self { rows }
    }

    /// Row whose `match_ratio` is closest to the observed blue/red mean axis
    /// ratio. Ties keep the earlier row, matching the table order.
    pub fn nearest(&self, ratio: f64) -> &PlacementCalib {
        let mut best = &self.rows[0];
        for r in &self.rows[1..] {
            if (ratio - r.match_ratio).abs() < (ratio - best.match_ratio).abs() {
                best = r;
            }
        }
        best
    }

    /// Synthesis weights for a placement. Every table carries all four
    /// placements, so the lookup always hits a row.
    pub fn weights(&self, placement: RingPlacement) -> (f64, f64) {
        for r in &self.rows {
            if r.placement == placement {
                return (r.red_weight, r.blue_weight);
            }
        }
        (self.rows[0].red_weight, self.rows[0].blue_weight)
    }
}

fn row(
    placement: RingPlacement,
    match_ratio: f64,
    score_ratio: f64,
    red_weight: f64,
    blue_weight: f64,
) -> PlacementCalib {
    PlacementCalib {
        placement,
        match_ratio,
        score_ratio,
        red_weight,
        blue_weight,
    }
}
