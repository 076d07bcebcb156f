use serde::{Deserialize, Serialize};
use zftrack_common::BackgroundModelCfg;

use crate::tracking::frame_detector::DetectorCfg;
use crate::tracking::point::ScoreWeights;
use crate::tracking::segmenter::TrackSegmenter;
use crate::{Error, TrackResult};

/// The kind of video being tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    /// Pre-segmented videos of larvae: the larva is already bright on a black background.
    Larva,
    /// Raw videos of adult fish in a tank, separated from the scene by background
    /// subtraction.
    Adult,
}

/// Everything that controls how a single video is tracked and segmented.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingCfg {
    pub weights: ScoreWeights,
    pub detector: DetectorCfg,
    pub segmenter: TrackSegmenter,
    /// When set, frames are replaced by a background subtraction mask before thresholding.
    pub background: Option<BackgroundModelCfg>,
}

impl Default for TrackingCfg {
    fn default() -> Self {
        Self::larva()
    }
}

impl TrackingCfg {
    pub fn larva() -> Self {
        Self {
            weights: ScoreWeights::larva(),
            detector: DetectorCfg::larva(),
            segmenter: TrackSegmenter::default(),
            background: None,
        }
    }

    pub fn adult() -> Self {
        Self {
            weights: ScoreWeights::adult(),
            detector: DetectorCfg::adult(),
            segmenter: TrackSegmenter::default(),
            background: Some(BackgroundModelCfg::default()),
        }
    }

    pub fn for_mode(mode: TrackingMode) -> Self {
        match mode {
            TrackingMode::Larva => Self::larva(),
            TrackingMode::Adult => Self::adult(),
        }
    }

    pub fn validate(&self) -> TrackResult<()> {
        self.detector.validate()?;

        if self.segmenter.min_track_length == 0 {
            return Err(Error::InvalidConfig(
                "minimum track length must be at least 1".to_string(),
            ));
        }

        let weights = [
            self.weights.normative_area,
            self.weights.area_weight,
            self.weights.distance_weight,
        ];
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "score weights must be finite: {:?}",
                self.weights
            )));
        }

        Ok(())
    }

    pub fn apply(&mut self, overrides: &TrackingOverrides) {
        let TrackingOverrides {
            normative_area,
            area_weight,
            distance_weight,
            threshold_low,
            threshold_high,
            morphology_iterations,
            max_frame_gap,
            min_track_length,
        } = *overrides;

        if let Some(v) = normative_area {
            self.weights.normative_area = v;
        }
        if let Some(v) = area_weight {
            self.weights.area_weight = v;
        }
        if let Some(v) = distance_weight {
            self.weights.distance_weight = v;
        }
        if let Some(v) = threshold_low {
            self.detector.threshold_low = v;
        }
        if let Some(v) = threshold_high {
            self.detector.threshold_high = v;
        }
        if let Some(v) = morphology_iterations {
            self.detector.morphology.iterations = v;
        }
        if let Some(v) = max_frame_gap {
            self.segmenter.max_gap = v;
        }
        if let Some(v) = min_track_length {
            self.segmenter.min_track_length = v;
        }
    }
}

/// Individual settings to change on top of a preset. Unset fields keep the preset value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrackingOverrides {
    pub normative_area: Option<f64>,
    pub area_weight: Option<f64>,
    pub distance_weight: Option<f64>,
    pub threshold_low: Option<u8>,
    pub threshold_high: Option<u16>,
    pub morphology_iterations: Option<u8>,
    pub max_frame_gap: Option<u64>,
    pub min_track_length: Option<usize>,
}

impl TrackingOverrides {
    /// Fields set in `other` replace fields set in `self`.
    pub fn merge(&mut self, other: &Self) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field;
                })*
            };
        }

        take!(
            normative_area,
            area_weight,
            distance_weight,
            threshold_low,
            threshold_high,
            morphology_iterations,
            max_frame_gap,
            min_track_length
        );
    }
}
