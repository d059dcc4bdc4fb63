use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Class labels a detector may attach to a prediction.
///
/// Raw ids are fixed by the model's label order; `Face` is the
/// no-hand sentinel and never counts toward hand visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionClass {
    OpenHand,
    ClosedHand,
    PinchHand,
    PointHand,
    Face,
    PointTip,
    PinchTip,
}

impl PredictionClass {
    pub fn from_raw(raw: u32) -> Result<Self, PredictionError> {
        match raw {
            1 => Ok(Self::OpenHand),
            2 => Ok(Self::ClosedHand),
            3 => Ok(Self::PinchHand),
            4 => Ok(Self::PointHand),
            5 => Ok(Self::Face),
            6 => Ok(Self::PointTip),
            7 => Ok(Self::PinchTip),
            other => Err(PredictionError::UnknownClass(other)),
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            Self::OpenHand => 1,
            Self::ClosedHand => 2,
            Self::PinchHand => 3,
            Self::PointHand => 4,
            Self::Face => 5,
            Self::PointTip => 6,
            Self::PinchTip => 7,
        }
    }

    /// True for every class except the sentinel.
    pub fn is_hand(self) -> bool {
        !matches!(self, Self::Face)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::OpenHand => "open",
            Self::ClosedHand => "closed",
            Self::PinchHand => "pinch",
            Self::PointHand => "point",
            Self::Face => "face",
            Self::PointTip => "pointtip",
            Self::PinchTip => "pinchtip",
        }
    }
}

/// Bounding region in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Region {
    fn validate(self) -> Result<Self, PredictionError> {
        let finite = [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite());
        if !finite || self.width < 0.0 || self.height < 0.0 {
            return Err(PredictionError::InvalidRegion {
                x: self.x,
                y: self.y,
                width: self.width,
                height: self.height,
            });
        }
        Ok(self)
    }
}

/// Untyped prediction as produced by a detector, before boundary validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawPrediction {
    pub class: u32,
    pub score: f32,
    pub region: Option<Region>,
}

/// Validated prediction with an enumerated class label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub class: PredictionClass,
    pub score: f32,
    pub region: Option<Region>,
}

impl TryFrom<RawPrediction> for Prediction {
    type Error = PredictionError;

    fn try_from(raw: RawPrediction) -> Result<Self, PredictionError> {
        let class = PredictionClass::from_raw(raw.class)?;
        if !raw.score.is_finite() || !(0.0..=1.0).contains(&raw.score) {
            return Err(PredictionError::InvalidScore(raw.score));
        }
        let region = raw.region.map(Region::validate).transpose()?;
        Ok(Prediction {
            class,
            score: raw.score,
            region,
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PredictionError {
    #[error("unknown prediction class id {0}")]
    UnknownClass(u32),

    #[error("prediction score {0} outside 0.0..=1.0")]
    InvalidScore(f32),

    #[error("invalid bounding region ({x}, {y}) {width}x{height}")]
    InvalidRegion {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    },
}

/// True iff more than one prediction carries a non-sentinel class.
///
/// Recomputed per frame; no smoothing across frames.
pub fn two_hands_visible(predictions: &[Prediction]) -> bool {
    predictions.iter().filter(|p| p.class.is_hand()).count() >= 2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pred(raw_class: u32) -> Prediction {
        Prediction::try_from(RawPrediction {
            class: raw_class,
            score: 0.9,
            region: None,
        })
        .unwrap()
    }

    #[test]
    fn two_hands_when_two_non_sentinel_entries() {
        // open, face (sentinel), open
        assert!(two_hands_visible(&[pred(1), pred(5), pred(1)]));
    }

    #[test]
    fn one_hand_is_not_enough() {
        assert!(!two_hands_visible(&[pred(1), pred(5)]));
    }

    #[test]
    fn empty_predictions_mean_no_hands() {
        assert!(!two_hands_visible(&[]));
    }

    #[test]
    fn sentinel_only_means_no_hands() {
        assert!(!two_hands_visible(&[pred(5), pred(5), pred(5)]));
    }

    #[test]
    fn mixed_hand_classes_count_together() {
        assert!(two_hands_visible(&[pred(2), pred(4)]));
    }

    #[test]
    fn unknown_class_rejected_at_boundary() {
        let err = Prediction::try_from(RawPrediction {
            class: 0,
            score: 0.5,
            region: None,
        })
        .unwrap_err();
        assert_eq!(err, PredictionError::UnknownClass(0));
    }

    #[test]
    fn out_of_range_score_rejected() {
        let err = Prediction::try_from(RawPrediction {
            class: 1,
            score: 1.5,
            region: None,
        })
        .unwrap_err();
        assert!(matches!(err, PredictionError::InvalidScore(_)));
    }

    #[test]
    fn nan_score_rejected() {
        let err = Prediction::try_from(RawPrediction {
            class: 1,
            score: f32::NAN,
            region: None,
        })
        .unwrap_err();
        assert!(matches!(err, PredictionError::InvalidScore(_)));
    }

    #[test]
    fn negative_region_rejected() {
        let err = Prediction::try_from(RawPrediction {
            class: 1,
            score: 0.5,
            region: Some(Region {
                x: 0.0,
                y: 0.0,
                width: -4.0,
                height: 10.0,
            }),
        })
        .unwrap_err();
        assert!(matches!(err, PredictionError::InvalidRegion { .. }));
    }

    #[test]
    fn raw_ids_round_trip() {
        for raw in 1..=7 {
            assert_eq!(PredictionClass::from_raw(raw).unwrap().raw(), raw);
        }
    }
}
