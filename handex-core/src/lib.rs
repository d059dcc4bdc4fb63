pub mod prediction;
pub mod trial;

pub use prediction::{
    two_hands_visible, Prediction, PredictionClass, PredictionError, RawPrediction, Region,
};
pub use trial::{FeedbackState, TrialOutcome, TrialRecord, TrialState};
