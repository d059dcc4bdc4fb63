use handex_vision::VisionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrialError {
    #[error("vision provider error: {0}")]
    Vision(#[from] VisionError),

    #[error("trial type not implemented: {0}")]
    UnknownTrialType(String),
}
