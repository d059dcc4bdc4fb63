use handex_core::PredictionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VisionError {
    #[error("model load failed: {0}")]
    ModelLoad(String),

    #[error("camera unavailable: {0}")]
    Camera(String),

    #[error("camera access denied")]
    CameraDenied,

    #[error("detection failed: {0}")]
    Detection(String),

    #[error("recorder failed: {0}")]
    Recorder(String),

    #[error("invalid prediction: {0}")]
    Prediction(#[from] PredictionError),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
