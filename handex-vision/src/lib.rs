pub mod detect;
pub mod error;
pub mod frame;
pub mod record;
pub mod source;

pub use detect::{render_overlay, Detector, DetectorLoader, LumaDetector, LumaDetectorLoader};
pub use error::VisionError;
pub use frame::Frame;
pub use record::{save_blob, GifRecorder, Recorder};
pub use source::{SyntheticCamera, StillSource, VideoSource};
