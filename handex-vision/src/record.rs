use std::path::Path;

use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, RgbaImage};
use tracing::{info, warn};

use crate::{Frame, VisionError};

/// Captures the raw camera stream into an in-memory blob, independent of
/// the detection overlay.
pub trait Recorder {
    fn start_recording(&mut self) -> Result<(), VisionError>;
    fn record_frame(&mut self, frame: &Frame);
    fn stop_recording(&mut self) -> Result<(), VisionError>;
    fn blob(&self) -> Option<&[u8]>;
    fn destroy(&mut self);
}

/// Reference recorder producing an animated GIF. The container format is
/// the recorder's own choice; callers only see a blob.
pub struct GifRecorder {
    frames: Vec<Frame>,
    recording: bool,
    blob: Option<Vec<u8>>,
    pub frame_delay_ms: u32,
}

impl GifRecorder {
    pub fn new() -> Self {
        Self {
            frames: Vec::new(),
            recording: false,
            blob: None,
            frame_delay_ms: 33,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    fn encode(&self) -> Result<Vec<u8>, VisionError> {
        let mut buf = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut buf);
            encoder.set_repeat(Repeat::Infinite)?;
            for frame in &self.frames {
                let (w, h) = frame.size;
                let Some(img) = RgbaImage::from_raw(w, h, frame.rgba.clone()) else {
                    warn!(frame = frame.id, "dropping malformed frame from capture");
                    continue;
                };
                let delay = Delay::from_numer_denom_ms(self.frame_delay_ms, 1);
                encoder.encode_frame(image::Frame::from_parts(img, 0, 0, delay))?;
            }
        }
        Ok(buf)
    }
}

impl Default for GifRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl Recorder for GifRecorder {
    fn start_recording(&mut self) -> Result<(), VisionError> {
        self.frames.clear();
        self.blob = None;
        self.recording = true;
        info!("recording started");
        Ok(())
    }

    fn record_frame(&mut self, frame: &Frame) {
        if !self.recording {
            return;
        }
        if !frame.is_well_formed() {
            warn!(frame = frame.id, "refusing to capture malformed frame");
            return;
        }
        self.frames.push(frame.clone());
    }

    fn stop_recording(&mut self) -> Result<(), VisionError> {
        self.recording = false;
        if self.frames.is_empty() {
            return Err(VisionError::Recorder("no frames captured".into()));
        }
        let blob = self.encode()?;
        info!(frames = self.frames.len(), bytes = blob.len(), "recording finalized");
        self.blob = Some(blob);
        self.frames.clear();
        Ok(())
    }

    fn blob(&self) -> Option<&[u8]> {
        self.blob.as_deref()
    }

    fn destroy(&mut self) {
        self.frames.clear();
        self.blob = None;
        self.recording = false;
    }
}

/// Save-as-file trigger for a finalized capture.
pub fn save_blob(blob: &[u8], path: &Path) -> Result<(), VisionError> {
    std::fs::write(path, blob)?;
    info!(path = %path.display(), bytes = blob.len(), "capture saved");
    Ok(())
}
