use serde::{Deserialize, Serialize};

use crate::VisionError;

/// One frame of RGBA8 image data pulled from a video source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub id: u64,
    /// Capture timestamp (seconds since the source started).
    pub timestamp: f64,
    pub rgba: Vec<u8>,
    /// Image dimensions (width, height).
    pub size: (u32, u32),
}

impl Frame {
    pub fn new(id: u64, timestamp: f64, rgba: Vec<u8>, size: (u32, u32)) -> Self {
        Self {
            id,
            timestamp,
            rgba,
            size,
        }
    }

    /// Decode an encoded still image (PNG, JPEG, ...) into a frame.
    pub fn decode(bytes: &[u8]) -> Result<Self, VisionError> {
        let img = image::load_from_memory(bytes)?.into_rgba8();
        let (width, height) = img.dimensions();
        Ok(Self {
            id: 0,
            timestamp: 0.0,
            rgba: img.into_raw(),
            size: (width, height),
        })
    }

    pub fn expected_len(&self) -> usize {
        (self.size.0 * self.size.1 * 4) as usize
    }

    pub fn is_well_formed(&self) -> bool {
        self.rgba.len() == self.expected_len()
    }
}
