use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::{Frame, VisionError};

/// Live video source. `start` resolves to a success flag; a `false`
/// resolution means the camera was reachable but refused to stream.
pub trait VideoSource {
    fn start(&mut self) -> Result<bool, VisionError>;
    fn next_frame(&mut self) -> Result<Frame, VisionError>;
    fn stop(&mut self);
}

/// Procedural camera: a dark field with up to two bright blobs standing in
/// for hands. The blob count cycles so live feedback exercises both visual
/// states without hardware.
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    frame_count: u64,
    started: bool,
    rng: StdRng,
}

/// Frames per simulated gesture phase (~3s at display cadence).
const PHASE_FRAMES: u64 = 180;

impl SyntheticCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frame_count: 0,
            started: false,
            rng: StdRng::seed_from_u64(0x48414e_44),
        }
    }

    fn hands_in_phase(&self) -> usize {
        match (self.frame_count / PHASE_FRAMES) % 3 {
            0 => 2,
            1 => 1,
            _ => 2,
        }
    }

    fn paint_blob(&self, rgba: &mut [u8], cx: f32, cy: f32, radius: f32, level: u8) {
        let w = self.width as i32;
        let h = self.height as i32;
        let r2 = radius * radius;
        let x0 = ((cx - radius).floor() as i32).max(0);
        let x1 = ((cx + radius).ceil() as i32).min(w - 1);
        let y0 = ((cy - radius).floor() as i32).max(0);
        let y1 = ((cy + radius).ceil() as i32).min(h - 1);
        for y in y0..=y1 {
            for x in x0..=x1 {
                let dx = x as f32 - cx;
                let dy = y as f32 - cy;
                if dx * dx + dy * dy <= r2 {
                    let i = ((y * w + x) * 4) as usize;
                    rgba[i] = level;
                    rgba[i + 1] = level;
                    rgba[i + 2] = level;
                }
            }
        }
    }
}

impl VideoSource for SyntheticCamera {
    fn start(&mut self) -> Result<bool, VisionError> {
        self.started = true;
        self.frame_count = 0;
        info!(width = self.width, height = self.height, "synthetic camera started");
        Ok(true)
    }

    fn next_frame(&mut self) -> Result<Frame, VisionError> {
        if !self.started {
            return Err(VisionError::Camera("source not started".into()));
        }

        let (w, h) = (self.width, self.height);
        let mut rgba = vec![0u8; (w * h * 4) as usize];
        for px in rgba.chunks_exact_mut(4) {
            let base = 16 + self.rng.random_range(0..8) as u8;
            px[0] = base;
            px[1] = base;
            px[2] = base;
            px[3] = 255;
        }

        let hands = self.hands_in_phase();
        let radius = h as f32 * 0.3;
        let wobble = ((self.frame_count % 60) as f32 / 60.0 - 0.5) * h as f32 * 0.1;
        if hands >= 1 {
            self.paint_blob(&mut rgba, w as f32 * 0.25, h as f32 * 0.5 + wobble, radius, 235);
        }
        if hands >= 2 {
            self.paint_blob(&mut rgba, w as f32 * 0.75, h as f32 * 0.5 - wobble, radius, 235);
        }

        let frame = Frame::new(
            self.frame_count,
            self.frame_count as f64 / 60.0,
            rgba,
            (w, h),
        );
        self.frame_count += 1;
        Ok(frame)
    }

    fn stop(&mut self) {
        self.started = false;
        info!(frames = self.frame_count, "synthetic camera stopped");
    }
}

/// Single fixed frame, for the static-image analysis variant.
pub struct StillSource {
    frame: Frame,
    started: bool,
}

impl StillSource {
    pub fn new(frame: Frame) -> Self {
        Self {
            frame,
            started: false,
        }
    }
}

impl VideoSource for StillSource {
    fn start(&mut self) -> Result<bool, VisionError> {
        self.started = true;
        Ok(true)
    }

    fn next_frame(&mut self) -> Result<Frame, VisionError> {
        if !self.started {
            return Err(VisionError::Camera("source not started".into()));
        }
        Ok(self.frame.clone())
    }

    fn stop(&mut self) {
        self.started = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_well_formed_and_numbered() {
        let mut cam = SyntheticCamera::new(32, 16);
        assert!(cam.start().unwrap());
        let a = cam.next_frame().unwrap();
        let b = cam.next_frame().unwrap();
        assert!(a.is_well_formed());
        assert_eq!(a.id, 0);
        assert_eq!(b.id, 1);
        assert!(b.timestamp > a.timestamp);
    }

    #[test]
    fn unstarted_camera_refuses_frames() {
        let mut cam = SyntheticCamera::new(32, 16);
        assert!(cam.next_frame().is_err());
        cam.start().unwrap();
        cam.stop();
        assert!(cam.next_frame().is_err());
    }

    #[test]
    fn both_blobs_land_in_their_halves() {
        let mut cam = SyntheticCamera::new(64, 32);
        cam.start().unwrap();
        let frame = cam.next_frame().unwrap();
        // Phase 0 shows two hands; both halves must contain bright pixels.
        let w = 64usize;
        let bright_left = frame.rgba.chunks_exact(4).enumerate().any(|(i, px)| {
            (i % w) < w / 2 && px[0] > 200
        });
        let bright_right = frame.rgba.chunks_exact(4).enumerate().any(|(i, px)| {
            (i % w) >= w / 2 && px[0] > 200
        });
        assert!(bright_left && bright_right);
    }

    #[test]
    fn still_source_repeats_its_frame() {
        let frame = Frame::new(7, 1.0, vec![0u8; 4 * 4 * 4], (4, 4));
        let mut source = StillSource::new(frame);
        source.start().unwrap();
        assert_eq!(source.next_frame().unwrap().id, 7);
        assert_eq!(source.next_frame().unwrap().id, 7);
    }
}
