use handex_core::{Prediction, RawPrediction, Region};
use tiny_skia::{Color, Paint, PathBuilder, Pixmap, Stroke, Transform};
use tracing::debug;

use crate::{Frame, VisionError};

/// Produces a model handle. One load attempt per call; the trial
/// controller makes exactly one.
pub trait DetectorLoader {
    type Detector: Detector;
    fn load(&mut self) -> Result<Self::Detector, VisionError>;
}

/// Runs inference on a frame and owns the overlay drawing for its own
/// predictions.
pub trait Detector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawPrediction>, VisionError>;

    /// Redraws `frame` onto `canvas` and draws region boxes on top.
    fn render_predictions(&self, predictions: &[Prediction], frame: &Frame, canvas: &mut Pixmap) {
        render_overlay(predictions, frame, canvas);
    }

    /// Releases model resources. Called once at teardown.
    fn dispose(&mut self) {}
}

/// Shared overlay routine: blit the frame, then stroke one box per
/// predicted region.
pub fn render_overlay(predictions: &[Prediction], frame: &Frame, canvas: &mut Pixmap) {
    blit_frame(frame, canvas);

    let mut paint = Paint::default();
    paint.set_color(Color::from_rgba8(255, 64, 192, 255));
    paint.anti_alias = false;
    let stroke = Stroke {
        width: 2.0,
        ..Stroke::default()
    };

    for region in predictions.iter().filter_map(|p| p.region) {
        if region.width < 1.0 || region.height < 1.0 {
            continue;
        }
        let mut pb = PathBuilder::new();
        pb.move_to(region.x, region.y);
        pb.line_to(region.x + region.width, region.y);
        pb.line_to(region.x + region.width, region.y + region.height);
        pb.line_to(region.x, region.y + region.height);
        pb.close();
        if let Some(path) = pb.finish() {
            canvas.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }
    }
}

/// Copy the frame's pixels onto the canvas, clipped to the smaller of the
/// two surfaces. Camera frames are opaque, so straight RGBA bytes are
/// valid premultiplied data once alpha is forced opaque.
fn blit_frame(frame: &Frame, canvas: &mut Pixmap) {
    if !frame.is_well_formed() {
        debug!(frame = frame.id, "skipping blit of malformed frame");
        return;
    }
    let (fw, fh) = (frame.size.0 as usize, frame.size.1 as usize);
    let (cw, ch) = (canvas.width() as usize, canvas.height() as usize);
    let copy_w = fw.min(cw);
    let copy_h = fh.min(ch);

    let dst = canvas.data_mut();
    for row in 0..copy_h {
        let src_off = row * fw * 4;
        let dst_off = row * cw * 4;
        dst[dst_off..dst_off + copy_w * 4]
            .copy_from_slice(&frame.rgba[src_off..src_off + copy_w * 4]);
        for px in 0..copy_w {
            dst[dst_off + px * 4 + 3] = 255;
        }
    }
}

/// Reference detector: reports an open hand in each vertical half of the
/// frame whose mean luminance clears the threshold, plus the model's
/// background face report. Deterministic, hardware-free.
pub struct LumaDetector {
    pub threshold: f32,
    disposed: bool,
}

impl LumaDetector {
    pub fn new(threshold: f32) -> Self {
        Self {
            threshold,
            disposed: false,
        }
    }

    fn half_luminance(frame: &Frame, left: bool) -> f32 {
        let (w, h) = (frame.size.0 as usize, frame.size.1 as usize);
        let (x0, x1) = if left { (0, w / 2) } else { (w / 2, w) };
        if x1 <= x0 || h == 0 {
            return 0.0;
        }
        let mut sum = 0.0f64;
        for y in 0..h {
            for x in x0..x1 {
                let i = (y * w + x) * 4;
                let r = frame.rgba[i] as f64;
                let g = frame.rgba[i + 1] as f64;
                let b = frame.rgba[i + 2] as f64;
                sum += 0.2126 * r + 0.7152 * g + 0.0722 * b;
            }
        }
        (sum / (((x1 - x0) * h) as f64 * 255.0)) as f32
    }
}

impl Detector for LumaDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawPrediction>, VisionError> {
        if self.disposed {
            return Err(VisionError::Detection("detector already disposed".into()));
        }
        if !frame.is_well_formed() {
            return Err(VisionError::Detection(format!(
                "frame {} has {} bytes, expected {}",
                frame.id,
                frame.rgba.len(),
                frame.expected_len()
            )));
        }

        let (w, h) = (frame.size.0 as f32, frame.size.1 as f32);
        let mut predictions = Vec::new();
        for (left, x) in [(true, 0.0), (false, w / 2.0)] {
            let luma = Self::half_luminance(frame, left);
            if luma >= self.threshold {
                predictions.push(RawPrediction {
                    class: 1,
                    score: luma.clamp(0.0, 1.0),
                    region: Some(Region {
                        x,
                        y: 0.0,
                        width: w / 2.0,
                        height: h,
                    }),
                });
            }
        }
        // The background/face report the model always emits.
        predictions.push(RawPrediction {
            class: 5,
            score: 0.5,
            region: None,
        });
        Ok(predictions)
    }

    fn dispose(&mut self) {
        self.disposed = true;
        debug!("luma detector disposed");
    }
}

pub struct LumaDetectorLoader {
    pub threshold: f32,
}

impl Default for LumaDetectorLoader {
    fn default() -> Self {
        Self { threshold: 0.35 }
    }
}

impl DetectorLoader for LumaDetectorLoader {
    type Detector = LumaDetector;

    fn load(&mut self) -> Result<LumaDetector, VisionError> {
        Ok(LumaDetector::new(self.threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_halves(left_val: u8, right_val: u8) -> Frame {
        let (w, h) = (8usize, 4usize);
        let mut rgba = vec![0u8; w * h * 4];
        for y in 0..h {
            for x in 0..w {
                let v = if x < w / 2 { left_val } else { right_val };
                let i = (y * w + x) * 4;
                rgba[i] = v;
                rgba[i + 1] = v;
                rgba[i + 2] = v;
                rgba[i + 3] = 255;
            }
        }
        Frame::new(1, 0.0, rgba, (w as u32, h as u32))
    }

    #[test]
    fn two_bright_halves_yield_two_hands() {
        let mut det = LumaDetector::new(0.35);
        let preds = det.detect(&frame_with_halves(200, 200)).unwrap();
        let hands = preds.iter().filter(|p| p.class == 1).count();
        assert_eq!(hands, 2);
    }

    #[test]
    fn dark_frame_yields_only_the_sentinel() {
        let mut det = LumaDetector::new(0.35);
        let preds = det.detect(&frame_with_halves(10, 10)).unwrap();
        assert_eq!(preds.len(), 1);
        assert_eq!(preds[0].class, 5);
    }

    #[test]
    fn one_bright_half_yields_one_hand() {
        let mut det = LumaDetector::new(0.35);
        let preds = det.detect(&frame_with_halves(220, 5)).unwrap();
        let hands = preds.iter().filter(|p| p.class == 1).count();
        assert_eq!(hands, 1);
    }

    #[test]
    fn malformed_frame_is_a_detection_error() {
        let mut det = LumaDetector::new(0.35);
        let bad = Frame::new(9, 0.0, vec![0u8; 5], (8, 4));
        assert!(matches!(
            det.detect(&bad),
            Err(VisionError::Detection(_))
        ));
    }

    #[test]
    fn detect_after_dispose_fails() {
        let mut det = LumaDetector::new(0.35);
        det.dispose();
        assert!(det.detect(&frame_with_halves(200, 200)).is_err());
    }

    #[test]
    fn overlay_blits_frame_and_boxes() {
        let frame = frame_with_halves(200, 200);
        let mut canvas = Pixmap::new(8, 4).unwrap();
        let preds: Vec<_> = {
            let mut det = LumaDetector::new(0.35);
            det.detect(&frame)
                .unwrap()
                .into_iter()
                .map(|r| Prediction::try_from(r).unwrap())
                .collect()
        };
        render_overlay(&preds, &frame, &mut canvas);
        // Canvas is no longer blank after the blit.
        assert!(canvas.data().iter().any(|&b| b != 0));
    }
}
