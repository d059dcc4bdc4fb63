use ab_glyph::{point, Font, FontArc, Glyph, PxScale, ScaleFont};
use anyhow::Result;
use bytemuck::{cast_slice, cast_slice_mut};
use handex_cache::{get_text, intern_text, text_count, Atom};
use handex_core::FeedbackState;
use handex_timing::{MonotonicTimer, Timer};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tiny_skia::{Color, Paint, Pixmap, PremultipliedColorU8, Rect, Transform};

const BORDER_PX: f32 = 8.0;
const BANNER_PX: f32 = 32.0;

/// Per-frame render timing, recorded into the poll-loop cadence timer.
pub struct FrameStats {
    pub clear: Duration,
    pub blit: Duration,
    pub chrome: Duration,
    pub total: Duration,
}

/// Status banner line for a feedback state.
pub fn status_line(feedback: &FeedbackState) -> String {
    match feedback {
        FeedbackState::Loading => "LOADING MODEL...".to_string(),
        FeedbackState::Acquiring => "STARTING CAMERA...".to_string(),
        FeedbackState::TwoHands => "TWO HANDS DETECTED".to_string(),
        FeedbackState::HandsMissing => "SHOW BOTH HANDS".to_string(),
        FeedbackState::Summary(labels) => format!("DETECTED: {labels}"),
        FeedbackState::Faulted(message) => format!("TRIAL ERROR: {message}"),
    }
}

/// Border color for a feedback state: green affirmative, red negative,
/// grey while waiting, amber for a surfaced fault.
pub fn border_color(feedback: &FeedbackState) -> Color {
    match feedback {
        FeedbackState::TwoHands => Color::from_rgba8(64, 200, 64, 255),
        FeedbackState::HandsMissing => Color::from_rgba8(210, 48, 48, 255),
        FeedbackState::Loading | FeedbackState::Acquiring => Color::from_rgba8(96, 96, 96, 255),
        FeedbackState::Summary(_) => Color::from_rgba8(64, 120, 210, 255),
        FeedbackState::Faulted(_) => Color::from_rgba8(230, 160, 32, 255),
    }
}

/// Well-known system font locations; the banner needs any sans face.
const FONT_CANDIDATES: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/Library/Fonts/Arial Unicode.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

pub fn load_system_font() -> Option<FontArc> {
    FONT_CANDIDATES.iter().find_map(|path| {
        let bytes = std::fs::read(path).ok()?;
        FontArc::try_from_vec(bytes).ok()
    })
}

struct TextCache {
    font: FontArc,
    size_px: f32,
    map: HashMap<Atom, Arc<Pixmap>>,
}

impl TextCache {
    fn new(font: FontArc, size_px: f32) -> Self {
        Self {
            font,
            size_px,
            map: HashMap::new(),
        }
    }

    fn get_or_render(&mut self, atom: Atom) -> Arc<Pixmap> {
        if let Some(p) = self.map.get(&atom) {
            return Arc::clone(p);
        }
        let pm = Arc::new(render_text_pixmap(
            atom.as_ref(),
            self.size_px,
            self.font.clone(),
            Color::from_rgba8(255, 255, 255, 255),
        ));
        self.map.insert(atom, Arc::clone(&pm));
        pm
    }
}

/// Rasterize a line of text into a tight transparent pixmap.
pub fn render_text_pixmap(text: &str, font_size: f32, font: FontArc, color: Color) -> Pixmap {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;

    for g in &glyphs {
        if let Some(out) = font.outline_glyph(g.clone()) {
            let b = out.px_bounds();
            min_x = min_x.min(b.min.x);
            min_y = min_y.min(b.min.y);
            max_x = max_x.max(b.max.x);
            max_y = max_y.max(b.max.y);
        }
    }

    if min_x == f32::INFINITY {
        return Pixmap::new(1, 1).expect("pixmap");
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pm = Pixmap::new(w, h).expect("pixmap");

    let stride = pm.width() as usize;
    let dst = pm.pixels_mut();
    let cu = [
        (color.red() * 255.0) as u8,
        (color.green() * 255.0) as u8,
        (color.blue() * 255.0) as u8,
        (color.alpha() * 255.0) as u8,
    ];

    for g in &glyphs {
        if let Some(out) = font.outline_glyph(g.clone()) {
            let b = out.px_bounds();
            out.draw(|x, y, cov| {
                if cov <= f32::EPSILON {
                    return;
                }
                let fx = x as f32 + b.min.x - min_x;
                let fy = y as f32 + b.min.y - min_y;
                let ix = fx.floor() as i32;
                let iy = fy.floor() as i32;
                if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                    return;
                }
                let i = iy as usize * stride + ix as usize;
                if i >= dst.len() {
                    return;
                }

                let a_lin = (cov * cu[3] as f32 / 255.0).clamp(0.0, 1.0);
                let sr = (cu[0] as f32 * a_lin) as u8;
                let sg = (cu[1] as f32 * a_lin) as u8;
                let sb = (cu[2] as f32 * a_lin) as u8;
                let sa = (a_lin * 255.0) as u8;

                let src = PremultipliedColorU8::from_rgba(sr, sg, sb, sa).unwrap();
                let bg = dst[i];
                let inv = 1.0 - (sa as f32 / 255.0);
                let r = src.red().saturating_add((bg.red() as f32 * inv) as u8);
                let g = src.green().saturating_add((bg.green() as f32 * inv) as u8);
                let b = src.blue().saturating_add((bg.blue() as f32 * inv) as u8);
                let a = src.alpha().saturating_add((bg.alpha() as f32 * inv) as u8);
                dst[i] = PremultipliedColorU8::from_rgba(r, g, b, a).unwrap();
            });
        }
    }

    pm
}

/// Full-frame feedback renderer: the live feed invalidates the whole
/// canvas every frame, so each pass clears, blits the detector-drawn
/// canvas, and draws the border and banner on top.
pub struct SkiaRenderer {
    width: u32,
    height: u32,
    canvas: Pixmap,
    text_cache: Option<TextCache>,
}

impl SkiaRenderer {
    /// `font` may be absent in headless contexts; the banner is skipped
    /// and only the border carries the feedback then.
    pub fn new(width: u32, height: u32, font: Option<FontArc>) -> Self {
        // Pre-intern the fixed banner lines so per-frame lookups are
        // id-based.
        for feedback in [
            FeedbackState::Loading,
            FeedbackState::Acquiring,
            FeedbackState::TwoHands,
            FeedbackState::HandsMissing,
        ] {
            intern_text(&status_line(&feedback));
        }
        intern_text("REC");

        let mut canvas = Pixmap::new(width, height).expect("canvas pixmap");
        canvas.fill(Color::from_rgba8(0, 0, 0, 255));

        Self {
            width,
            height,
            canvas,
            text_cache: font.map(|f| TextCache::new(f, BANNER_PX)),
        }
    }

    pub fn resize(&mut self, new_width: u32, new_height: u32) {
        self.width = new_width;
        self.height = new_height;
        self.canvas = Pixmap::new(new_width, new_height).expect("canvas pixmap");
        self.canvas.fill(Color::from_rgba8(0, 0, 0, 255));
    }

    pub fn render_frame(
        &mut self,
        feedback: &FeedbackState,
        video: Option<&Pixmap>,
        recording: bool,
        frame_buffer: &mut [u8],
        timer: &mut MonotonicTimer,
    ) -> Result<FrameStats> {
        if frame_buffer.len() != self.canvas.data().len() {
            anyhow::bail!(
                "frame buffer is {} bytes, canvas needs {}",
                frame_buffer.len(),
                self.canvas.data().len()
            );
        }

        let t_clear = {
            let t = timer.now();
            self.canvas.fill(Color::from_rgba8(0, 0, 0, 255));
            timer.elapsed(t)
        };

        let t_blit = {
            let t = timer.now();
            if let Some(video) = video {
                let x = (self.width.saturating_sub(video.width())) as f32 * 0.5;
                let y = (self.height.saturating_sub(video.height())) as f32 * 0.5;
                self.blit_opaque(video, (x, y));
                self.draw_border(feedback, (x, y), (video.width(), video.height()));
            } else {
                self.draw_border(feedback, (0.0, 0.0), (self.width, self.height));
            }
            timer.elapsed(t)
        };

        let t_chrome = {
            let t = timer.now();
            let banner_id = intern_text(&status_line(feedback));
            self.blit_text_by_intern_id(banner_id, (self.width as f32 * 0.5, BANNER_PX));
            if recording {
                let rec_id = intern_text("REC");
                self.blit_text_by_intern_id(rec_id, (self.width as f32 - 48.0, BANNER_PX));
            }
            timer.elapsed(t)
        };

        frame_buffer.copy_from_slice(self.canvas.data());

        let total = t_clear + t_blit + t_chrome;
        timer.record_frame(total);
        Ok(FrameStats {
            clear: t_clear,
            blit: t_blit,
            chrome: t_chrome,
            total,
        })
    }

    fn draw_border(&mut self, feedback: &FeedbackState, pos: (f32, f32), size: (u32, u32)) {
        let mut paint = Paint::default();
        paint.anti_alias = false;
        paint.set_color(border_color(feedback));

        let (x, y) = pos;
        let (w, h) = (size.0 as f32, size.1 as f32);
        let edges = [
            Rect::from_xywh(x, y, w, BORDER_PX),
            Rect::from_xywh(x, y + h - BORDER_PX, w, BORDER_PX),
            Rect::from_xywh(x, y, BORDER_PX, h),
            Rect::from_xywh(x + w - BORDER_PX, y, BORDER_PX, h),
        ];
        for rect in edges.into_iter().flatten() {
            self.canvas.fill_rect(rect, &paint, Transform::identity(), None);
        }
    }

    /// Row-copy blit for opaque sources (the camera canvas), clipped to
    /// this renderer's surface.
    fn blit_opaque(&mut self, src: &Pixmap, pos: (f32, f32)) {
        let x0 = pos.0.floor().max(0.0) as usize;
        let y0 = pos.1.floor().max(0.0) as usize;
        let (cw, ch) = (self.width as usize, self.height as usize);
        if x0 >= cw || y0 >= ch {
            return;
        }
        let copy_w = (src.width() as usize).min(cw - x0);
        let copy_h = (src.height() as usize).min(ch - y0);

        let src_stride = src.width() as usize;
        let src_data = src.data();
        let dst_data = self.canvas.data_mut();
        for row in 0..copy_h {
            let src_off = row * src_stride * 4;
            let dst_off = ((y0 + row) * cw + x0) * 4;
            dst_data[dst_off..dst_off + copy_w * 4]
                .copy_from_slice(&src_data[src_off..src_off + copy_w * 4]);
        }
    }

    /// Centered text blit through the interned pixmap cache; premultiplied
    /// alpha blend over the canvas.
    fn blit_text_by_intern_id(&mut self, intern_id: usize, center: (f32, f32)) {
        let Some(cache) = self.text_cache.as_mut() else {
            return;
        };
        if intern_id >= text_count() {
            return;
        }
        let pm = cache.get_or_render(Atom::from(get_text(intern_id).as_str()));
        let (w, h) = (pm.width() as usize, pm.height() as usize);
        let (cw, ch) = (self.width as usize, self.height as usize);

        let x = (center.0 - w as f32 * 0.5) as i32;
        let y = (center.1 - h as f32 * 0.5) as i32;
        if x + w as i32 <= 0 || y + h as i32 <= 0 || x >= cw as i32 || y >= ch as i32 {
            return;
        }

        let dst_x = x.max(0) as usize;
        let dst_y = y.max(0) as usize;
        let src_x_offset = (-x).max(0) as usize;
        let src_y_offset = (-y).max(0) as usize;
        let copy_w = (w - src_x_offset).min(cw - dst_x);
        let copy_h = (h - src_y_offset).min(ch - dst_y);

        let src_u32: &[u32] = cast_slice(pm.data());
        let dst_u32: &mut [u32] = cast_slice_mut(self.canvas.data_mut());

        for row in 0..copy_h {
            let src_row_start = (src_y_offset + row) * w + src_x_offset;
            let dst_row_start = (dst_y + row) * cw + dst_x;
            for i in 0..copy_w {
                let s = src_u32[src_row_start + i];
                let d = dst_u32[dst_row_start + i];

                let sa = (s >> 24) & 0xFF;
                let inv = 255 - sa;
                let sr = s & 0xFF;
                let sg = (s >> 8) & 0xFF;
                let sb = (s >> 16) & 0xFF;
                let dr = d & 0xFF;
                let dg = (d >> 8) & 0xFF;
                let db = (d >> 16) & 0xFF;
                let da = (d >> 24) & 0xFF;

                let r = sr + (dr * inv + 127) / 255;
                let g = sg + (dg * inv + 127) / 255;
                let b = sb + (db * inv + 127) / 255;
                let a = sa + (da * inv + 127) / 255;
                dst_u32[dst_row_start + i] = (a << 24) | (b << 16) | (g << 8) | r;
            }
        }
    }
}
