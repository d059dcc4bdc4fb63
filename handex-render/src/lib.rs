pub mod render;

pub use ab_glyph::FontArc;
pub use render::{border_color, load_system_font, status_line, FrameStats, SkiaRenderer};
