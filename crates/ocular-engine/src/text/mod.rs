//! Glyph sources and text layout.
//!
//! Fonts are consumed through [`GlyphSource`]; [`FontFace`] implements it
//! over fontdue. [`layout_text`] turns a string into glyph placements inside
//! a text texture, which `render::TextRenderer` then rasterizes.

mod font;
mod layout;

pub use font::FontFace;
pub use layout::{layout_text, PlacedGlyph, TextLayout};

/// Metrics of one glyph, in pixels.
///
/// `xmin`/`ymin` locate the bitmap's bottom-left corner relative to the pen
/// position on the baseline, with +y pointing up.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GlyphMetrics {
    pub advance: f32,
    pub width: u32,
    pub height: u32,
    pub xmin: i32,
    pub ymin: i32,
}

/// Coverage bitmap of one glyph, one byte per pixel, top row first.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphBitmap {
    pub width: u32,
    pub height: u32,
    pub coverage: Vec<u8>,
}

/// Per-character glyph lookup.
pub trait GlyphSource {
    /// Vertical distance between consecutive baselines.
    fn baseline_skip(&self) -> f32;

    /// Distance from the top of a line to its baseline.
    fn ascender(&self) -> f32;

    /// `None` when the source has no glyph for `ch`.
    fn glyph(&self, ch: char) -> Option<GlyphMetrics>;

    fn rasterize(&self, ch: char) -> Option<GlyphBitmap>;

    /// Character drawn in place of characters without a glyph.
    fn substitute(&self) -> char {
        '?'
    }
}
