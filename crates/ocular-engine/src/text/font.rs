use crate::error::{Error, Result};

use super::{GlyphBitmap, GlyphMetrics, GlyphSource};

/// A TrueType/OpenType face rasterized at a fixed pixel size.
pub struct FontFace {
    font: fontdue::Font,
    px: f32,
    ascender: f32,
    baseline_skip: f32,
}

impl FontFace {
    /// Parses `bytes` and prepares the face for rasterizing at `px` pixels.
    pub fn from_bytes(bytes: &[u8], px: f32) -> Result<Self> {
        let settings = fontdue::FontSettings {
            scale: px,
            ..fontdue::FontSettings::default()
        };
        let font = fontdue::Font::from_bytes(bytes, settings)
            .map_err(|e| Error::InvalidFont(e.to_string()))?;

        let (ascender, baseline_skip) = match font.horizontal_line_metrics(px) {
            Some(m) => (m.ascent, m.new_line_size),
            None => (px, px * 1.2),
        };

        Ok(Self {
            font,
            px,
            ascender,
            baseline_skip: baseline_skip.ceil(),
        })
    }

    pub fn px(&self) -> f32 {
        self.px
    }

    fn has_glyph(&self, ch: char) -> bool {
        self.font.lookup_glyph_index(ch) != 0
    }
}

impl GlyphSource for FontFace {
    fn baseline_skip(&self) -> f32 {
        self.baseline_skip
    }

    fn ascender(&self) -> f32 {
        self.ascender
    }

    fn glyph(&self, ch: char) -> Option<GlyphMetrics> {
        if !self.has_glyph(ch) {
            return None;
        }
        let m = self.font.metrics(ch, self.px);
        Some(GlyphMetrics {
            advance: m.advance_width,
            width: m.width as u32,
            height: m.height as u32,
            xmin: m.xmin,
            ymin: m.ymin,
        })
    }

    fn rasterize(&self, ch: char) -> Option<GlyphBitmap> {
        if !self.has_glyph(ch) {
            return None;
        }
        let (m, coverage) = self.font.rasterize(ch, self.px);
        Some(GlyphBitmap {
            width: m.width as u32,
            height: m.height as u32,
            coverage,
        })
    }
}
