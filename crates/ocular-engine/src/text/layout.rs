use crate::coords::Shape;

use super::GlyphSource;

/// One glyph bitmap placed inside the text texture.
///
/// `x`/`y` is the bitmap's top-left corner in pixels, +y down.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct PlacedGlyph {
    pub ch: char,
    pub x: f32,
    pub y: f32,
    pub width: u32,
    pub height: u32,
}

/// Result of [`layout_text`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextLayout {
    /// Size of the texture the text is rendered into.
    pub shape: Shape,
    /// Glyphs with a non-empty bitmap, in string order.
    pub glyphs: Vec<PlacedGlyph>,
}

/// Places the glyphs of `text`.
///
/// `\n` starts a new line one baseline skip lower. Other control characters
/// are skipped. Characters without a glyph use the source's substitute, and
/// are dropped if the substitute is missing too. Glyphs with an empty bitmap
/// (spaces) advance the pen but are not placed.
///
/// The width is the longest line rounded up to a multiple of 4 pixels; the
/// height is one baseline skip per line plus one pixel.
pub fn layout_text(text: &str, source: &dyn GlyphSource) -> TextLayout {
    let skip = source.baseline_skip();
    let ascender = source.ascender();

    let mut glyphs = Vec::new();
    let mut lines = 1u32;
    let mut pen_x = 0.0f32;
    let mut max_x = 0.0f32;

    for ch in text.chars() {
        if ch == '\n' {
            pen_x = 0.0;
            lines += 1;
            continue;
        }
        if (ch as u32) < 32 || ch as u32 == 127 {
            continue;
        }

        let (ch, metrics) = match source.glyph(ch) {
            Some(m) => (ch, m),
            None => {
                let sub = source.substitute();
                match source.glyph(sub) {
                    Some(m) => (sub, m),
                    None => continue,
                }
            }
        };

        if metrics.width > 0 && metrics.height > 0 {
            let baseline = (lines - 1) as f32 * skip + ascender;
            glyphs.push(PlacedGlyph {
                ch,
                x: pen_x + metrics.xmin as f32,
                y: baseline - (metrics.ymin + metrics.height as i32) as f32,
                width: metrics.width,
                height: metrics.height,
            });
        }

        pen_x += metrics.advance;
        max_x = max_x.max(pen_x);
    }

    let width = (max_x.ceil() as u32).div_ceil(4) * 4;
    let height = (lines as f32 * skip).ceil() as u32 + 1;

    TextLayout {
        shape: Shape::new(width, height),
        glyphs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::BlockFont;

    // ── lines ─────────────────────────────────────────────────────────────

    #[test]
    fn newline_advances_one_baseline_skip() {
        let layout = layout_text("A\nB", &BlockFont::new(20.0));
        assert_eq!(layout.glyphs.len(), 2);
        assert!(layout.shape.height >= 2 * 20 + 1);
        assert_eq!(layout.glyphs[0].x, layout.glyphs[1].x);
        assert_eq!(layout.glyphs[1].y - layout.glyphs[0].y, 20.0);
    }

    #[test]
    fn width_is_longest_line_rounded_to_four() {
        let layout = layout_text("AB\nABC", &BlockFont::new(20.0));
        // 3 * 11 = 33 -> 36
        assert_eq!(layout.shape.width, 36);
        assert_eq!(layout.shape.height, 41);
    }

    #[test]
    fn glyph_sits_on_the_baseline() {
        let layout = layout_text("A", &BlockFont::new(20.0));
        let g = layout.glyphs[0];
        assert_eq!(g.x, 1.0);
        assert_eq!(g.y + g.height as f32, 14.0);
    }

    // ── fallbacks ─────────────────────────────────────────────────────────

    #[test]
    fn control_characters_are_skipped() {
        let layout = layout_text("A\tB\u{7f}", &BlockFont::new(20.0));
        assert_eq!(layout.glyphs.len(), 2);
        assert_eq!(layout.shape.width, 24);
    }

    #[test]
    fn unknown_characters_use_the_substitute() {
        let layout = layout_text("a", &BlockFont::new(20.0));
        assert_eq!(layout.glyphs.len(), 1);
        assert_eq!(layout.glyphs[0].ch, '?');
    }

    #[test]
    fn missing_substitute_drops_the_character() {
        let font = BlockFont {
            skip: 20.0,
            with_substitute: false,
        };
        let layout = layout_text("aA", &font);
        assert_eq!(layout.glyphs.len(), 1);
        assert_eq!(layout.glyphs[0].x, 1.0);
    }

    #[test]
    fn spaces_advance_without_a_glyph() {
        let layout = layout_text("A B", &BlockFont::new(20.0));
        assert_eq!(layout.glyphs.len(), 2);
        assert_eq!(layout.glyphs[1].x, 23.0);
    }

    #[test]
    fn empty_text_has_zero_width() {
        let layout = layout_text("", &BlockFont::new(20.0));
        assert!(layout.glyphs.is_empty());
        assert_eq!(layout.shape.width, 0);
    }
}
