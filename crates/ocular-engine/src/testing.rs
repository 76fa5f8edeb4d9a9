//! Test helpers: a headless device and a synthetic glyph source.

use std::rc::Rc;

use crate::device::{GpuContext, GpuInit, SharedContext};
use crate::text::{GlyphBitmap, GlyphMetrics, GlyphSource};

/// Returns a headless context, or `None` when the machine has no usable
/// adapter. GPU tests return early on `None`.
pub(crate) fn context() -> Option<SharedContext> {
    let init = GpuInit {
        required_limits: wgpu::Limits::downlevel_defaults(),
        ..Default::default()
    };

    match pollster::block_on(GpuContext::headless(init)) {
        Ok(ctx) => Some(Rc::new(ctx)),
        Err(err) => {
            eprintln!("skipping GPU test: {err}");
            None
        }
    }
}

/// Monospace source with 10x12 glyphs for `A`-`Z` and `?`, and an empty
/// space.
pub(crate) struct BlockFont {
    pub skip: f32,
    pub with_substitute: bool,
}

impl BlockFont {
    pub(crate) fn new(skip: f32) -> Self {
        Self {
            skip,
            with_substitute: true,
        }
    }
}

impl GlyphSource for BlockFont {
    fn baseline_skip(&self) -> f32 {
        self.skip
    }

    fn ascender(&self) -> f32 {
        14.0
    }

    fn glyph(&self, ch: char) -> Option<GlyphMetrics> {
        let visible = ch.is_ascii_uppercase() || (ch == '?' && self.with_substitute);
        if ch == ' ' {
            return Some(GlyphMetrics { advance: 11.0, width: 0, height: 0, xmin: 0, ymin: 0 });
        }
        visible.then_some(GlyphMetrics { advance: 11.0, width: 10, height: 12, xmin: 1, ymin: 0 })
    }

    fn rasterize(&self, ch: char) -> Option<GlyphBitmap> {
        let m = self.glyph(ch)?;
        Some(GlyphBitmap {
            width: m.width,
            height: m.height,
            coverage: vec![255; (m.width * m.height) as usize],
        })
    }
}
