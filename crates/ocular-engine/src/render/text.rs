use std::collections::HashMap;

use glam::{Mat4, Vec4};

use crate::coords::{Color, Shape};
use crate::device::{GpuContext, SharedContext};
use crate::error::{Error, Result};
use crate::gpu::{GpuTexture, PixelFormat};
use crate::text::{layout_text, GlyphBitmap, GlyphSource, TextLayout};
use crate::view::{SharedView, View};

use super::common::{
    render_pipeline, render_pipeline_for, textured_bind_group, textured_layout, DepthMode, DrawUniform,
    PipelineDesc, TexturedVertex, UniformSlot, QUAD_INDICES, TEXTURED_SHADER,
};
use super::image::QuadBuffers;
use super::{Colored, DrawCall, Drawable, RenderTarget, RendererKind};

const GLYPH_SHADER: (&str, &str) = ("ocular glyph", include_str!("shaders/glyph.wgsl"));

const TEXT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const ATLAS_WIDTH: u32 = 512;
const GLYPH_PADDING: u32 = 1;

#[derive(Debug, Copy, Clone, PartialEq)]
struct AtlasEntry {
    uv_min: [f32; 2],
    uv_max: [f32; 2],
}

/// Coverage bitmaps of the glyphs of one layout, shelf-packed into a single
/// R8 image.
#[derive(Debug, Default)]
struct GlyphAtlas {
    shape: Shape,
    coverage: Vec<u8>,
    entries: HashMap<char, AtlasEntry>,
}

impl GlyphAtlas {
    fn build(layout: &TextLayout, source: &dyn GlyphSource) -> Self {
        let mut placed: Vec<(char, u32, u32, GlyphBitmap)> = Vec::new();
        let mut cursor_x = GLYPH_PADDING;
        let mut cursor_y = GLYPH_PADDING;
        let mut row_height = 0;
        let mut width = ATLAS_WIDTH;

        for glyph in &layout.glyphs {
            if placed.iter().any(|(ch, ..)| *ch == glyph.ch) {
                continue;
            }
            let Some(bitmap) = source.rasterize(glyph.ch) else { continue };
            if bitmap.width == 0 || bitmap.height == 0 {
                continue;
            }
            width = width.max(bitmap.width + 2 * GLYPH_PADDING);

            if cursor_x + bitmap.width + GLYPH_PADDING > width {
                cursor_y += row_height + GLYPH_PADDING;
                cursor_x = GLYPH_PADDING;
                row_height = 0;
            }
            placed.push((glyph.ch, cursor_x, cursor_y, bitmap));
            let (.., bitmap) = &placed[placed.len() - 1];
            cursor_x += bitmap.width + GLYPH_PADDING;
            row_height = row_height.max(bitmap.height);
        }

        if placed.is_empty() {
            return Self::default();
        }

        let shape = Shape::new(width, cursor_y + row_height + GLYPH_PADDING);
        let mut coverage = vec![0u8; shape.area()];
        let mut entries = HashMap::new();
        let (w, h) = (shape.width as f32, shape.height as f32);

        for (ch, x, y, bitmap) in placed {
            for row in 0..bitmap.height {
                let src = (row * bitmap.width) as usize;
                let dst = ((y + row) * shape.width + x) as usize;
                let len = bitmap.width as usize;
                coverage[dst..dst + len].copy_from_slice(&bitmap.coverage[src..src + len]);
            }
            entries.insert(
                ch,
                AtlasEntry {
                    uv_min: [x as f32 / w, y as f32 / h],
                    uv_max: [(x + bitmap.width) as f32 / w, (y + bitmap.height) as f32 / h],
                },
            );
        }

        Self {
            shape,
            coverage,
            entries,
        }
    }
}

/// Fails unless `texture` can serve as a color attachment on this device.
fn check_attachment(ctx: &GpuContext, texture: Option<&wgpu::Texture>) -> Result<()> {
    let Some(texture) = texture else {
        return Err(Error::IncompleteAttachment("no storage".into()));
    };
    let size = texture.size();
    if size.width == 0 || size.height == 0 {
        return Err(Error::IncompleteAttachment("zero-sized texture".into()));
    }
    let max = ctx.limits().max_texture_dimension_2d;
    if size.width > max || size.height > max {
        return Err(Error::IncompleteAttachment(format!(
            "{}x{} exceeds the device limit of {max}",
            size.width, size.height
        )));
    }
    if !texture.usage().contains(wgpu::TextureUsages::RENDER_ATTACHMENT) {
        return Err(Error::IncompleteAttachment("texture is not renderable".into()));
    }
    let features = texture.format().guaranteed_format_features(ctx.device().features());
    if !features.allowed_usages.contains(wgpu::TextureUsages::RENDER_ATTACHMENT) {
        return Err(Error::IncompleteAttachment(format!(
            "{:?} is not a color-renderable format",
            texture.format()
        )));
    }
    Ok(())
}

/// Corners of a glyph placed at `x`, `y` (+y down) in a texture of `shape`,
/// in that texture's clip space.
fn glyph_corners(shape: Shape, rect: [f32; 4], entry: &AtlasEntry) -> [TexturedVertex; 4] {
    let [x, y, w, h] = rect;
    let sx = 2.0 / shape.width as f32;
    let sy = 2.0 / shape.height as f32;
    let (x0, x1) = (x * sx - 1.0, (x + w) * sx - 1.0);
    let (y0, y1) = (1.0 - (y + h) * sy, 1.0 - y * sy);
    let [u0, v0] = entry.uv_min;
    let [u1, v1] = entry.uv_max;
    [
        TexturedVertex { pos: [x0, y0, 0.0], uv: [u0, v1] },
        TexturedVertex { pos: [x1, y0, 0.0], uv: [u1, v1] },
        TexturedVertex { pos: [x1, y1, 0.0], uv: [u1, v0] },
        TexturedVertex { pos: [x0, y1, 0.0], uv: [u0, v0] },
    ]
}

/// Draws a string rasterized once into a texture, anchored at a point in
/// the view.
///
/// The text texture is drawn pixel for pixel: its bottom-left corner sits
/// at the projected origin and it is never scaled by the projection.
pub struct TextRenderer {
    ctx: SharedContext,
    view: SharedView,
    source: Box<dyn GlyphSource>,
    color: Color,
    origin: Vec4,
    text: String,
    layout: TextLayout,
    atlas: GpuTexture,
    texture: GpuTexture,
    glyph_draws: usize,
    quad: Option<QuadBuffers>,
    uniform: UniformSlot<DrawUniform>,
}

impl TextRenderer {
    pub fn new(ctx: SharedContext, view: SharedView, source: Box<dyn GlyphSource>) -> Self {
        Self {
            atlas: GpuTexture::labeled(ctx.clone(), "ocular glyph atlas"),
            texture: GpuTexture::labeled(ctx.clone(), "ocular text"),
            ctx,
            view,
            source,
            color: Color::WHITE,
            origin: Vec4::W,
            text: String::new(),
            layout: TextLayout::default(),
            glyph_draws: 0,
            quad: None,
            uniform: UniformSlot::new("ocular text uniform"),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Size of the rendered text in pixels.
    pub fn shape(&self) -> Shape {
        self.texture.shape()
    }

    /// Glyph draws issued by the last [`set_text`](Self::set_text).
    pub fn glyph_draws(&self) -> usize {
        self.glyph_draws
    }

    pub fn texture(&self) -> &GpuTexture {
        &self.texture
    }

    /// Homogeneous point the text is anchored at, `(0, 0, 0, 1)` by default.
    pub fn origin(&self) -> Vec4 {
        self.origin
    }

    pub fn set_origin(&mut self, origin: Vec4) {
        self.origin = origin;
    }

    /// Lays out `text` and renders it into the text texture.
    ///
    /// Text without visible extent releases the texture. Fails with
    /// [`Error::IncompleteAttachment`] if the texture cannot be rendered to,
    /// for example when the text exceeds the device's texture size.
    pub fn set_text(&mut self, text: &str) -> Result<()> {
        self.text = text.to_owned();
        self.layout = layout_text(text, self.source.as_ref());
        self.glyph_draws = 0;

        let shape = self.layout.shape;
        if shape.is_empty() {
            self.texture.clear();
            return Ok(());
        }

        let max = self.ctx.limits().max_texture_dimension_2d;
        if shape.width > max || shape.height > max {
            return Err(Error::IncompleteAttachment(format!(
                "{}x{} text exceeds the device limit of {max}",
                shape.width, shape.height
            )));
        }

        self.texture.allocate(shape, PixelFormat::RGBA8);
        check_attachment(&self.ctx, self.texture.texture())?;

        let atlas = GlyphAtlas::build(&self.layout, self.source.as_ref());
        self.atlas.set_image::<u8>(atlas.shape, &atlas.coverage)?;

        let mut vertices = Vec::with_capacity(self.layout.glyphs.len() * 4);
        let mut indices = Vec::with_capacity(self.layout.glyphs.len() * 6);
        for glyph in &self.layout.glyphs {
            let Some(entry) = atlas.entries.get(&glyph.ch) else { continue };
            let base = vertices.len() as u32;
            let rect = [glyph.x, glyph.y, glyph.width as f32, glyph.height as f32];
            vertices.extend_from_slice(&glyph_corners(shape, rect, entry));
            indices.extend(QUAD_INDICES.iter().map(|&i| base + i as u32));
        }

        self.render_glyphs(&vertices, &indices);
        log::debug!("rendered {:?} into {}x{} text texture", text, shape.width, shape.height);
        Ok(())
    }

    /// Clears the text texture and draws every glyph quad once.
    fn render_glyphs(&mut self, vertices: &[TexturedVertex], indices: &[u32]) {
        use wgpu::util::DeviceExt;

        let ctx = &self.ctx;
        let Some(target) = self.texture.texture() else { return };
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = ctx.create_encoder("ocular text");
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("ocular glyph pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            let glyphs = indices.len() / QUAD_INDICES.len();
            let binding = self.atlas.binding().filter(|_| glyphs > 0);
            if let Some(binding) = binding {
                let layout = textured_layout(ctx);
                let pipeline = render_pipeline_for(
                    ctx,
                    TEXT_FORMAT,
                    None,
                    &PipelineDesc {
                        name: "ocular glyphs",
                        shader: GLYPH_SHADER,
                        layout: &layout,
                        buffers: &[TexturedVertex::layout()],
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        depth: DepthMode::Overlay,
                    },
                );

                let uniform = ctx.device().create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("ocular glyph uniform"),
                    contents: bytemuck::bytes_of(&DrawUniform::new(Mat4::IDENTITY, Color::WHITE)),
                    usage: wgpu::BufferUsages::UNIFORM,
                });
                let vertex_buffer = ctx.device().create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("ocular glyph vertices"),
                    contents: bytemuck::cast_slice(vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                });
                let index_buffer = ctx.device().create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("ocular glyph indices"),
                    contents: bytemuck::cast_slice(indices),
                    usage: wgpu::BufferUsages::INDEX,
                });
                let bind_group = textured_bind_group(ctx, "ocular glyphs", &layout, &uniform, &binding);

                pass.set_pipeline(&pipeline);
                pass.set_bind_group(0, &bind_group, &[]);
                pass.set_vertex_buffer(0, vertex_buffer.slice(..));
                pass.set_index_buffer(index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                let per_glyph = QUAD_INDICES.len() as u32;
                for i in 0..glyphs as u32 {
                    pass.draw_indexed(i * per_glyph..(i + 1) * per_glyph, 0, 0..1);
                }
                self.glyph_draws = glyphs;
            }
        }
        ctx.submit(encoder);
    }
}

impl Colored for TextRenderer {
    fn color(&self) -> Color {
        self.color
    }

    fn set_color(&mut self, color: Color) {
        self.color = color;
    }
}

impl Drawable for TextRenderer {
    fn kind(&self) -> RendererKind {
        RendererKind::Text
    }

    fn view(&self) -> SharedView {
        self.view.clone()
    }

    fn set_view(&mut self, view: SharedView) {
        self.view = view;
    }

    fn draw_with_view(&mut self, target: &mut RenderTarget<'_>, view: &dyn View) -> Result<()> {
        let Some(binding) = self.texture.binding() else { return Ok(()) };
        if target.screen.is_empty() {
            return Ok(());
        }

        let clip = view.view_matrix() * self.origin;
        // Behind the camera.
        if clip.w <= 0.0 {
            return Ok(());
        }
        let ndc = clip.truncate() / clip.w;

        let shape = self.texture.shape();
        let w = 2.0 * shape.width as f32 / target.screen.width as f32;
        let h = 2.0 * shape.height as f32 / target.screen.height as f32;
        #[rustfmt::skip]
        let corners = [
            TexturedVertex { pos: [ndc.x,     ndc.y,     ndc.z], uv: [0.0, 1.0] },
            TexturedVertex { pos: [ndc.x + w, ndc.y,     ndc.z], uv: [1.0, 1.0] },
            TexturedVertex { pos: [ndc.x + w, ndc.y + h, ndc.z], uv: [1.0, 0.0] },
            TexturedVertex { pos: [ndc.x,     ndc.y + h, ndc.z], uv: [0.0, 0.0] },
        ];

        let layout = textured_layout(&self.ctx);
        let pipeline = render_pipeline(
            &self.ctx,
            target,
            &PipelineDesc {
                name: "ocular text",
                shader: TEXTURED_SHADER,
                layout: &layout,
                buffers: &[TexturedVertex::layout()],
                topology: wgpu::PrimitiveTopology::TriangleList,
                depth: DepthMode::Overlay,
            },
        );

        let ctx = &self.ctx;
        let quad = self
            .quad
            .get_or_insert_with(|| QuadBuffers::new(ctx, "ocular text quad", &corners));
        ctx.queue().write_buffer(&quad.vertices, 0, bytemuck::cast_slice(&corners));
        let uniform = self
            .uniform
            .write(ctx, &DrawUniform::new(Mat4::IDENTITY, self.color));
        let bind_group = textured_bind_group(ctx, "ocular text", &layout, uniform, &binding);
        let count = QUAD_INDICES.len() as u32;

        {
            let mut pass = target.begin_load_pass("ocular text pass");
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_vertex_buffer(0, quad.vertices.slice(..));
            pass.set_index_buffer(quad.indices.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..count, 0, 0..1);
        }

        target.record(DrawCall {
            kind: RendererKind::Text,
            topology: wgpu::PrimitiveTopology::TriangleList,
            vertex_count: count,
            color: self.color,
        });
        Ok(())
    }

    fn as_colored_mut(&mut self) -> Option<&mut dyn Colored> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::OffscreenTarget;
    use crate::testing::{self, BlockFont};
    use crate::view::{shared, ScreenView};

    fn renderer(ctx: SharedContext) -> TextRenderer {
        TextRenderer::new(ctx, shared(ScreenView::new()), Box::new(BlockFont::new(20.0)))
    }

    // ── atlas ─────────────────────────────────────────────────────────────

    #[test]
    fn atlas_stores_each_character_once() {
        let font = BlockFont::new(20.0);
        let layout = layout_text("ABA", &font);
        let atlas = GlyphAtlas::build(&layout, &font);

        assert_eq!(atlas.entries.len(), 2);
        assert_eq!(atlas.shape, Shape::new(ATLAS_WIDTH, 12 + 2 * GLYPH_PADDING));
        assert_eq!(atlas.coverage.len(), atlas.shape.area());

        let a = atlas.entries[&'A'];
        let b = atlas.entries[&'B'];
        assert!(a.uv_max[0] < b.uv_min[0]);
        assert_eq!(a.uv_min[1], b.uv_min[1]);
    }

    #[test]
    fn atlas_of_blank_text_is_empty() {
        let font = BlockFont::new(20.0);
        let atlas = GlyphAtlas::build(&layout_text("   ", &font), &font);
        assert!(atlas.shape.is_empty());
        assert!(atlas.entries.is_empty());
    }

    #[test]
    fn glyph_corners_map_pixels_to_clip_space() {
        let entry = AtlasEntry {
            uv_min: [0.0, 0.0],
            uv_max: [1.0, 1.0],
        };
        let corners = glyph_corners(Shape::new(20, 10), [0.0, 0.0, 10.0, 5.0], &entry);
        assert_eq!(corners[0].pos, [-1.0, 0.0, 0.0]);
        assert_eq!(corners[2].pos, [0.0, 1.0, 0.0]);
        assert_eq!(corners[0].uv, [0.0, 1.0]);
    }

    // ── rendering ─────────────────────────────────────────────────────────

    #[test]
    fn two_lines_draw_two_glyphs() {
        let Some(ctx) = testing::context() else { return };
        let mut text = renderer(ctx);

        text.set_text("A\nB").unwrap();

        assert_eq!(text.glyph_draws(), 2);
        assert!(text.shape().height >= 41);
        assert_eq!(text.shape().width % 4, 0);
    }

    #[test]
    fn empty_text_draws_nothing() {
        let Some(ctx) = testing::context() else { return };
        let target = OffscreenTarget::new(ctx.clone(), Shape::new(64, 64));
        let mut text = renderer(ctx);

        text.set_text("").unwrap();
        assert_eq!(text.glyph_draws(), 0);
        let stats = target.draw(|t| text.draw(t)).unwrap();
        assert!(stats.is_empty());
    }

    #[test]
    fn text_is_drawn_as_one_quad_in_its_color() {
        let Some(ctx) = testing::context() else { return };
        let target = OffscreenTarget::new(ctx.clone(), Shape::new(64, 64));
        let mut text = renderer(ctx);
        text.set_text("HI").unwrap();
        text.set_color(Color::RED);
        text.set_origin(Vec4::new(-0.5, -0.5, 0.0, 1.0));

        let stats = target.draw(|t| text.draw(t)).unwrap();

        assert_eq!(stats.len(), 1);
        assert_eq!(stats.draw_calls[0].kind, RendererKind::Text);
        assert_eq!(stats.draw_calls[0].color, Color::RED);
    }

    #[test]
    fn oversized_text_is_rejected() {
        let Some(ctx) = testing::context() else { return };
        let max = ctx.limits().max_texture_dimension_2d as usize;
        let mut text = renderer(ctx);

        let err = text.set_text(&"W".repeat(max / 11 + 8)).unwrap_err();
        assert!(matches!(err, Error::IncompleteAttachment(_)));
    }
}
