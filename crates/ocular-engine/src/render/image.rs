use std::cell::RefCell;
use std::rc::Rc;

use wgpu::util::DeviceExt;

use crate::coords::{Color, Shape};
use crate::device::{GpuContext, SharedContext};
use crate::error::Result;
use crate::gpu::{GpuTexture, GpuVector, Texel};
use crate::view::{ImageView, SharedView, View};

use super::common::{
    render_pipeline, textured_bind_group, textured_layout, DepthMode, DrawUniform, PipelineDesc,
    TexturedVertex, UniformSlot, QUAD_INDICES, TEXTURED_SHADER,
};
use super::{Colored, DrawCall, Drawable, RenderTarget, RendererKind};

/// Quad spanning clip space `[-1, 1]`, image top row at the top.
#[rustfmt::skip]
const IMAGE_QUAD: [TexturedVertex; 4] = [
    TexturedVertex { pos: [-1.0, -1.0, 0.0], uv: [0.0, 1.0] },
    TexturedVertex { pos: [ 1.0, -1.0, 0.0], uv: [1.0, 1.0] },
    TexturedVertex { pos: [ 1.0,  1.0, 0.0], uv: [1.0, 0.0] },
    TexturedVertex { pos: [-1.0,  1.0, 0.0], uv: [0.0, 0.0] },
];

/// Static vertex and index buffers of a textured quad.
pub(super) struct QuadBuffers {
    pub vertices: wgpu::Buffer,
    pub indices: wgpu::Buffer,
}

impl QuadBuffers {
    pub(super) fn new(ctx: &GpuContext, label: &str, corners: &[TexturedVertex; 4]) -> Self {
        let vertices = ctx.device().create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(corners),
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        });
        let indices = ctx.device().create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self { vertices, indices }
    }
}

/// Draws an image fitted into the screen with its aspect ratio preserved.
///
/// The renderer's default view is its own [`ImageView`], which tracks the
/// shape of the current image.
pub struct ImageRenderer {
    ctx: SharedContext,
    view: SharedView,
    image_view: Rc<RefCell<ImageView>>,
    color: Color,
    texture: GpuTexture,
    quad: Option<QuadBuffers>,
    uniform: UniformSlot<DrawUniform>,
}

impl ImageRenderer {
    pub fn new(ctx: SharedContext) -> Self {
        let image_view = Rc::new(RefCell::new(ImageView::default()));
        Self {
            texture: GpuTexture::labeled(ctx.clone(), "ocular image"),
            ctx,
            view: image_view.clone(),
            image_view,
            color: Color::WHITE,
            quad: None,
            uniform: UniformSlot::new("ocular image uniform"),
        }
    }

    /// The view fitting the current image, shared so other renderers can
    /// draw over the image in its pixel frame.
    pub fn image_view(&self) -> Rc<RefCell<ImageView>> {
        self.image_view.clone()
    }

    pub fn texture(&self) -> &GpuTexture {
        &self.texture
    }

    /// Direct access to the texture. Call [`sync_view`](Self::sync_view)
    /// after changing its shape.
    pub fn texture_mut(&mut self) -> &mut GpuTexture {
        &mut self.texture
    }

    pub fn set_image<T: Texel>(&mut self, shape: Shape, data: &[T]) -> Result<()> {
        self.texture.set_image(shape, data)?;
        self.sync_view();
        Ok(())
    }

    pub fn set_image_from_vector<T: Texel>(&mut self, shape: Shape, pixels: &GpuVector<T>) -> Result<()> {
        self.texture.set_image_from_vector(shape, pixels)?;
        self.sync_view();
        Ok(())
    }

    /// Decodes and shows the image file at `path`.
    pub fn load(&mut self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let decoded = crate::gpu::DecodedImage::open(path)?;
        self.texture.set_decoded(&decoded)?;
        self.sync_view();
        Ok(())
    }

    /// Matches the image view to the texture's shape.
    pub fn sync_view(&mut self) {
        let shape = self.texture.shape();
        if !shape.is_empty() {
            self.image_view.borrow_mut().set_image_shape(shape);
        }
    }
}

impl Colored for ImageRenderer {
    fn color(&self) -> Color {
        self.color
    }

    fn set_color(&mut self, color: Color) {
        self.color = color;
    }
}

impl Drawable for ImageRenderer {
    fn kind(&self) -> RendererKind {
        RendererKind::Image
    }

    fn view(&self) -> SharedView {
        self.view.clone()
    }

    fn set_view(&mut self, view: SharedView) {
        self.view = view;
    }

    fn draw_with_view(&mut self, target: &mut RenderTarget<'_>, view: &dyn View) -> Result<()> {
        let Some(binding) = self.texture.binding() else { return Ok(()) };

        let layout = textured_layout(&self.ctx);
        let pipeline = render_pipeline(
            &self.ctx,
            target,
            &PipelineDesc {
                name: "ocular image",
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
            .get_or_insert_with(|| QuadBuffers::new(ctx, "ocular image quad", &IMAGE_QUAD));
        let uniform = self
            .uniform
            .write(ctx, &DrawUniform::new(view.view_matrix(), self.color));
        let bind_group = textured_bind_group(ctx, "ocular image", &layout, uniform, &binding);
        let count = QUAD_INDICES.len() as u32;

        {
            let mut pass = target.begin_load_pass("ocular image pass");
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_vertex_buffer(0, quad.vertices.slice(..));
            pass.set_index_buffer(quad.indices.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..count, 0, 0..1);
        }

        target.record(DrawCall {
            kind: RendererKind::Image,
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
    use crate::error::Error;
    use crate::testing;

    fn setup() -> Option<(OffscreenTarget, ImageRenderer)> {
        let ctx = testing::context()?;
        let target = OffscreenTarget::new(ctx.clone(), Shape::new(32, 32));
        Some((target, ImageRenderer::new(ctx)))
    }

    #[test]
    fn no_image_draws_nothing() {
        let Some((target, mut renderer)) = setup() else { return };
        let stats = target.draw(|t| renderer.draw(t)).unwrap();
        assert!(stats.is_empty());
    }

    #[test]
    fn image_draws_one_quad_and_fits_view() {
        let Some((target, mut renderer)) = setup() else { return };
        renderer.set_image(Shape::new(4, 2), &[[255u8, 0, 0]; 8]).unwrap();
        assert_eq!(renderer.image_view().borrow().image_shape(), Shape::new(4, 2));

        let stats = target.draw(|t| renderer.draw(t)).unwrap();

        assert_eq!(stats.len(), 1);
        assert_eq!(stats.draw_calls[0].kind, RendererKind::Image);
        assert_eq!(stats.draw_calls[0].vertex_count, 6);
    }

    #[test]
    fn image_shows_its_pixels() {
        let Some((target, mut renderer)) = setup() else { return };
        renderer.set_image(Shape::new(2, 2), &[[0u8, 255, 0, 255]; 4]).unwrap();

        target.draw(|t| renderer.draw(t)).unwrap();

        let pixels = target.read_pixels().unwrap();
        assert_eq!(pixels[16 * 32 + 16], [0, 255, 0, 255]);
    }

    #[test]
    fn mismatched_image_keeps_view() {
        let Some((_target, mut renderer)) = setup() else { return };
        renderer.set_image(Shape::new(3, 1), &[0.5f32; 3]).unwrap();
        let err = renderer.set_image(Shape::new(2, 2), &[0.5f32; 3]).unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { .. }));
        assert_eq!(renderer.image_view().borrow().image_shape(), Shape::new(3, 1));
    }
}
