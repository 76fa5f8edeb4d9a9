use crate::coords::{Color, Shape};
use crate::device::SharedContext;
use crate::error::{Error, Result};
use crate::render::{FrameStats, RenderTarget, SharedRenderer};
use crate::view::SharedView;

use super::frame::{render_frame, DepthTexture, FrameTargets};

/// A window-less render target: an RGBA8 color texture plus depth.
///
/// Renders the same frame sequence as a display and can read the result
/// back, which makes it the target for headless rendering and tests.
pub struct OffscreenTarget {
    ctx: SharedContext,
    shape: Shape,
    color: wgpu::Texture,
    color_view: wgpu::TextureView,
    depth: DepthTexture,
    clear_color: Color,
}

impl OffscreenTarget {
    pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

    pub fn new(ctx: SharedContext, shape: Shape) -> Self {
        let color = ctx.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("ocular offscreen"),
            size: wgpu::Extent3d {
                width: shape.width.max(1),
                height: shape.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth = DepthTexture::new(&ctx, shape);

        Self {
            ctx,
            shape,
            color,
            color_view,
            depth,
            clear_color: Color::rgba(0.0, 0.0, 0.0, 0.0),
        }
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }

    pub fn targets(&self) -> FrameTargets<'_> {
        FrameTargets {
            color_view: &self.color_view,
            color_format: Self::FORMAT,
            depth_view: self.depth.view(),
            shape: self.shape,
        }
    }

    /// Renders `renderers` as a display would.
    pub fn render(&self, views: &[SharedView], renderers: &[SharedRenderer]) -> Result<FrameStats> {
        render_frame(&self.ctx, views, renderers, &self.targets(), self.clear_color)
    }

    /// Clears the target and runs `draw` against it.
    ///
    /// Views are not updated; `draw` sees them as they are.
    pub fn draw<F>(&self, draw: F) -> Result<FrameStats>
    where
        F: FnOnce(&mut RenderTarget<'_>) -> Result<()>,
    {
        let mut stats = render_frame(&self.ctx, &[], &[], &self.targets(), self.clear_color)?;

        let mut encoder = self.ctx.create_encoder("ocular offscreen draw");
        {
            let mut target = RenderTarget::new(
                &mut encoder,
                &self.color_view,
                Self::FORMAT,
                Some(self.depth.view()),
                self.shape,
                &mut stats,
            );
            draw(&mut target)?;
        }
        self.ctx.submit(encoder);
        Ok(stats)
    }

    /// Reads the color texture back, row-major with the top row first.
    pub fn read_pixels(&self) -> Result<Vec<[u8; 4]>> {
        let (width, height) = (self.shape.width, self.shape.height);
        if self.shape.is_empty() {
            return Ok(Vec::new());
        }

        let row_bytes = width * 4;
        let padded_row = row_bytes.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let staging = self.ctx.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("ocular offscreen readback"),
            size: padded_row as u64 * height as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self.ctx.create_encoder("ocular offscreen readback");
        encoder.copy_texture_to_buffer(
            self.color.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &staging,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.ctx.submit(encoder);

        let slice = staging.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.ctx.wait_idle()?;
        rx.recv()
            .map_err(|e| Error::MapFailed(e.to_string()))?
            .map_err(|e| Error::MapFailed(e.to_string()))?;

        let mut pixels = Vec::with_capacity(self.shape.area());
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks_exact(padded_row as usize) {
                pixels.extend(
                    row[..row_bytes as usize]
                        .chunks_exact(4)
                        .map(|p| [p[0], p[1], p[2], p[3]]),
                );
            }
        }
        staging.unmap();
        Ok(pixels)
    }
}
