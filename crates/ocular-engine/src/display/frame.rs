use std::rc::Rc;

use crate::coords::{Color, Shape};
use crate::device::GpuContext;
use crate::error::Result;
use crate::render::{FrameStats, RenderTarget, SharedRenderer, DEPTH_FORMAT};
use crate::view::SharedView;

/// Attachments one frame is rendered into.
pub struct FrameTargets<'a> {
    pub color_view: &'a wgpu::TextureView,
    pub color_format: wgpu::TextureFormat,
    pub depth_view: &'a wgpu::TextureView,
    pub shape: Shape,
}

/// Depth attachment matching a color target's shape.
pub(crate) struct DepthTexture {
    view: wgpu::TextureView,
    shape: Shape,
}

impl DepthTexture {
    pub(crate) fn new(ctx: &GpuContext, shape: Shape) -> Self {
        let texture = ctx.device().create_texture(&wgpu::TextureDescriptor {
            label: Some("ocular depth"),
            size: wgpu::Extent3d {
                width: shape.width.max(1),
                height: shape.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        Self {
            view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
            shape,
        }
    }

    /// Reallocates when `shape` differs from the current one.
    pub(crate) fn ensure(&mut self, ctx: &GpuContext, shape: Shape) {
        if self.shape != shape {
            log::debug!("depth attachment resized to {}x{}", shape.width, shape.height);
            *self = Self::new(ctx, shape);
        }
    }

    pub(crate) fn view(&self) -> &wgpu::TextureView {
        &self.view
    }
}

/// Adds `view` unless the same view is already registered.
pub(crate) fn insert_view(views: &mut Vec<SharedView>, view: SharedView) {
    if !views.iter().any(|v| Rc::ptr_eq(v, &view)) {
        views.push(view);
    }
}

/// Renders one frame.
///
/// Pushes the target shape into every registered view and into the view
/// each renderer currently reads, clears color and depth, then lets each
/// renderer draw in order and submits the work. A renderer that
/// fails is skipped for this frame; the others still draw.
pub fn render_frame(
    ctx: &GpuContext,
    views: &[SharedView],
    renderers: &[SharedRenderer],
    targets: &FrameTargets<'_>,
    clear: Color,
) -> Result<FrameStats> {
    let mut sized = views.to_vec();
    for renderer in renderers {
        insert_view(&mut sized, renderer.borrow().view());
    }
    for view in &sized {
        view.borrow_mut().set_screen_size(targets.shape);
    }

    let mut encoder = ctx.create_encoder("ocular frame");
    {
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("ocular clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: targets.color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: clear.r as f64,
                        g: clear.g as f64,
                        b: clear.b as f64,
                        a: clear.a as f64,
                    }),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: targets.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
    }

    let mut stats = FrameStats::default();
    {
        let mut target = RenderTarget::new(
            &mut encoder,
            targets.color_view,
            targets.color_format,
            Some(targets.depth_view),
            targets.shape,
            &mut stats,
        );
        for renderer in renderers {
            let mut renderer = renderer.borrow_mut();
            if let Err(err) = renderer.draw(&mut target) {
                log::warn!("{:?} renderer skipped: {err}", renderer.kind());
            }
        }
    }

    ctx.submit(encoder);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{self, ScreenView, View3D};

    #[test]
    fn views_are_registered_once() {
        let screen = view::shared(ScreenView::new());
        let camera = view::shared(View3D::pinhole(45.0));
        let mut views: Vec<SharedView> = Vec::new();

        insert_view(&mut views, screen.clone());
        insert_view(&mut views, camera.clone());
        insert_view(&mut views, screen);

        assert_eq!(views.len(), 2);
    }

    #[test]
    fn depth_follows_target_shape() {
        let Some(ctx) = crate::testing::context() else { return };
        let mut depth = DepthTexture::new(&ctx, Shape::new(4, 4));
        depth.ensure(&ctx, Shape::new(8, 2));
        assert_eq!(depth.shape, Shape::new(8, 2));
    }
}
