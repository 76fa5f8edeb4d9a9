use wgpu::PrimitiveTopology;

use crate::coords::{Color, Shape};

use super::{RendererKind, DEPTH_FORMAT};

/// One draw issued by a renderer.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DrawCall {
    pub kind: RendererKind,
    pub topology: PrimitiveTopology,
    /// Vertices (or indices, for indexed draws) submitted.
    pub vertex_count: u32,
    /// Color uniform the draw was issued with.
    pub color: Color,
}

/// Draws recorded while rendering one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    pub draw_calls: Vec<DrawCall>,
}

impl FrameStats {
    pub fn is_empty(&self) -> bool {
        self.draw_calls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.draw_calls.len()
    }

    /// Draws issued by renderers of `kind`.
    pub fn of_kind(&self, kind: RendererKind) -> impl Iterator<Item = &DrawCall> {
        self.draw_calls.iter().filter(move |c| c.kind == kind)
    }
}

/// Where renderers draw: the frame's encoder and attachments.
pub struct RenderTarget<'a> {
    pub encoder: &'a mut wgpu::CommandEncoder,
    pub color_view: &'a wgpu::TextureView,
    pub color_format: wgpu::TextureFormat,
    /// Depth attachment in [`DEPTH_FORMAT`], if any.
    pub depth_view: Option<&'a wgpu::TextureView>,
    /// Size of the attachments in physical pixels.
    pub screen: Shape,
    pub stats: &'a mut FrameStats,
}

impl<'a> RenderTarget<'a> {
    pub fn new(
        encoder: &'a mut wgpu::CommandEncoder,
        color_view: &'a wgpu::TextureView,
        color_format: wgpu::TextureFormat,
        depth_view: Option<&'a wgpu::TextureView>,
        screen: Shape,
        stats: &'a mut FrameStats,
    ) -> Self {
        Self {
            encoder,
            color_view,
            color_format,
            depth_view,
            screen,
            stats,
        }
    }

    pub fn depth_format(&self) -> Option<wgpu::TextureFormat> {
        self.depth_view.map(|_| DEPTH_FORMAT)
    }

    pub fn record(&mut self, call: DrawCall) {
        self.stats.draw_calls.push(call);
    }

    /// Opens a pass that keeps the attachments' contents.
    pub(crate) fn begin_load_pass(&mut self, label: &str) -> wgpu::RenderPass<'_> {
        let color_view = self.color_view;
        let depth_view = self.depth_view;
        self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: depth_view.map(|view| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        })
    }
}
