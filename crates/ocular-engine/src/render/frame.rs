use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::coords::{Color, Pose};
use crate::device::SharedContext;
use crate::error::Result;
use crate::view::{SharedView, View};

use super::common::{
    draw_layout, render_pipeline, uniform_bind_group, DepthMode, DrawUniform, PipelineDesc, UniformSlot,
};
use super::{DrawCall, Drawable, Posed, RenderTarget, RendererKind};

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct AxisVertex {
    pos: [f32; 3],
    color: [f32; 3],
}

impl AxisVertex {
    const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<AxisVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

#[rustfmt::skip]
const AXES: [AxisVertex; 6] = [
    AxisVertex { pos: [0.0, 0.0, 0.0], color: [1.0, 0.0, 0.0] },
    AxisVertex { pos: [1.0, 0.0, 0.0], color: [1.0, 0.0, 0.0] },
    AxisVertex { pos: [0.0, 0.0, 0.0], color: [0.0, 1.0, 0.0] },
    AxisVertex { pos: [0.0, 1.0, 0.0], color: [0.0, 1.0, 0.0] },
    AxisVertex { pos: [0.0, 0.0, 0.0], color: [0.0, 0.0, 1.0] },
    AxisVertex { pos: [0.0, 0.0, 1.0], color: [0.0, 0.0, 1.0] },
];

/// Draws the unit X, Y and Z axes of its pose in red, green and blue, on top
/// of the scene.
pub struct FrameRenderer {
    ctx: SharedContext,
    view: SharedView,
    pose: Pose,
    vertices: Option<wgpu::Buffer>,
    uniform: UniformSlot<DrawUniform>,
}

impl FrameRenderer {
    pub fn new(ctx: SharedContext, view: SharedView) -> Self {
        Self {
            ctx,
            view,
            pose: Pose::IDENTITY,
            vertices: None,
            uniform: UniformSlot::new("ocular frame uniform"),
        }
    }

    fn ensure_vertices(&mut self) {
        if self.vertices.is_some() {
            return;
        }
        self.vertices = Some(self.ctx.device().create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("ocular frame vertices"),
            contents: bytemuck::cast_slice(&AXES),
            usage: wgpu::BufferUsages::VERTEX,
        }));
    }
}

impl Posed for FrameRenderer {
    fn pose(&self) -> Pose {
        self.pose
    }

    fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
    }
}

impl Drawable for FrameRenderer {
    fn kind(&self) -> RendererKind {
        RendererKind::ReferenceFrame
    }

    fn view(&self) -> SharedView {
        self.view.clone()
    }

    fn set_view(&mut self, view: SharedView) {
        self.view = view;
    }

    fn draw_with_view(&mut self, target: &mut RenderTarget<'_>, view: &dyn View) -> Result<()> {
        self.ensure_vertices();
        let Some(vertices) = self.vertices.as_ref() else { return Ok(()) };

        let layout = draw_layout(&self.ctx);
        let pipeline = render_pipeline(
            &self.ctx,
            target,
            &PipelineDesc {
                name: "ocular frame",
                shader: ("ocular axes", include_str!("shaders/axes.wgsl")),
                layout: &layout,
                buffers: &[AxisVertex::layout()],
                topology: wgpu::PrimitiveTopology::LineList,
                depth: DepthMode::Overlay,
            },
        );

        let transform = view.view_matrix() * self.pose.matrix();
        let uniform = self.uniform.write(&self.ctx, &DrawUniform::new(transform, Color::WHITE));
        let bind_group = uniform_bind_group(&self.ctx, "ocular frame", &layout, uniform);

        {
            let mut pass = target.begin_load_pass("ocular frame pass");
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_vertex_buffer(0, vertices.slice(..));
            pass.draw(0..AXES.len() as u32, 0..1);
        }

        target.record(DrawCall {
            kind: RendererKind::ReferenceFrame,
            topology: wgpu::PrimitiveTopology::LineList,
            vertex_count: AXES.len() as u32,
            color: Color::WHITE,
        });
        Ok(())
    }

    fn as_posed_mut(&mut self) -> Option<&mut dyn Posed> {
        Some(self)
    }
}
