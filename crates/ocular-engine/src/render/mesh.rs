use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use crate::coords::{Color, Pose};
use crate::device::SharedContext;
use crate::error::Result;
use crate::mesh::{GpuMesh, Mesh};
use crate::view::{SharedView, View};

use super::common::{
    position_layout, render_pipeline, uniform_bind_group, uniform_layout, DepthMode, PipelineDesc,
    UniformSlot,
};
use super::{Colored, DrawCall, Drawable, Posed, RenderTarget, RendererKind};

const MESH_SHADER: (&str, &str) = ("ocular mesh", include_str!("shaders/mesh.wgsl"));

const NORMAL_ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x3];

fn normal_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<[f32; 3]>() as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &NORMAL_ATTRS,
    }
}

/// Mesh uniform (144 bytes): clip transform, model matrix for rotating
/// normals, premultiplied color.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct MeshUniform {
    transform: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
    color: [f32; 4],
}

/// Draws a triangle mesh with flat lighting and depth testing.
///
/// Meshes without one normal per point get flat normals computed on the GPU
/// before they are drawn, which expands them into a plain triangle list.
pub struct MeshRenderer {
    ctx: SharedContext,
    view: SharedView,
    pose: Pose,
    color: Color,
    mesh: GpuMesh,
    uniform: UniformSlot<MeshUniform>,
}

impl MeshRenderer {
    pub fn new(ctx: SharedContext, view: SharedView) -> Self {
        Self {
            mesh: GpuMesh::new(ctx.clone()),
            ctx,
            view,
            pose: Pose::IDENTITY,
            color: Color::WHITE,
            uniform: UniformSlot::new("ocular mesh uniform"),
        }
    }

    /// Uploads `mesh` and derives its flat normals.
    pub fn set_mesh(&mut self, mesh: &Mesh) -> Result<()> {
        self.mesh.set_mesh(mesh);
        self.mesh.compute_normals()
    }

    pub fn mesh(&self) -> &GpuMesh {
        &self.mesh
    }

    /// Direct access for filling the mesh on the GPU.
    pub fn mesh_mut(&mut self) -> &mut GpuMesh {
        &mut self.mesh
    }
}

impl Posed for MeshRenderer {
    fn pose(&self) -> Pose {
        self.pose
    }

    fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
    }
}

impl Colored for MeshRenderer {
    fn color(&self) -> Color {
        self.color
    }

    fn set_color(&mut self, color: Color) {
        self.color = color;
    }
}

impl Drawable for MeshRenderer {
    fn kind(&self) -> RendererKind {
        RendererKind::Mesh
    }

    fn view(&self) -> SharedView {
        self.view.clone()
    }

    fn set_view(&mut self, view: SharedView) {
        self.view = view;
    }

    fn draw_with_view(&mut self, target: &mut RenderTarget<'_>, view: &dyn View) -> Result<()> {
        if self.mesh.points().is_empty() {
            return Ok(());
        }
        if self.mesh.normals().len() != self.mesh.points().len() {
            self.mesh.compute_normals()?;
        }

        let mesh = &self.mesh;
        mesh.points().ensure_unmapped()?;
        mesh.normals().ensure_unmapped()?;
        mesh.faces().ensure_unmapped()?;
        let (Some(points), Some(normals)) = (mesh.points().slice(), mesh.normals().slice()) else {
            return Ok(());
        };

        let layout = uniform_layout::<MeshUniform>(&self.ctx, "ocular mesh layout");
        let pipeline = render_pipeline(
            &self.ctx,
            target,
            &PipelineDesc {
                name: "ocular mesh",
                shader: MESH_SHADER,
                layout: &layout,
                buffers: &[position_layout(), normal_layout()],
                topology: wgpu::PrimitiveTopology::TriangleList,
                depth: DepthMode::Test,
            },
        );

        let model: Mat4 = self.pose.matrix();
        let value = MeshUniform {
            transform: (view.view_matrix() * model).to_cols_array_2d(),
            model: model.to_cols_array_2d(),
            color: self.color.premultiplied(),
        };
        let uniform = self.uniform.write(&self.ctx, &value);
        let bind_group = uniform_bind_group(&self.ctx, "ocular mesh", &layout, uniform);

        let indices = mesh.faces().slice();
        let count = match indices {
            Some(_) => (mesh.faces().len() * 3) as u32,
            None => mesh.points().len() as u32,
        };

        {
            let mut pass = target.begin_load_pass("ocular mesh pass");
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_vertex_buffer(0, points);
            pass.set_vertex_buffer(1, normals);
            match indices {
                Some(indices) => {
                    pass.set_index_buffer(indices, wgpu::IndexFormat::Uint32);
                    pass.draw_indexed(0..count, 0, 0..1);
                }
                None => pass.draw(0..count, 0..1),
            }
        }

        target.record(DrawCall {
            kind: RendererKind::Mesh,
            topology: wgpu::PrimitiveTopology::TriangleList,
            vertex_count: count,
            color: self.color,
        });
        Ok(())
    }

    fn as_posed_mut(&mut self) -> Option<&mut dyn Posed> {
        Some(self)
    }

    fn as_colored_mut(&mut self) -> Option<&mut dyn Colored> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::Shape;
    use crate::display::OffscreenTarget;
    use crate::testing;
    use crate::view::{shared, View3D};
    use glam::Vec3;

    fn setup() -> Option<(OffscreenTarget, MeshRenderer)> {
        let ctx = testing::context()?;
        let target = OffscreenTarget::new(ctx.clone(), Shape::new(64, 64));
        let mut camera = View3D::pinhole(60.0);
        camera.look_at(Vec3::ZERO, Vec3::new(0.0, -5.0, 0.0), Vec3::Z);
        let renderer = MeshRenderer::new(ctx, shared(camera));
        Some((target, renderer))
    }

    #[test]
    fn mesh_uniform_is_144_bytes() {
        assert_eq!(std::mem::size_of::<MeshUniform>(), 144);
    }

    #[test]
    fn empty_mesh_issues_no_draw() {
        let Some((target, mut renderer)) = setup() else { return };
        let stats = target.draw(|t| renderer.draw(t)).unwrap();
        assert!(stats.is_empty());
    }

    #[test]
    fn cube_draws_twelve_triangles() {
        let Some((target, mut renderer)) = setup() else { return };
        renderer.set_mesh(&Mesh::cube(1.0)).unwrap();
        assert_eq!(renderer.mesh().normals().len(), 36);

        let stats = target.draw(|t| renderer.draw(t)).unwrap();

        assert_eq!(stats.len(), 1);
        let call = stats.draw_calls[0];
        assert_eq!(call.kind, RendererKind::Mesh);
        assert_eq!(call.topology, wgpu::PrimitiveTopology::TriangleList);
        assert_eq!(call.vertex_count, 36);
        assert_eq!(call.color, Color::WHITE);
    }

    #[test]
    fn points_filled_on_gpu_get_normals_at_draw() {
        let Some((target, mut renderer)) = setup() else { return };
        renderer
            .mesh_mut()
            .points_mut()
            .set_data(&[Vec3::ZERO, Vec3::X, Vec3::Z]);

        let stats = target.draw(|t| renderer.draw(t)).unwrap();

        assert_eq!(stats.draw_calls[0].vertex_count, 3);
        let normals = renderer.mesh().normals().to_vec().unwrap();
        for n in normals {
            assert!((n - Vec3::NEG_Y).length() < 1e-5);
        }
    }
}
