use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::coords::{Color, Pose};
use crate::device::SharedContext;
use crate::error::{Error, Result};
use crate::gpu::GpuVector;
use crate::mesh::compute;
use crate::view::{SharedView, View};

use super::common::{
    draw_layout, position_layout, render_pipeline, uniform_bind_group, DepthMode, DrawUniform,
    PipelineDesc, UniformSlot, FLAT_SHADER,
};
use super::{Colored, DrawCall, Drawable, Posed, RenderTarget, RendererKind};

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct LineParams {
    count: u32,
    normalize_normals: u32,
    _pad: [u32; 2],
}

/// Draws one line segment per point, from the point along its normal.
///
/// Segments are generated on the GPU by [`set_normals`](Self::set_normals)
/// and drawn on top of the scene.
pub struct NormalsRenderer {
    ctx: SharedContext,
    view: SharedView,
    pose: Pose,
    color: Color,
    lines: GpuVector<Vec3>,
    uniform: UniformSlot<DrawUniform>,
}

impl NormalsRenderer {
    pub const DEFAULT_COLOR: Color = Color {
        r: 0.3,
        g: 0.5,
        b: 1.0,
        a: 1.0,
    };

    pub fn new(ctx: SharedContext, view: SharedView) -> Self {
        Self {
            lines: GpuVector::labeled(ctx.clone(), "ocular normal lines"),
            ctx,
            view,
            pose: Pose::IDENTITY,
            color: Self::DEFAULT_COLOR,
            uniform: UniformSlot::new("ocular normals uniform"),
        }
    }

    /// Generates `2 * n` line vertices: each point, then the point plus its
    /// normal (normalized first if `normalize` is set).
    ///
    /// `points` and `normals` must have the same length.
    pub fn set_normals(
        &mut self,
        points: &GpuVector<Vec3>,
        normals: &GpuVector<Vec3>,
        normalize: bool,
    ) -> Result<()> {
        if points.len() != normals.len() {
            return Err(Error::SizeMismatch {
                what: "normals",
                expected: points.len(),
                actual: normals.len(),
            });
        }
        points.ensure_unmapped()?;
        normals.ensure_unmapped()?;
        self.lines.ensure_unmapped()?;

        let n = points.len();
        self.lines.resize(2 * n);
        let (Some(p), Some(nb), Some(lines)) = (points.binding(), normals.binding(), self.lines.binding())
        else {
            return Ok(());
        };

        let ctx = &self.ctx;
        let layout = ctx.bind_group_layout(
            "ocular normal lines layout",
            &[
                compute::storage_entry(0, true),
                compute::storage_entry(1, true),
                compute::storage_entry(2, false),
                compute::params_entry(3),
            ],
        );
        let pipeline = ctx.compute_pipeline(
            "ocular normal lines",
            include_str!("shaders/normal_lines.wgsl"),
            &layout,
        );
        let params = compute::params_buffer(
            ctx,
            "ocular normal lines params",
            &LineParams {
                count: n as u32,
                normalize_normals: normalize as u32,
                _pad: [0; 2],
            },
        );
        let bind_group = ctx.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ocular normal lines"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: p },
                wgpu::BindGroupEntry { binding: 1, resource: nb },
                wgpu::BindGroupEntry { binding: 2, resource: lines },
                wgpu::BindGroupEntry { binding: 3, resource: params.as_entire_binding() },
            ],
        });

        let mut encoder = ctx.create_encoder("ocular normal lines");
        compute::dispatch(ctx, &mut encoder, "ocular normal lines", &pipeline, &bind_group, n as u32);
        ctx.submit(encoder);
        Ok(())
    }

    /// Generated line vertices.
    pub fn lines(&self) -> &GpuVector<Vec3> {
        &self.lines
    }

    /// Drops the generated lines; nothing is drawn until normals are set again.
    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

impl Posed for NormalsRenderer {
    fn pose(&self) -> Pose {
        self.pose
    }

    fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
    }
}

impl Colored for NormalsRenderer {
    fn color(&self) -> Color {
        self.color
    }

    fn set_color(&mut self, color: Color) {
        self.color = color;
    }
}

impl Drawable for NormalsRenderer {
    fn kind(&self) -> RendererKind {
        RendererKind::Normals
    }

    fn view(&self) -> SharedView {
        self.view.clone()
    }

    fn set_view(&mut self, view: SharedView) {
        self.view = view;
    }

    fn draw_with_view(&mut self, target: &mut RenderTarget<'_>, view: &dyn View) -> Result<()> {
        self.lines.ensure_unmapped()?;
        let Some(vertices) = self.lines.slice() else { return Ok(()) };

        let layout = draw_layout(&self.ctx);
        let pipeline = render_pipeline(
            &self.ctx,
            target,
            &PipelineDesc {
                name: "ocular normals",
                shader: FLAT_SHADER,
                layout: &layout,
                buffers: &[position_layout()],
                topology: wgpu::PrimitiveTopology::LineList,
                depth: DepthMode::Overlay,
            },
        );

        let transform = view.view_matrix() * self.pose.matrix();
        let uniform = self.uniform.write(&self.ctx, &DrawUniform::new(transform, self.color));
        let bind_group = uniform_bind_group(&self.ctx, "ocular normals", &layout, uniform);
        let count = self.lines.len() as u32;

        {
            let mut pass = target.begin_load_pass("ocular normals pass");
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_vertex_buffer(0, vertices);
            pass.draw(0..count, 0..1);
        }

        target.record(DrawCall {
            kind: RendererKind::Normals,
            topology: wgpu::PrimitiveTopology::LineList,
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
    use crate::testing;
    use crate::view::{shared, ScreenView};

    #[test]
    fn lines_run_from_point_along_normal() {
        let Some(ctx) = testing::context() else { return };
        let points = GpuVector::from_slice(ctx.clone(), &[Vec3::ZERO, Vec3::X]);
        let normals = GpuVector::from_slice(ctx.clone(), &[Vec3::Z * 2.0, Vec3::Y]);
        let mut renderer = NormalsRenderer::new(ctx, shared(ScreenView::new()));

        renderer.set_normals(&points, &normals, false).unwrap();
        let lines = renderer.lines().to_vec().unwrap();
        assert_eq!(lines, vec![Vec3::ZERO, Vec3::Z * 2.0, Vec3::X, Vec3::X + Vec3::Y]);

        renderer.set_normals(&points, &normals, true).unwrap();
        let lines = renderer.lines().to_vec().unwrap();
        assert_eq!(lines[1], Vec3::Z);
    }

    #[test]
    fn mismatched_counts_are_rejected() {
        let Some(ctx) = testing::context() else { return };
        let points = GpuVector::from_slice(ctx.clone(), &[Vec3::ZERO; 3]);
        let normals = GpuVector::from_slice(ctx.clone(), &[Vec3::Z; 2]);
        let mut renderer = NormalsRenderer::new(ctx, shared(ScreenView::new()));

        let err = renderer.set_normals(&points, &normals, true).unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { expected: 3, actual: 2, .. }));
        assert!(renderer.lines().is_empty());
    }

    #[test]
    fn default_color() {
        let Some(ctx) = testing::context() else { return };
        let renderer = NormalsRenderer::new(ctx, shared(ScreenView::new()));
        assert_eq!(renderer.color(), Color::rgba(0.3, 0.5, 1.0, 1.0));
    }
}
