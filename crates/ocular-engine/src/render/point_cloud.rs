use glam::Vec3;

use crate::coords::{Color, Pose};
use crate::device::SharedContext;
use crate::error::Result;
use crate::gpu::GpuVector;
use crate::view::{SharedView, View};

use super::common::{
    draw_layout, position_layout, render_pipeline, uniform_bind_group, DepthMode, DrawUniform,
    PipelineDesc, UniformSlot, FLAT_SHADER,
};
use super::{Colored, DrawCall, Drawable, NormalsRenderer, Posed, RenderTarget, RendererKind};

/// Draws points as single pixels in one color, on top of the scene.
///
/// Normals set with [`set_normals`](Self::set_normals) are drawn after the
/// points by a nested [`NormalsRenderer`] that follows this renderer's view,
/// pose and color. Any change to the points drops those normals; set them
/// again for the new points.
pub struct PointCloudRenderer {
    ctx: SharedContext,
    view: SharedView,
    pose: Pose,
    color: Color,
    points: GpuVector<Vec3>,
    normals: Option<NormalsRenderer>,
    uniform: UniformSlot<DrawUniform>,
}

impl PointCloudRenderer {
    pub const DEFAULT_COLOR: Color = Color {
        r: 0.7,
        g: 0.7,
        b: 1.0,
        a: 1.0,
    };

    pub fn new(ctx: SharedContext, view: SharedView) -> Self {
        Self {
            points: GpuVector::labeled(ctx.clone(), "ocular point cloud"),
            ctx,
            view,
            pose: Pose::IDENTITY,
            color: Self::DEFAULT_COLOR,
            normals: None,
            uniform: UniformSlot::new("ocular point cloud uniform"),
        }
    }

    pub fn with_color(ctx: SharedContext, view: SharedView, color: Color) -> Self {
        let mut renderer = Self::new(ctx, view);
        renderer.set_color(color);
        renderer
    }

    pub fn points(&self) -> &GpuVector<Vec3> {
        &self.points
    }

    /// Direct access for filling the points on the GPU.
    pub fn points_mut(&mut self) -> &mut GpuVector<Vec3> {
        self.clear_normals();
        &mut self.points
    }

    /// Sets the point count to `n`. Storage is only reallocated when `n`
    /// exceeds the current capacity; it never shrinks.
    pub fn allocate_points(&mut self, n: usize) {
        self.clear_normals();
        self.points.resize(n);
    }

    pub fn set_points(&mut self, points: &[Vec3]) {
        self.clear_normals();
        self.points.set_data(points);
    }

    /// Copies points from another GPU vector without a host round trip.
    pub fn set_points_from(&mut self, points: &GpuVector<Vec3>) -> Result<()> {
        self.clear_normals();
        self.points.copy_from(points)
    }

    fn clear_normals(&mut self) {
        if let Some(normals) = self.normals.as_mut() {
            normals.clear();
        }
    }

    /// Sets one normal per point. Fails with a size mismatch if `normals`
    /// does not have one entry per point.
    pub fn set_normals(&mut self, normals: &GpuVector<Vec3>, normalize: bool) -> Result<()> {
        let nested = self.normals.get_or_insert_with(|| {
            let mut renderer = NormalsRenderer::new(self.ctx.clone(), self.view.clone());
            renderer.set_pose(self.pose);
            renderer.set_color(self.color);
            renderer
        });
        nested.set_normals(&self.points, normals, normalize)
    }

    /// Uploads `normals` and sets them as with [`set_normals`](Self::set_normals).
    pub fn set_normals_from_slice(&mut self, normals: &[Vec3], normalize: bool) -> Result<()> {
        let normals = GpuVector::from_slice(self.ctx.clone(), normals);
        self.set_normals(&normals, normalize)
    }

    pub fn normals_renderer(&self) -> Option<&NormalsRenderer> {
        self.normals.as_ref()
    }
}

impl Posed for PointCloudRenderer {
    fn pose(&self) -> Pose {
        self.pose
    }

    fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
        if let Some(normals) = self.normals.as_mut() {
            normals.set_pose(pose);
        }
    }
}

impl Colored for PointCloudRenderer {
    fn color(&self) -> Color {
        self.color
    }

    fn set_color(&mut self, color: Color) {
        self.color = color;
        if let Some(normals) = self.normals.as_mut() {
            normals.set_color(color);
        }
    }
}

impl Drawable for PointCloudRenderer {
    fn kind(&self) -> RendererKind {
        RendererKind::PointCloud
    }

    fn view(&self) -> SharedView {
        self.view.clone()
    }

    fn set_view(&mut self, view: SharedView) {
        if let Some(normals) = self.normals.as_mut() {
            normals.set_view(view.clone());
        }
        self.view = view;
    }

    fn draw_with_view(&mut self, target: &mut RenderTarget<'_>, view: &dyn View) -> Result<()> {
        self.points.ensure_unmapped()?;
        let Some(vertices) = self.points.slice() else { return Ok(()) };

        let layout = draw_layout(&self.ctx);
        let pipeline = render_pipeline(
            &self.ctx,
            target,
            &PipelineDesc {
                name: "ocular points",
                shader: FLAT_SHADER,
                layout: &layout,
                buffers: &[position_layout()],
                topology: wgpu::PrimitiveTopology::PointList,
                depth: DepthMode::Overlay,
            },
        );

        let transform = view.view_matrix() * self.pose.matrix();
        let uniform = self.uniform.write(&self.ctx, &DrawUniform::new(transform, self.color));
        let bind_group = uniform_bind_group(&self.ctx, "ocular points", &layout, uniform);
        let count = self.points.len() as u32;

        {
            let mut pass = target.begin_load_pass("ocular points pass");
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.set_vertex_buffer(0, vertices);
            pass.draw(0..count, 0..1);
        }

        target.record(DrawCall {
            kind: RendererKind::PointCloud,
            topology: wgpu::PrimitiveTopology::PointList,
            vertex_count: count,
            color: self.color,
        });

        if let Some(normals) = self.normals.as_mut() {
            normals.draw_with_view(target, view)?;
        }
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
    use crate::error::Error;
    use crate::testing;
    use crate::view::{shared, ScreenView};

    const TRIANGLE: [Vec3; 3] = [
        Vec3::new(0.0, 0.0, -1.0),
        Vec3::new(1.0, 0.0, -1.0),
        Vec3::new(0.0, 1.0, -1.0),
    ];

    fn setup() -> Option<(OffscreenTarget, PointCloudRenderer)> {
        let ctx = testing::context()?;
        let target = OffscreenTarget::new(ctx.clone(), Shape::new(64, 64));
        let renderer = PointCloudRenderer::new(ctx, shared(ScreenView::new()));
        Some((target, renderer))
    }

    // ── drawing ───────────────────────────────────────────────────────────

    #[test]
    fn empty_cloud_issues_no_draw() {
        let Some((target, mut cloud)) = setup() else { return };
        let stats = target.draw(|t| cloud.draw(t)).unwrap();
        assert!(stats.is_empty());
    }

    #[test]
    fn three_points_issue_three_point_primitives() {
        let Some((target, mut cloud)) = setup() else { return };
        cloud.set_points(&TRIANGLE);

        let stats = target.draw(|t| cloud.draw(t)).unwrap();

        assert_eq!(stats.len(), 1);
        let call = stats.draw_calls[0];
        assert_eq!(call.kind, RendererKind::PointCloud);
        assert_eq!(call.topology, wgpu::PrimitiveTopology::PointList);
        assert_eq!(call.vertex_count, 3);
        assert_eq!(call.color, Color::rgb(0.7, 0.7, 1.0));
    }

    #[test]
    fn normals_are_drawn_after_points() {
        let Some((target, mut cloud)) = setup() else { return };
        cloud.set_points(&TRIANGLE);
        cloud.set_normals_from_slice(&[Vec3::Z; 3], true).unwrap();

        let stats = target.draw(|t| cloud.draw(t)).unwrap();

        let kinds: Vec<_> = stats.draw_calls.iter().map(|c| c.kind).collect();
        assert_eq!(kinds, vec![RendererKind::PointCloud, RendererKind::Normals]);
        assert_eq!(stats.draw_calls[1].vertex_count, 6);
    }

    #[test]
    fn new_points_drop_stale_normals() {
        let Some((target, mut cloud)) = setup() else { return };
        cloud.set_points(&TRIANGLE);
        cloud.set_normals_from_slice(&[Vec3::Z; 3], false).unwrap();

        cloud.set_points(&[Vec3::ZERO]);
        let stats = target.draw(|t| cloud.draw(t)).unwrap();

        assert_eq!(stats.len(), 1);
        assert_eq!(stats.draw_calls[0].kind, RendererKind::PointCloud);
        assert_eq!(stats.draw_calls[0].vertex_count, 1);
        assert!(cloud.normals_renderer().unwrap().lines().is_empty());

        cloud.set_normals_from_slice(&[Vec3::X], false).unwrap();
        let stats = target.draw(|t| cloud.draw(t)).unwrap();
        assert_eq!(stats.of_kind(RendererKind::Normals).next().unwrap().vertex_count, 2);
    }

    #[test]
    fn repeated_draws_keep_their_own_transform() {
        let Some((target, mut cloud)) = setup() else { return };
        // Lands on the center of pixel (32, 32) of the 64x64 target.
        cloud.set_points(&[Vec3::new(1.0 / 64.0, -1.0 / 64.0, 0.0)]);
        let left = ScreenView::new();
        let right = ScreenView::with_projection(glam::Mat4::from_translation(Vec3::new(0.5, 0.0, 0.0)));

        let stats = target
            .draw(|t| {
                cloud.draw_with_view(t, &left)?;
                cloud.draw_with_view(t, &right)
            })
            .unwrap();
        assert_eq!(stats.of_kind(RendererKind::PointCloud).count(), 2);

        let pixels = target.read_pixels().unwrap();
        assert_ne!(pixels[32 * 64 + 32][3], 0);
        assert_ne!(pixels[32 * 64 + 48][3], 0);
    }

    // ── configuration ─────────────────────────────────────────────────────

    #[test]
    fn normal_count_must_match_points() {
        let Some((_target, mut cloud)) = setup() else { return };
        cloud.set_points(&TRIANGLE);
        let err = cloud.set_normals_from_slice(&[Vec3::Z; 2], false).unwrap_err();
        assert!(matches!(err, Error::SizeMismatch { expected: 3, actual: 2, .. }));
    }

    #[test]
    fn pose_and_color_reach_nested_normals() {
        let Some((_target, mut cloud)) = setup() else { return };
        cloud.set_points(&TRIANGLE);
        cloud.set_normals_from_slice(&[Vec3::Z; 3], false).unwrap();

        let pose = Pose::from_translation(Vec3::new(0.0, 0.0, 5.0));
        cloud.set_pose(pose);
        cloud.set_color(Color::rgb(2.0, 0.5, -1.0));

        let normals = cloud.normals_renderer().unwrap();
        assert_eq!(normals.pose(), pose);
        assert_eq!(normals.color(), Color::rgb(1.0, 0.5, 0.0));
    }

    #[test]
    fn allocate_points_never_shrinks_storage() {
        let Some((_target, mut cloud)) = setup() else { return };
        cloud.allocate_points(100);
        let generation = cloud.points().generation();

        cloud.allocate_points(10);
        assert_eq!(cloud.points().len(), 10);
        assert_eq!(cloud.points().capacity(), 100);
        assert_eq!(cloud.points().generation(), generation);
    }

    #[test]
    fn points_copy_from_gpu_vector() {
        let Some((_target, mut cloud)) = setup() else { return };
        let source = GpuVector::from_slice(cloud.points().context().clone(), &TRIANGLE);
        cloud.set_points_from(&source).unwrap();
        assert_eq!(cloud.points().to_vec().unwrap(), TRIANGLE.to_vec());
    }
}
