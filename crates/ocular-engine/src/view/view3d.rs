use glam::{Mat4, Vec3, Vec4};

use crate::coords::{Pose, Shape};

use super::View;

/// Maps the camera frame (x right, y forward, z up) to the eye frame used by
/// projection matrices (x right, y up, looking down -z).
pub const CAMERA_TO_EYE: Mat4 = Mat4::from_cols(Vec4::X, Vec4::NEG_Z, Vec4::Y, Vec4::W);

/// Projection of a [`View3D`]. Depth maps to wgpu's `[0, 1]` range.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Projection {
    /// Used as given, independent of the screen shape.
    Fixed(Mat4),
    /// Pinhole camera with a vertical field of view in degrees.
    Perspective { fovy_deg: f32, near: f32, far: f32 },
    /// Parallel projection showing `2 * half_height` world units vertically.
    Orthographic { half_height: f32, near: f32, far: f32 },
}

impl Projection {
    pub fn matrix(&self, screen: Shape) -> Mat4 {
        let aspect = screen.aspect_ratio();
        match *self {
            Projection::Fixed(m) => m,
            Projection::Perspective { fovy_deg, near, far } => {
                Mat4::perspective_rh(fovy_deg.to_radians(), aspect, near, far)
            }
            Projection::Orthographic { half_height, near, far } => {
                let half_width = half_height * aspect;
                Mat4::orthographic_rh(-half_width, half_width, -half_height, half_height, near, far)
            }
        }
    }
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Fixed(Mat4::IDENTITY)
    }
}

/// A posed camera in world space.
///
/// `view_matrix = projection * CAMERA_TO_EYE * pose⁻¹`.
#[derive(Debug, Clone, Default)]
pub struct View3D {
    screen: Shape,
    pose: Pose,
    projection: Projection,
}

impl View3D {
    pub fn new(pose: Pose, projection: Projection) -> Self {
        Self {
            screen: Shape::default(),
            pose,
            projection,
        }
    }

    /// Perspective camera at the origin with near/far planes at 0.1 and 1000.
    pub fn pinhole(fovy_deg: f32) -> Self {
        Self::new(
            Pose::IDENTITY,
            Projection::Perspective {
                fovy_deg,
                near: 0.1,
                far: 1000.0,
            },
        )
    }

    pub fn orthographic(half_height: f32, near: f32, far: f32) -> Self {
        Self::new(Pose::IDENTITY, Projection::Orthographic { half_height, near, far })
    }

    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    pub fn set_projection(&mut self, projection: Projection) {
        self.projection = projection;
    }

    /// World-to-camera transform, without the frame change or projection.
    pub fn raw_view_matrix(&self) -> Mat4 {
        self.pose.inverse().matrix()
    }

    /// Places the camera at `position` looking at `target`, with its +Z axis
    /// as close to `up` as possible.
    ///
    /// `up` must not be collinear with `target - position`. That case is not
    /// corrected and yields an unusable pose.
    pub fn look_at(&mut self, target: Vec3, position: Vec3, up: Vec3) {
        self.pose = Pose::look_at(target, position, up);
    }

    /// Turns the camera toward `target` from its current position, keeping +Z
    /// up.
    pub fn point_at(&mut self, target: Vec3) {
        self.look_at(target, self.pose.translation, Vec3::Z);
    }
}

impl View for View3D {
    fn screen_size(&self) -> Shape {
        self.screen
    }

    fn set_screen_size(&mut self, shape: Shape) {
        self.screen = shape;
    }

    fn projection_matrix(&self) -> Mat4 {
        self.projection.matrix(self.screen)
    }

    fn view_matrix(&self) -> Mat4 {
        self.projection_matrix() * CAMERA_TO_EYE * self.raw_view_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-4;

    fn clip(view: &View3D, p: Vec3) -> Vec4 {
        view.view_matrix() * p.extend(1.0)
    }

    // ── frame ─────────────────────────────────────────────────────────────

    #[test]
    fn camera_frame_maps_forward_to_negative_z() {
        assert!(CAMERA_TO_EYE.transform_vector3(Vec3::Y).abs_diff_eq(Vec3::NEG_Z, EPS));
        assert!(CAMERA_TO_EYE.transform_vector3(Vec3::Z).abs_diff_eq(Vec3::Y, EPS));
        assert!(CAMERA_TO_EYE.transform_vector3(Vec3::X).abs_diff_eq(Vec3::X, EPS));
    }

    // ── look_at ───────────────────────────────────────────────────────────

    #[test]
    fn look_at_puts_target_on_optical_axis() {
        let mut view = View3D::pinhole(60.0);
        view.set_screen_size(Shape::new(800, 600));

        let target = Vec3::new(1.0, 2.0, 0.5);
        view.look_at(target, Vec3::new(6.0, -3.0, 4.0), Vec3::Z);

        let c = clip(&view, target);
        assert!(c.x.abs() < EPS, "x = {}", c.x);
        assert!(c.y.abs() < EPS, "y = {}", c.y);
        assert!(c.w > 0.0);
    }

    #[test]
    fn look_at_with_fixed_projection_centers_target() {
        let mut view = View3D::default();
        let target = Vec3::new(-2.0, 0.0, 1.0);
        view.look_at(target, Vec3::new(3.0, 3.0, 3.0), Vec3::Z);

        let c = clip(&view, target);
        assert!(c.x.abs() < EPS && c.y.abs() < EPS);
        assert!(c.z < 0.0);
    }

    #[test]
    fn point_at_keeps_position() {
        let mut view = View3D::pinhole(45.0);
        view.set_pose(Pose::from_translation(Vec3::new(0.0, -5.0, 2.0)));
        view.point_at(Vec3::ZERO);
        assert!(view.pose().translation.abs_diff_eq(Vec3::new(0.0, -5.0, 2.0), EPS));
        assert!(view.pose().y_axis().abs_diff_eq(Vec3::new(0.0, 5.0, -2.0).normalize(), EPS));
    }

    #[test]
    fn point_above_target_projects_upward() {
        let mut view = View3D::pinhole(60.0);
        view.set_screen_size(Shape::new(100, 100));
        view.look_at(Vec3::ZERO, Vec3::new(0.0, -10.0, 0.0), Vec3::Z);

        let c = clip(&view, Vec3::new(0.0, 0.0, 1.0));
        assert!(c.y / c.w > 0.0);
        let c = clip(&view, Vec3::new(1.0, 0.0, 0.0));
        assert!(c.x / c.w > 0.0);
    }

    // ── projections ───────────────────────────────────────────────────────

    #[test]
    fn orthographic_depth_is_in_unit_range() {
        let mut view = View3D::orthographic(2.0, 0.1, 100.0);
        view.set_screen_size(Shape::new(200, 100));
        view.look_at(Vec3::ZERO, Vec3::new(0.0, -10.0, 0.0), Vec3::Z);

        let c = clip(&view, Vec3::ZERO);
        assert!((0.0..=1.0).contains(&c.z));
        // Half width is 4 units at 2:1 aspect.
        let edge = clip(&view, Vec3::new(4.0, 0.0, 0.0));
        assert!((edge.x - 1.0).abs() < EPS);
    }

    #[test]
    fn raw_view_matrix_is_pose_inverse() {
        let mut view = View3D::default();
        view.set_pose(Pose::from_translation(Vec3::new(1.0, 2.0, 3.0)));
        let p = view.raw_view_matrix().transform_point3(Vec3::new(1.0, 2.0, 3.0));
        assert!(p.abs_diff_eq(Vec3::ZERO, EPS));
    }
}
