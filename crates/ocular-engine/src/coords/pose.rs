use std::ops::Mul;

use glam::{Mat3, Mat4, Quat, Vec3};

/// Rigid transform: a rotation followed by a translation.
///
/// Composition reads right to left, like matrices: `view_pose * object_pose`
/// first places the object in the view's frame, then the view in the world.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Pose {
    pub rotation: Quat,
    pub translation: Vec3,
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        rotation: Quat::IDENTITY,
        translation: Vec3::ZERO,
    };

    /// The rotation is normalized.
    pub fn new(rotation: Quat, translation: Vec3) -> Self {
        Self {
            rotation: rotation.normalize(),
            translation,
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            rotation: Quat::IDENTITY,
            translation,
        }
    }

    pub fn from_rotation(rotation: Quat) -> Self {
        Self::new(rotation, Vec3::ZERO)
    }

    /// Builds a pose from the world-space directions of its local axes.
    ///
    /// The axes must be orthonormal and right-handed.
    pub fn from_axes(x: Vec3, y: Vec3, z: Vec3, translation: Vec3) -> Self {
        Self::new(Quat::from_mat3(&Mat3::from_cols(x, y, z)), translation)
    }

    /// Camera pose at `position` whose forward (+Y) axis points at `target`
    /// and whose +Z axis is as close to `up` as possible.
    ///
    /// `up` must not be collinear with `target - position`, and the two points
    /// must differ. Neither case is corrected; the result is unspecified.
    pub fn look_at(target: Vec3, position: Vec3, up: Vec3) -> Self {
        let forward = (target - position).normalize();
        let right = forward.cross(up).normalize();
        let up = right.cross(forward);
        Self::from_axes(right, forward, up, position)
    }

    /// Homogeneous 4x4 matrix of this transform.
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.translation)
    }

    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self {
            rotation,
            translation: -(rotation * self.translation),
        }
    }

    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.rotation * p + self.translation
    }

    pub fn x_axis(&self) -> Vec3 {
        self.rotation * Vec3::X
    }

    pub fn y_axis(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    pub fn z_axis(&self) -> Vec3 {
        self.rotation * Vec3::Z
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Pose {
    type Output = Pose;

    fn mul(self, rhs: Pose) -> Pose {
        Pose {
            rotation: (self.rotation * rhs.rotation).normalize(),
            translation: self.rotation * rhs.translation + self.translation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn sample() -> Pose {
        Pose::new(
            Quat::from_axis_angle(Vec3::new(1.0, 2.0, 3.0).normalize(), 0.7),
            Vec3::new(4.0, -1.0, 2.5),
        )
    }

    // ── composition ───────────────────────────────────────────────────────

    #[test]
    fn compose_matches_matrix_product() {
        let a = sample();
        let b = Pose::from_translation(Vec3::new(0.0, 1.0, 0.0));
        assert!((a * b).matrix().abs_diff_eq(a.matrix() * b.matrix(), EPS));
    }

    #[test]
    fn pose_times_inverse_is_identity() {
        let p = sample();
        let id = p * p.inverse();
        assert!(id.translation.abs_diff_eq(Vec3::ZERO, EPS));
        assert!(id.rotation.abs_diff_eq(Quat::IDENTITY, EPS));
    }

    #[test]
    fn transform_point_matches_matrix() {
        let p = sample();
        let v = Vec3::new(0.3, -2.0, 1.0);
        assert!(p.transform_point(v).abs_diff_eq(p.matrix().transform_point3(v), EPS));
    }

    // ── look_at ───────────────────────────────────────────────────────────

    #[test]
    fn look_at_forward_axis_points_to_target() {
        let target = Vec3::ZERO;
        let position = Vec3::new(5.0, 4.0, 3.0);
        let pose = Pose::look_at(target, position, Vec3::Z);

        let expected = (target - position).normalize();
        assert!(pose.y_axis().abs_diff_eq(expected, EPS));
        assert!(pose.translation.abs_diff_eq(position, EPS));
    }

    #[test]
    fn look_at_keeps_up_axis_upward() {
        let pose = Pose::look_at(Vec3::new(0.0, 10.0, 0.0), Vec3::ZERO, Vec3::Z);
        assert!(pose.z_axis().abs_diff_eq(Vec3::Z, EPS));
        assert!(pose.x_axis().abs_diff_eq(Vec3::X, EPS));
    }
}
