use glam::Mat4;

use crate::coords::Shape;

use super::View;

/// Base view: clip coordinates are used as-is unless a projection is set.
#[derive(Debug, Clone)]
pub struct ScreenView {
    screen: Shape,
    projection: Mat4,
}

impl ScreenView {
    pub fn new() -> Self {
        Self::with_projection(Mat4::IDENTITY)
    }

    pub fn with_projection(projection: Mat4) -> Self {
        Self {
            screen: Shape::default(),
            projection,
        }
    }

    pub fn set_projection(&mut self, projection: Mat4) {
        self.projection = projection;
    }
}

impl Default for ScreenView {
    fn default() -> Self {
        Self::new()
    }
}

impl View for ScreenView {
    fn screen_size(&self) -> Shape {
        self.screen
    }

    fn set_screen_size(&mut self, shape: Shape) {
        self.screen = shape;
    }

    fn projection_matrix(&self) -> Mat4 {
        self.projection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn default_view_is_identity() {
        let view = ScreenView::new();
        assert_eq!(view.view_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn view_matrix_follows_projection() {
        let mut view = ScreenView::new();
        let scale = Mat4::from_scale(Vec3::new(2.0, 3.0, 1.0));
        view.set_projection(scale);
        view.set_screen_size(Shape::new(640, 480));
        assert_eq!(view.view_matrix(), scale);
        assert_eq!(view.screen_size(), Shape::new(640, 480));
    }
}
