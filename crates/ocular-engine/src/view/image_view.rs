use glam::{Mat4, Vec3};

use crate::coords::Shape;

use super::View;

/// Fits an image into the screen, preserving its aspect ratio.
///
/// The image spans clip space `[-1, 1]` on both axes before projection; the
/// projection shrinks one axis so the image is letterboxed instead of
/// stretched.
#[derive(Debug, Clone)]
pub struct ImageView {
    screen: Shape,
    image: Shape,
}

impl ImageView {
    pub fn new(image: Shape) -> Self {
        Self {
            screen: Shape::default(),
            image,
        }
    }

    pub fn image_shape(&self) -> Shape {
        self.image
    }

    pub fn set_image_shape(&mut self, image: Shape) {
        self.image = image;
    }
}

impl Default for ImageView {
    fn default() -> Self {
        Self::new(Shape::new(1, 1))
    }
}

impl View for ImageView {
    fn screen_size(&self) -> Shape {
        self.screen
    }

    fn set_screen_size(&mut self, shape: Shape) {
        self.screen = shape;
    }

    fn projection_matrix(&self) -> Mat4 {
        let screen = self.screen.aspect_ratio();
        let image = self.image.aspect_ratio();

        let (sx, sy) = if screen > image {
            (image / screen, 1.0)
        } else {
            (1.0, screen / image)
        };
        Mat4::from_scale(Vec3::new(sx, sy, 1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    #[test]
    fn wide_screen_shrinks_horizontally() {
        let mut view = ImageView::new(Shape::new(100, 100));
        view.set_screen_size(Shape::new(200, 100));
        let corner = view.view_matrix() * Vec4::new(1.0, 1.0, 0.0, 1.0);
        assert!((corner.x - 0.5).abs() < 1e-6);
        assert!((corner.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn tall_screen_shrinks_vertically() {
        let mut view = ImageView::new(Shape::new(200, 100));
        view.set_screen_size(Shape::new(100, 100));
        let corner = view.view_matrix() * Vec4::new(1.0, 1.0, 0.0, 1.0);
        assert!((corner.x - 1.0).abs() < 1e-6);
        assert!((corner.y - 0.5).abs() < 1e-6);
    }

    #[test]
    fn matching_aspect_is_identity() {
        let mut view = ImageView::new(Shape::new(320, 240));
        view.set_screen_size(Shape::new(640, 480));
        assert!(view.view_matrix().abs_diff_eq(Mat4::IDENTITY, 1e-6));
    }
}
