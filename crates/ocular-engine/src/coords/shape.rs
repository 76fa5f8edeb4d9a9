/// Size of a 2D pixel grid (surface, texture or text area).
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Hash)]
pub struct Shape {
    pub width: u32,
    pub height: u32,
}

impl Shape {
    #[inline]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero.
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }

    #[inline]
    pub const fn area(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Width over height, or 1 for an empty shape.
    #[inline]
    pub fn aspect_ratio(self) -> f32 {
        if self.is_empty() {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }

    pub(crate) fn extent(self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

impl From<winit::dpi::PhysicalSize<u32>> for Shape {
    fn from(size: winit::dpi::PhysicalSize<u32>) -> Self {
        Self::new(size.width, size.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_when_any_dimension_is_zero() {
        assert!(Shape::new(0, 10).is_empty());
        assert!(Shape::new(10, 0).is_empty());
        assert!(!Shape::new(1, 1).is_empty());
    }

    #[test]
    fn aspect_ratio_of_empty_shape_is_one() {
        assert_eq!(Shape::default().aspect_ratio(), 1.0);
        assert_eq!(Shape::new(800, 400).aspect_ratio(), 2.0);
    }

    #[test]
    fn area_does_not_overflow_u32() {
        assert_eq!(Shape::new(70_000, 70_000).area(), 4_900_000_000);
    }
}
