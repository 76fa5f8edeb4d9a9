//! Camera views.
//!
//! A [`View`] maps world or screen coordinates to clip space. The display
//! pushes the current surface shape into every registered view before any
//! renderer draws, so aspect-dependent projections are always up to date.
//!
//! Views are shared between renderers through [`SharedView`]. Keep a typed
//! `Rc<RefCell<View3D>>` to move the camera and hand clones of it to
//! renderers; the handle coerces to `SharedView`.

mod image_view;
mod orbit;
mod screen;
mod view3d;

use std::cell::RefCell;
use std::rc::Rc;

use glam::Mat4;

use crate::coords::Shape;

pub use image_view::ImageView;
pub use orbit::OrbitController;
pub use screen::ScreenView;
pub use view3d::{Projection, View3D, CAMERA_TO_EYE};

/// Camera abstraction read by renderers each draw.
pub trait View {
    /// Last screen shape pushed by the display.
    fn screen_size(&self) -> Shape;

    fn set_screen_size(&mut self, shape: Shape);

    fn projection_matrix(&self) -> Mat4;

    /// Full world-to-clip transform. Views without a pose return the
    /// projection.
    fn view_matrix(&self) -> Mat4 {
        self.projection_matrix()
    }
}

/// View shared by every renderer (and display) that observes it.
pub type SharedView = Rc<RefCell<dyn View>>;

/// Wraps a view for sharing, keeping its concrete type.
pub fn shared<V: View + 'static>(view: V) -> Rc<RefCell<V>> {
    Rc::new(RefCell::new(view))
}
