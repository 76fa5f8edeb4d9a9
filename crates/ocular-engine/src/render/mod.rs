//! Renderers.
//!
//! Every renderer implements [`Drawable`]: it reads the matrices of its
//! shared view, uploads one draw uniform, opens one render pass that loads
//! the existing attachments and issues its draw. Bind groups are created per
//! draw and dropped with the pass, so nothing a renderer binds leaks into
//! the next one. Renderers with no data draw nothing.
//!
//! Optional capabilities are exposed through [`Posed`] and [`Colored`].

mod common;
mod frame;
mod image;
mod mesh;
mod normals;
mod point_cloud;
mod target;
mod text;

use std::cell::RefCell;
use std::rc::Rc;

use crate::coords::{Color, Pose};
use crate::error::Result;
use crate::view::{SharedView, View};

pub use frame::FrameRenderer;
pub use image::ImageRenderer;
pub use mesh::MeshRenderer;
pub use normals::NormalsRenderer;
pub use point_cloud::PointCloudRenderer;
pub use target::{DrawCall, FrameStats, RenderTarget};
pub use text::TextRenderer;

/// Format of the depth attachment renderers expect.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// The closed set of renderer variants.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum RendererKind {
    ReferenceFrame,
    PointCloud,
    Mesh,
    Normals,
    Image,
    Text,
}

/// Renderers placed in world space by a pose.
pub trait Posed {
    fn pose(&self) -> Pose;
    fn set_pose(&mut self, pose: Pose);
}

/// Renderers drawn in a configurable color.
pub trait Colored {
    fn color(&self) -> Color;
    fn set_color(&mut self, color: Color);
}

/// Something a display can draw each frame.
pub trait Drawable {
    fn kind(&self) -> RendererKind;

    /// The view read on the next draw.
    fn view(&self) -> SharedView;

    fn set_view(&mut self, view: SharedView);

    /// Draws under the renderer's own view.
    fn draw(&mut self, target: &mut RenderTarget<'_>) -> Result<()> {
        let view = self.view();
        let view = view.borrow();
        self.draw_with_view(target, &*view)
    }

    /// Draws under `view` instead of the renderer's own.
    fn draw_with_view(&mut self, target: &mut RenderTarget<'_>, view: &dyn View) -> Result<()>;

    fn as_posed_mut(&mut self) -> Option<&mut dyn Posed> {
        None
    }

    fn as_colored_mut(&mut self) -> Option<&mut dyn Colored> {
        None
    }
}

/// Renderer shared between the application and the displays drawing it.
pub type SharedRenderer = Rc<RefCell<dyn Drawable>>;

/// Wraps a renderer for sharing, keeping its concrete type.
pub fn shared<R: Drawable + 'static>(renderer: R) -> Rc<RefCell<R>> {
    Rc::new(RefCell::new(renderer))
}
