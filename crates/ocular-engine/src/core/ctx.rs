use winit::window::{Window, WindowId};

use crate::display::Display;
use crate::error::ErrorKind;
use crate::render::FrameStats;
use crate::time::FrameTime;
use crate::window::RuntimeCtx;

use super::app::AppControl;

/// Per-window handles.
pub struct WindowCtx<'a> {
    pub id: WindowId,
    pub window: &'a Window,
}

impl WindowCtx<'_> {
    /// Inner size in logical pixels.
    pub fn logical_size(&self) -> (f32, f32) {
        let size = self.window.inner_size().to_logical::<f64>(self.window.scale_factor());
        (size.width as f32, size.height as f32)
    }

    pub fn set_title(&self, title: &str) {
        self.window.set_title(title);
    }
}

/// Per-frame context passed to [`App::on_frame`](super::App::on_frame).
///
/// `'a` is the callback, `'w` the window borrow held by the display.
pub struct FrameCtx<'a, 'w> {
    pub window: WindowCtx<'a>,
    pub display: &'a mut Display<'w>,
    pub time: FrameTime,
    pub runtime: &'a mut RuntimeCtx,
    pub(crate) stats: Option<FrameStats>,
}

impl FrameCtx<'_, '_> {
    /// Draws the display's renderers and presents.
    ///
    /// Skipped frames are not errors. Returns [`AppControl::Exit`] only when
    /// the surface can no longer be rendered to.
    pub fn render(&mut self) -> AppControl {
        self.window.window.pre_present_notify();
        match self.display.draw() {
            Ok(stats) => {
                self.stats = stats;
                AppControl::Continue
            }
            Err(err) if err.kind() == ErrorKind::External => {
                log::error!("rendering failed: {err}");
                AppControl::Exit
            }
            Err(err) => {
                log::warn!("frame dropped: {err}");
                AppControl::Continue
            }
        }
    }

    /// Draws recorded by the last [`render`](Self::render) of this frame.
    pub fn stats(&self) -> Option<&FrameStats> {
        self.stats.as_ref()
    }
}
