use winit::event::WindowEvent;
use winit::window::WindowId;

use crate::display::Display;

use super::ctx::FrameCtx;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract driven by [`Runtime`](crate::window::Runtime).
pub trait App {
    /// Called once per window, right after its display exists. Register
    /// views, renderers and input callbacks here.
    fn on_display_created(&mut self, window_id: WindowId, display: &mut Display<'_>) -> anyhow::Result<()> {
        let _ = (window_id, display);
        Ok(())
    }

    /// Called for raw window events, before the runtime handles them.
    fn on_window_event(&mut self, window_id: WindowId, event: &WindowEvent) -> AppControl {
        let _ = (window_id, event);
        AppControl::Continue
    }

    /// Called once per redraw of each window. Update renderers, then call
    /// [`FrameCtx::render`].
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl;
}
