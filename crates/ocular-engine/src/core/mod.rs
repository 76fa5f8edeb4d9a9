//! Contract between the window runtime and the application.
//!
//! The runtime creates a [`Display`](crate::display::Display) per window,
//! hands it to [`App::on_display_created`], and calls [`App::on_frame`] on
//! every redraw with a [`FrameCtx`].

mod app;
mod ctx;

pub use app::{App, AppControl};
pub use ctx::{FrameCtx, WindowCtx};
