//! Displays and the per-frame sequence.
//!
//! A frame pushes the target shape into every registered view, clears color
//! and depth, draws every renderer in order and submits. [`Display`] runs it
//! against a window surface and presents; [`OffscreenTarget`] runs it against
//! a texture that can be read back.
//!
//! Input reaches a display as [`InputEvent`](crate::input::InputEvent)s and
//! is dispatched to its [`EventCallbacks`].

mod config;
mod driver;
mod events;
mod frame;
mod offscreen;

pub use config::DisplayConfig;
pub use driver::Display;
pub use events::{CallbackId, EventCallbacks, EventHandler, SharedEventHandler};
pub use frame::{render_frame, FrameTargets};
pub use offscreen::OffscreenTarget;
