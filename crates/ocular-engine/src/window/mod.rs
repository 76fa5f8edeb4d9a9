//! Window runtime.
//!
//! Owns the winit event loop. Every window gets a [`Display`](crate::display::Display)
//! on a GPU context shared by all windows; window input is translated into
//! display events.

mod runtime;

pub use runtime::{Runtime, RuntimeCtx};
