//! Input events delivered to display callbacks and event handlers.
//!
//! Public API does not expose winit types. The window runtime translates
//! platform events into these.

mod types;

pub use types::{
    InputEvent,
    Key,
    KeyEvent,
    KeyState,
    Modifiers,
    MouseButton,
    MouseButtonEvent,
    MouseButtonState,
    MousePositionEvent,
    ScrollEvent,
};
