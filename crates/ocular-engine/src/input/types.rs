use std::fmt;

/// Keyboard key identifier.
///
/// The runtime maps platform keycodes into these variants where possible.
/// Other keys arrive as `Key::Unknown(u32)` with a stable platform code.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Key {
    // Common control keys
    Escape,
    Enter,
    Tab,
    Backspace,
    Space,

    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,

    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,

    // Modifiers as keys
    Shift,
    Control,
    Alt,
    Meta,

    // Letters
    A, B, C, D, E, F, G, H, I, J, K, L, M,
    N, O, P, Q, R, S, T, U, V, W, X, Y, Z,

    // Digits
    Digit0, Digit1, Digit2, Digit3, Digit4,
    Digit5, Digit6, Digit7, Digit8, Digit9,

    // Function keys
    F1, F2, F3, F4, F5, F6,
    F7, F8, F9, F10, F11, F12,

    /// Platform-dependent key not yet represented here.
    Unknown(u32),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum KeyState {
    Pressed,
    Released,
}

/// Mouse button identifier.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Back,
    Forward,
    Other(u16),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MouseButtonState {
    Pressed,
    Released,
}

/// Modifier keys state.
///
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

impl Modifiers {
    pub fn any(&self) -> bool {
        self.shift || self.ctrl || self.alt || self.meta
    }
}

/// Keyboard event delivered to key callbacks.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct KeyEvent {
    pub key: Key,
    pub state: KeyState,
    pub modifiers: Modifiers,
    /// Stable platform code when available (e.g. scancode).
    pub code: u32,
    /// True when the event is a key-repeat.
    pub repeat: bool,
}

/// Cursor position in physical pixels, origin at the top-left corner.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MousePositionEvent {
    pub x: f32,
    pub y: f32,
}

/// Mouse button event.
///
/// Carries the cursor position at the time of the event so handlers do not
/// need to track it separately.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MouseButtonEvent {
    pub button: MouseButton,
    pub state: MouseButtonState,
    pub x: f32,
    pub y: f32,
    pub modifiers: Modifiers,
}

/// Scroll wheel or trackpad movement.
///
/// Line deltas are converted to pixels at [`ScrollEvent::PIXELS_PER_LINE`].
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ScrollEvent {
    pub dx: f32,
    pub dy: f32,
    pub modifiers: Modifiers,
}

impl ScrollEvent {
    pub const PIXELS_PER_LINE: f32 = 20.0;
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Input delivered to a display.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum InputEvent {
    Key(KeyEvent),
    MousePosition(MousePositionEvent),
    MouseButton(MouseButtonEvent),
    Scroll(ScrollEvent),
}
