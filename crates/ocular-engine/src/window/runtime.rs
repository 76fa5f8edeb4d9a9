use std::collections::HashMap;

use anyhow::{Context, Result};
use ouroboros::self_referencing;
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalPosition};
use winit::event::{ElementState, MouseButton as WinitMouseButton, MouseScrollDelta, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, ModifiersState, PhysicalKey};
use winit::window::{Window, WindowId};

use crate::core::{App, AppControl, FrameCtx, WindowCtx};
use crate::device::{GpuContext, GpuInit, SharedContext};
use crate::display::{Display, DisplayConfig};
use crate::input::{
    InputEvent, Key, KeyEvent, KeyState, Modifiers, MouseButton, MouseButtonEvent, MouseButtonState,
    MousePositionEvent, ScrollEvent,
};
use crate::time::FrameClock;

/// Requests from the application, applied after the current callback.
#[derive(Default)]
pub struct RuntimeCtx {
    commands: Vec<Command>,
}

impl RuntimeCtx {
    /// Opens another window. Its display shares the first window's context.
    pub fn create_window(&mut self, config: DisplayConfig) {
        self.commands.push(Command::CreateWindow(config));
    }

    pub fn close_window(&mut self, id: WindowId) {
        self.commands.push(Command::CloseWindow(id));
    }

    pub fn exit(&mut self) {
        self.commands.push(Command::Exit);
    }
}

enum Command {
    CreateWindow(DisplayConfig),
    CloseWindow(WindowId),
    Exit,
}

/// Owns the winit event loop and one display per window.
pub struct Runtime;

impl Runtime {
    /// Opens a window configured by `initial` and runs until every window is
    /// closed or the application exits.
    pub fn run<A>(initial: DisplayConfig, gpu_init: GpuInit, app: A) -> Result<()>
    where
        A: App + 'static,
    {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = AppState::new(initial, gpu_init, app);

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        Ok(())
    }
}

/// Pointer and modifier state needed to translate winit input.
#[derive(Debug, Default)]
struct InputTracker {
    modifiers: Modifiers,
    cursor: Option<(f32, f32)>,
}

#[self_referencing]
struct WindowEntry {
    input: InputTracker,
    clock: FrameClock,

    window: Window,

    #[borrows(window)]
    #[covariant]
    display: Display<'this>,
}

struct AppState<A>
where
    A: App + 'static,
{
    initial: DisplayConfig,
    gpu_init: GpuInit,
    app: A,

    /// Shared by every display; created with the first window.
    context: Option<SharedContext>,
    windows: HashMap<WindowId, WindowEntry>,
    exit_requested: bool,
}

/// Creates the display of `window`, and the shared context if there is none
/// yet.
fn open_display<'w>(
    window: &'w Window,
    context: &mut Option<SharedContext>,
    init: &GpuInit,
    config: &DisplayConfig,
) -> crate::Result<Display<'w>> {
    let size = window.inner_size();
    match context {
        Some(ctx) => {
            let surface = ctx.instance().create_surface(window)?;
            Display::new(ctx.clone(), surface, size, config)
        }
        None => {
            let instance = GpuContext::create_instance(init);
            let surface = instance.create_surface(window)?;
            let display = Display::with_new_context(instance, surface, size, init.clone(), config)?;
            *context = Some(display.context().clone());
            Ok(display)
        }
    }
}

impl<A> AppState<A>
where
    A: App + 'static,
{
    fn new(initial: DisplayConfig, gpu_init: GpuInit, app: A) -> Self {
        Self {
            initial,
            gpu_init,
            app,
            context: None,
            windows: HashMap::new(),
            exit_requested: false,
        }
    }

    fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    fn create_window_entry(&mut self, event_loop: &ActiveEventLoop, config: DisplayConfig) -> Result<WindowId> {
        let attrs = Window::default_attributes()
            .with_title(config.title.clone())
            .with_inner_size(LogicalSize::new(config.width, config.height));

        let window = event_loop
            .create_window(attrs)
            .context("failed to create window")?;
        let id = window.id();

        let (context, init) = (&mut self.context, &self.gpu_init);
        let mut entry = WindowEntryTryBuilder {
            input: InputTracker::default(),
            clock: FrameClock::default(),
            window,
            display_builder: |window| open_display(window, context, init, &config),
        }
        .try_build()
        .context("failed to create display")?;

        let app = &mut self.app;
        entry
            .with_display_mut(|display| app.on_display_created(id, display))
            .context("application failed to set up the display")?;

        self.windows.insert(id, entry);
        log::debug!("opened window {id:?}");
        Ok(id)
    }

    fn destroy_window_entry(&mut self, id: WindowId) {
        self.windows.remove(&id);
    }

    fn apply_commands(&mut self, event_loop: &ActiveEventLoop, mut ctx: RuntimeCtx) {
        for cmd in ctx.commands.drain(..) {
            match cmd {
                Command::CreateWindow(cfg) => {
                    if let Err(e) = self.create_window_entry(event_loop, cfg) {
                        log::error!("failed to create window: {e:#}");
                        self.request_exit();
                    }
                }
                Command::CloseWindow(id) => self.destroy_window_entry(id),
                Command::Exit => self.request_exit(),
            }
        }

        if self.windows.is_empty() {
            self.request_exit();
        }

        if self.exit_requested {
            event_loop.exit();
        }
    }
}

impl<A> ApplicationHandler for AppState<A>
where
    A: App + 'static,
{
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if !self.windows.is_empty() {
            return;
        }

        if let Err(e) = self.create_window_entry(event_loop, self.initial.clone()) {
            log::error!("failed to create initial window: {e:#}");
            self.request_exit();
            event_loop.exit();
            return;
        }

        for entry in self.windows.values() {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        // Continuous redraw: live data changes every frame.
        event_loop.set_control_flow(ControlFlow::Wait);
        for entry in self.windows.values() {
            entry.with_window(|w| w.request_redraw());
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, window_id: WindowId, event: WindowEvent) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        let (app, windows) = (&mut self.app, &mut self.windows);
        let Some(entry) = windows.get_mut(&window_id) else {
            return;
        };

        let mut exit_from_app_event = false;
        entry.with_mut(|fields| {
            if let Some(ev) = translate_input_event(fields.input, &event) {
                fields.display.handle_event(&ev);
            }

            if app.on_window_event(window_id, &event) == AppControl::Exit {
                exit_from_app_event = true;
            }
        });

        if exit_from_app_event {
            self.request_exit();
            event_loop.exit();
            return;
        }

        match &event {
            WindowEvent::CloseRequested => {
                self.destroy_window_entry(window_id);
                if self.windows.is_empty() {
                    self.request_exit();
                    event_loop.exit();
                }
            }

            WindowEvent::Resized(new_size) => {
                if let Some(entry) = self.windows.get_mut(&window_id) {
                    entry.with_display_mut(|display| display.resize(*new_size));
                    entry.with_window(|w| w.request_redraw());
                }
            }

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(entry) = self.windows.get_mut(&window_id) {
                    let new_size = entry.with_window(|w| w.inner_size());
                    entry.with_display_mut(|display| display.resize(new_size));
                    entry.with_window(|w| w.request_redraw());
                }
            }

            WindowEvent::RedrawRequested => {
                let mut runtime_ctx = RuntimeCtx::default();
                let mut app_control = AppControl::Continue;

                if let Some(entry) = self.windows.get_mut(&window_id) {
                    let app = &mut self.app;
                    entry.with_mut(|fields| {
                        let mut ctx = FrameCtx {
                            window: WindowCtx {
                                id: window_id,
                                window: fields.window,
                            },
                            display: fields.display,
                            time: fields.clock.tick(),
                            runtime: &mut runtime_ctx,
                            stats: None,
                        };
                        app_control = app.on_frame(&mut ctx);
                    });
                }

                if app_control == AppControl::Exit {
                    runtime_ctx.exit();
                }

                self.apply_commands(event_loop, runtime_ctx);
            }

            _ => {}
        }

        if self.exit_requested {
            event_loop.exit();
        }
    }
}

/// Converts winit input into display events, updating the tracked modifier
/// and cursor state. Positions are in physical pixels.
fn translate_input_event(input: &mut InputTracker, event: &WindowEvent) -> Option<InputEvent> {
    match event {
        WindowEvent::ModifiersChanged(m) => {
            input.modifiers = map_modifiers(m.state());
            None
        }

        WindowEvent::CursorLeft { .. } => {
            input.cursor = None;
            None
        }

        WindowEvent::CursorMoved { position, .. } => {
            let (x, y) = to_f32(*position);
            input.cursor = Some((x, y));
            Some(InputEvent::MousePosition(MousePositionEvent { x, y }))
        }

        WindowEvent::MouseInput { state, button, .. } => {
            Some(InputEvent::MouseButton(button_event(input, *state, *button)))
        }

        WindowEvent::MouseWheel { delta, .. } => {
            let (dx, dy) = scroll_delta(delta);
            Some(InputEvent::Scroll(ScrollEvent {
                dx,
                dy,
                modifiers: input.modifiers,
            }))
        }

        WindowEvent::KeyboardInput { event, .. } => {
            let state = match event.state {
                ElementState::Pressed => KeyState::Pressed,
                ElementState::Released => KeyState::Released,
            };
            let (key, code) = map_key(event.physical_key);

            Some(InputEvent::Key(KeyEvent {
                key,
                state,
                modifiers: input.modifiers,
                code,
                repeat: event.repeat,
            }))
        }

        _ => None,
    }
}

fn button_event(input: &InputTracker, state: ElementState, button: WinitMouseButton) -> MouseButtonEvent {
    let state = match state {
        ElementState::Pressed => MouseButtonState::Pressed,
        ElementState::Released => MouseButtonState::Released,
    };
    let (x, y) = input.cursor.unwrap_or((0.0, 0.0));
    MouseButtonEvent {
        button: map_mouse_button(button),
        state,
        x,
        y,
        modifiers: input.modifiers,
    }
}

fn scroll_delta(delta: &MouseScrollDelta) -> (f32, f32) {
    match delta {
        MouseScrollDelta::LineDelta(x, y) => (x * ScrollEvent::PIXELS_PER_LINE, y * ScrollEvent::PIXELS_PER_LINE),
        MouseScrollDelta::PixelDelta(p) => to_f32(*p),
    }
}

fn to_f32(pos: PhysicalPosition<f64>) -> (f32, f32) {
    (pos.x as f32, pos.y as f32)
}

fn map_modifiers(m: ModifiersState) -> Modifiers {
    Modifiers {
        shift: m.shift_key(),
        ctrl: m.control_key(),
        alt: m.alt_key(),
        meta: m.super_key(),
    }
}

fn map_mouse_button(b: WinitMouseButton) -> MouseButton {
    match b {
        WinitMouseButton::Left => MouseButton::Left,
        WinitMouseButton::Right => MouseButton::Right,
        WinitMouseButton::Middle => MouseButton::Middle,
        WinitMouseButton::Back => MouseButton::Back,
        WinitMouseButton::Forward => MouseButton::Forward,
        WinitMouseButton::Other(v) => MouseButton::Other(v),
    }
}

fn map_key(pk: PhysicalKey) -> (Key, u32) {
    match pk {
        PhysicalKey::Code(code) => {
            let key = match code {
                KeyCode::Escape => Key::Escape,
                KeyCode::Enter => Key::Enter,
                KeyCode::Tab => Key::Tab,
                KeyCode::Backspace => Key::Backspace,
                KeyCode::Space => Key::Space,

                KeyCode::Insert => Key::Insert,
                KeyCode::Delete => Key::Delete,
                KeyCode::Home => Key::Home,
                KeyCode::End => Key::End,
                KeyCode::PageUp => Key::PageUp,
                KeyCode::PageDown => Key::PageDown,

                KeyCode::ArrowUp => Key::ArrowUp,
                KeyCode::ArrowDown => Key::ArrowDown,
                KeyCode::ArrowLeft => Key::ArrowLeft,
                KeyCode::ArrowRight => Key::ArrowRight,

                KeyCode::ShiftLeft | KeyCode::ShiftRight => Key::Shift,
                KeyCode::ControlLeft | KeyCode::ControlRight => Key::Control,
                KeyCode::AltLeft | KeyCode::AltRight => Key::Alt,
                KeyCode::SuperLeft | KeyCode::SuperRight => Key::Meta,

                KeyCode::KeyA => Key::A,
                KeyCode::KeyB => Key::B,
                KeyCode::KeyC => Key::C,
                KeyCode::KeyD => Key::D,
                KeyCode::KeyE => Key::E,
                KeyCode::KeyF => Key::F,
                KeyCode::KeyG => Key::G,
                KeyCode::KeyH => Key::H,
                KeyCode::KeyI => Key::I,
                KeyCode::KeyJ => Key::J,
                KeyCode::KeyK => Key::K,
                KeyCode::KeyL => Key::L,
                KeyCode::KeyM => Key::M,
                KeyCode::KeyN => Key::N,
                KeyCode::KeyO => Key::O,
                KeyCode::KeyP => Key::P,
                KeyCode::KeyQ => Key::Q,
                KeyCode::KeyR => Key::R,
                KeyCode::KeyS => Key::S,
                KeyCode::KeyT => Key::T,
                KeyCode::KeyU => Key::U,
                KeyCode::KeyV => Key::V,
                KeyCode::KeyW => Key::W,
                KeyCode::KeyX => Key::X,
                KeyCode::KeyY => Key::Y,
                KeyCode::KeyZ => Key::Z,

                KeyCode::Digit0 => Key::Digit0,
                KeyCode::Digit1 => Key::Digit1,
                KeyCode::Digit2 => Key::Digit2,
                KeyCode::Digit3 => Key::Digit3,
                KeyCode::Digit4 => Key::Digit4,
                KeyCode::Digit5 => Key::Digit5,
                KeyCode::Digit6 => Key::Digit6,
                KeyCode::Digit7 => Key::Digit7,
                KeyCode::Digit8 => Key::Digit8,
                KeyCode::Digit9 => Key::Digit9,

                KeyCode::F1 => Key::F1,
                KeyCode::F2 => Key::F2,
                KeyCode::F3 => Key::F3,
                KeyCode::F4 => Key::F4,
                KeyCode::F5 => Key::F5,
                KeyCode::F6 => Key::F6,
                KeyCode::F7 => Key::F7,
                KeyCode::F8 => Key::F8,
                KeyCode::F9 => Key::F9,
                KeyCode::F10 => Key::F10,
                KeyCode::F11 => Key::F11,
                KeyCode::F12 => Key::F12,

                other => Key::Unknown(other as u32),
            };

            (key, code as u32)
        }

        PhysicalKey::Unidentified(_) => (Key::Unknown(0), 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn button_events_carry_last_cursor_position() {
        let input = InputTracker {
            modifiers: Modifiers {
                shift: true,
                ..Modifiers::default()
            },
            cursor: Some((12.0, 34.0)),
        };

        let e = button_event(&input, ElementState::Pressed, WinitMouseButton::Left);

        assert_eq!((e.x, e.y), (12.0, 34.0));
        assert_eq!(e.button, MouseButton::Left);
        assert_eq!(e.state, MouseButtonState::Pressed);
        assert!(e.modifiers.shift);
    }

    #[test]
    fn line_scroll_is_converted_to_pixels() {
        let (dx, dy) = scroll_delta(&MouseScrollDelta::LineDelta(0.0, -2.0));
        assert_eq!(dx, 0.0);
        assert_eq!(dy, -2.0 * ScrollEvent::PIXELS_PER_LINE);

        let pixels = scroll_delta(&MouseScrollDelta::PixelDelta(PhysicalPosition::new(3.0, 4.0)));
        assert_eq!(pixels, (3.0, 4.0));
    }

    #[test]
    fn letter_keys_map_to_letters() {
        assert_eq!(map_key(PhysicalKey::Code(KeyCode::KeyW)).0, Key::W);
        assert_eq!(map_key(PhysicalKey::Code(KeyCode::F5)).0, Key::F5);
        assert!(matches!(map_key(PhysicalKey::Code(KeyCode::NumLock)).0, Key::Unknown(_)));
    }
}
