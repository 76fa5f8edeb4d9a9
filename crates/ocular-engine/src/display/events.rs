use std::cell::RefCell;
use std::rc::Rc;

use crate::input::{InputEvent, KeyEvent, MouseButtonEvent, MousePositionEvent, ScrollEvent};

/// Receives the input of the displays it is registered with.
///
/// Every method defaults to ignoring the event.
pub trait EventHandler {
    fn key_event(&mut self, event: &KeyEvent) {
        let _ = event;
    }

    fn mouse_position_event(&mut self, event: &MousePositionEvent) {
        let _ = event;
    }

    fn mouse_button_event(&mut self, event: &MouseButtonEvent) {
        let _ = event;
    }

    fn scroll_event(&mut self, event: &ScrollEvent) {
        let _ = event;
    }
}

pub type SharedEventHandler = Rc<RefCell<dyn EventHandler>>;

/// Identifies a registered callback for removal.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct CallbackId(u64);

struct CallbackQueue<E> {
    entries: Vec<(CallbackId, Box<dyn FnMut(&E)>)>,
}

impl<E> Default for CallbackQueue<E> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<E> CallbackQueue<E> {
    fn dispatch(&mut self, event: &E) {
        for (_, callback) in &mut self.entries {
            callback(event);
        }
    }

    fn remove(&mut self, id: CallbackId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }
}

/// Per-display input callbacks and handlers.
///
/// Events go to callbacks first, in registration order, then to handlers in
/// registration order.
#[derive(Default)]
pub struct EventCallbacks {
    next_id: u64,
    key: CallbackQueue<KeyEvent>,
    mouse_position: CallbackQueue<MousePositionEvent>,
    mouse_button: CallbackQueue<MouseButtonEvent>,
    scroll: CallbackQueue<ScrollEvent>,
    handlers: Vec<SharedEventHandler>,
}

impl EventCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> CallbackId {
        self.next_id += 1;
        CallbackId(self.next_id)
    }

    pub fn add_key_callback(&mut self, callback: impl FnMut(&KeyEvent) + 'static) -> CallbackId {
        let id = self.next_id();
        self.key.entries.push((id, Box::new(callback)));
        id
    }

    pub fn add_mouse_position_callback(
        &mut self,
        callback: impl FnMut(&MousePositionEvent) + 'static,
    ) -> CallbackId {
        let id = self.next_id();
        self.mouse_position.entries.push((id, Box::new(callback)));
        id
    }

    pub fn add_mouse_button_callback(
        &mut self,
        callback: impl FnMut(&MouseButtonEvent) + 'static,
    ) -> CallbackId {
        let id = self.next_id();
        self.mouse_button.entries.push((id, Box::new(callback)));
        id
    }

    pub fn add_scroll_callback(&mut self, callback: impl FnMut(&ScrollEvent) + 'static) -> CallbackId {
        let id = self.next_id();
        self.scroll.entries.push((id, Box::new(callback)));
        id
    }

    /// Returns `false` if no callback has this id.
    pub fn remove_callback(&mut self, id: CallbackId) -> bool {
        self.key.remove(id)
            || self.mouse_position.remove(id)
            || self.mouse_button.remove(id)
            || self.scroll.remove(id)
    }

    /// Registers `handler` once; adding the same handler again does nothing.
    pub fn add_handler(&mut self, handler: SharedEventHandler) {
        if !self.handlers.iter().any(|h| Rc::ptr_eq(h, &handler)) {
            self.handlers.push(handler);
        }
    }

    pub fn remove_handler(&mut self, handler: &SharedEventHandler) {
        self.handlers.retain(|h| !Rc::ptr_eq(h, handler));
    }

    pub fn len(&self) -> usize {
        self.key.entries.len()
            + self.mouse_position.entries.len()
            + self.mouse_button.entries.len()
            + self.scroll.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dispatch(&mut self, event: &InputEvent) {
        match event {
            InputEvent::Key(e) => self.key.dispatch(e),
            InputEvent::MousePosition(e) => self.mouse_position.dispatch(e),
            InputEvent::MouseButton(e) => self.mouse_button.dispatch(e),
            InputEvent::Scroll(e) => self.scroll.dispatch(e),
        }

        for handler in &self.handlers {
            // A handler that is already borrowed is reacting to this very
            // event from further up the stack.
            let Ok(mut handler) = handler.try_borrow_mut() else {
                log::warn!("skipping re-entrant event handler");
                continue;
            };
            match event {
                InputEvent::Key(e) => handler.key_event(e),
                InputEvent::MousePosition(e) => handler.mouse_position_event(e),
                InputEvent::MouseButton(e) => handler.mouse_button_event(e),
                InputEvent::Scroll(e) => handler.scroll_event(e),
            }
        }
    }
}
