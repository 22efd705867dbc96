//! Normalized window events and the driver's callback set
//!
//! Every backend translates its native events (X11 `ConfigureNotify`,
//! `xdg_toplevel.configure`, `WM_SIZE`, ...) into [`WindowEvent`] and hands
//! them, in native queue order, to [`WindowCallbacks::dispatch`]. That single
//! entry point is the only place driver code is called from.

use std::fmt;
use std::ops::ControlFlow;

/// Keys the demos react to; everything else is reported as [`Key::Other`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// Up arrow
    Up,
    /// Down arrow
    Down,
    /// Left arrow
    Left,
    /// Right arrow
    Right,
    /// A key
    A,
    /// Escape key
    Escape,
    /// Any other key
    Other,
}

/// A native event after translation by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowEvent {
    /// The window system asked the window to close
    Close,
    /// The client area changed size
    Resize {
        /// New width in pixels
        width: u32,
        /// New height in pixels
        height: u32,
    },
    /// A key went down or up
    Key {
        /// `true` on press, `false` on release
        pressed: bool,
        /// Which key
        key: Key,
    },
    /// The window contents need to be drawn again
    Redraw,
}

type ExitFn = dyn FnMut() -> ControlFlow<()>;
type ResizeFn = dyn FnMut(u32, u32);
type KeyFn = dyn FnMut(bool, Key);
type RedrawFn = dyn FnMut();

/// Callbacks registered by the application driver
///
/// Only one set is live per backend; registering a new set replaces the old
/// one entirely. The exit callback decides whether the event loop stops:
/// returning [`ControlFlow::Break`] ends a blocking loop and makes
/// `update_window` report `true`.
pub struct WindowCallbacks {
    exit: Box<ExitFn>,
    resize: Box<ResizeFn>,
    key_press: Box<KeyFn>,
    redraw: Box<RedrawFn>,
}

impl WindowCallbacks {
    /// Callbacks that ignore everything except close, which stops the loop
    pub fn new() -> Self {
        Self {
            exit: Box::new(|| ControlFlow::Break(())),
            resize: Box::new(|_, _| {}),
            key_press: Box::new(|_, _| {}),
            redraw: Box::new(|| {}),
        }
    }

    /// Set the close-request callback
    pub fn on_exit(mut self, exit: impl FnMut() -> ControlFlow<()> + 'static) -> Self {
        self.exit = Box::new(exit);
        self
    }

    /// Set the resize callback, called with the new client-area size
    pub fn on_resize(mut self, resize: impl FnMut(u32, u32) + 'static) -> Self {
        self.resize = Box::new(resize);
        self
    }

    /// Set the key callback, called with `(pressed, key)`
    pub fn on_key(mut self, key_press: impl FnMut(bool, Key) + 'static) -> Self {
        self.key_press = Box::new(key_press);
        self
    }

    /// Set the redraw callback
    pub fn on_redraw(mut self, redraw: impl FnMut() + 'static) -> Self {
        self.redraw = Box::new(redraw);
        self
    }

    /// Deliver one event to the matching callback
    ///
    /// Returns `Break` only when the event was a close request and the exit
    /// callback chose to stop.
    pub fn dispatch(&mut self, event: WindowEvent) -> ControlFlow<()> {
        log::trace!("dispatching {:?}", event);
        match event {
            WindowEvent::Close => return (self.exit)(),
            WindowEvent::Resize { width, height } => (self.resize)(width, height),
            WindowEvent::Key { pressed, key } => (self.key_press)(pressed, key),
            WindowEvent::Redraw => (self.redraw)(),
        }
        ControlFlow::Continue(())
    }

    /// Deliver a batch of events in order
    ///
    /// Every event is delivered even after an exit request; the result says
    /// whether any close request asked to stop.
    pub fn dispatch_all(&mut self, events: impl IntoIterator<Item = WindowEvent>) -> ControlFlow<()> {
        let mut flow = ControlFlow::Continue(());
        for event in events {
            if self.dispatch(event).is_break() {
                flow = ControlFlow::Break(());
            }
        }
        flow
    }
}

impl Default for WindowCallbacks {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WindowCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowCallbacks").finish_non_exhaustive()
    }
}
