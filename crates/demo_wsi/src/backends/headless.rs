//! Headless backend
//!
//! No native window exists; events come from an [`EventScript`] the test or CI
//! driver fills in. It can run either loop model so both driver shapes can be
//! exercised without a display server.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::ffi::CStr;
use std::rc::Rc;

use ash::vk;

use crate::core::config::WindowConfig;
use crate::window::backend::{BackendKind, LoopModel, WindowBackend};
use crate::window::error::{SurfaceError, SurfaceResult, WsiError, WsiResult};
use crate::window::events::{WindowCallbacks, WindowEvent};
use crate::window::surface::SurfaceTarget;

/// Shared queue of synthetic native events
///
/// Clones share the same queue, so a driver can keep one after handing the
/// backend to a [`WindowHandle`](crate::window::WindowHandle).
#[derive(Debug, Clone, Default)]
pub struct EventScript {
    queue: Rc<RefCell<VecDeque<WindowEvent>>>,
}

impl EventScript {
    /// Append one event
    pub fn push(&self, event: WindowEvent) {
        self.queue.borrow_mut().push_back(event);
    }

    /// Append several events in order
    pub fn extend(&self, events: impl IntoIterator<Item = WindowEvent>) {
        self.queue.borrow_mut().extend(events);
    }

    /// Number of events not yet delivered
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    fn pop(&self) -> Option<WindowEvent> {
        self.queue.borrow_mut().pop_front()
    }

    fn drain(&self) -> Vec<WindowEvent> {
        self.queue.borrow_mut().drain(..).collect()
    }
}

/// The window the headless backend pretends to show
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlessWindow {
    /// Title it was created with
    pub title: String,
    /// Current size, updated by scripted resizes
    pub size: (u32, u32),
}

/// Scripted backend with no native window
#[derive(Debug)]
pub struct HeadlessBackend {
    loop_model: LoopModel,
    presentation_supported: bool,
    script: EventScript,
    display_open: bool,
    window: Rc<RefCell<Option<HeadlessWindow>>>,
    callbacks: WindowCallbacks,
}

impl HeadlessBackend {
    /// Create a backend driving the given loop model
    pub fn new(loop_model: LoopModel) -> Self {
        Self {
            loop_model,
            presentation_supported: true,
            script: EventScript::default(),
            display_open: false,
            window: Rc::new(RefCell::new(None)),
            callbacks: WindowCallbacks::new(),
        }
    }

    /// Make every physical device report no presentation support
    pub fn without_presentation(mut self) -> Self {
        self.presentation_supported = false;
        self
    }

    /// Handle for injecting events
    pub fn script(&self) -> EventScript {
        self.script.clone()
    }

    /// Observer of the window, shared with the backend
    pub fn window(&self) -> Rc<RefCell<Option<HeadlessWindow>>> {
        Rc::clone(&self.window)
    }

    /// Whether `init_display` ran and `fini_display` did not
    pub fn display_open(&self) -> bool {
        self.display_open
    }

    fn deliver(&mut self, event: WindowEvent) -> bool {
        if let WindowEvent::Resize { width, height } = event {
            if let Some(window) = self.window.borrow_mut().as_mut() {
                window.size = (width, height);
            }
        }
        self.callbacks.dispatch(event).is_break()
    }
}

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new(LoopModel::Polling)
    }
}

impl WindowBackend for HeadlessBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Headless
    }

    fn loop_model(&self) -> LoopModel {
        self.loop_model
    }

    fn required_extension_name(&self) -> &'static CStr {
        vk::ExtHeadlessSurfaceFn::name()
    }

    fn init_display(&mut self) -> WsiResult<()> {
        self.display_open = true;
        Ok(())
    }

    fn fini_display(&mut self) {
        self.display_open = false;
    }

    fn init_window(&mut self, config: &WindowConfig) -> WsiResult<()> {
        *self.window.borrow_mut() = Some(HeadlessWindow {
            title: config.title.clone(),
            size: (config.width, config.height),
        });
        Ok(())
    }

    fn fini_window(&mut self) {
        self.window.borrow_mut().take();
    }

    fn set_callbacks(&mut self, callbacks: WindowCallbacks) {
        self.callbacks = callbacks;
    }

    /// Dispatch scripted events until exit is requested or the script runs dry
    ///
    /// An empty script stands in for the display server going away.
    fn event_loop(&mut self) -> WsiResult<()> {
        if self.loop_model != LoopModel::Blocking {
            return Err(WsiError::UnsupportedLoopModel {
                backend: self.kind(),
                supported: self.loop_model,
                requested: LoopModel::Blocking,
            });
        }
        while let Some(event) = self.script.pop() {
            if self.deliver(event) {
                break;
            }
        }
        Ok(())
    }

    fn update_window(&mut self) -> WsiResult<bool> {
        if self.loop_model != LoopModel::Polling {
            return Err(WsiError::UnsupportedLoopModel {
                backend: self.kind(),
                supported: self.loop_model,
                requested: LoopModel::Polling,
            });
        }
        let mut exit = false;
        for event in self.script.drain() {
            exit |= self.deliver(event);
        }
        Ok(exit)
    }

    fn create_surface(&self, _target: &SurfaceTarget<'_>) -> SurfaceResult<vk::SurfaceKHR> {
        if self.window.borrow().is_none() {
            return Err(SurfaceError::NoWindow);
        }
        if !self.presentation_supported {
            return Err(SurfaceError::PresentationUnsupported(BackendKind::Headless));
        }
        Err(SurfaceError::NoNativeWindow(BackendKind::Headless))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ops::ControlFlow;

    #[test]
    fn test_polling_drains_everything_queued() {
        let mut backend = HeadlessBackend::new(LoopModel::Polling);
        let script = backend.script();
        backend.init_display().unwrap();
        backend.init_window(&WindowConfig::new("t", 10, 10)).unwrap();

        script.extend([WindowEvent::Redraw, WindowEvent::Resize { width: 20, height: 30 }]);
        assert!(!backend.update_window().unwrap());
        assert_eq!(script.pending(), 0);
        assert_eq!(backend.window().borrow().as_ref().unwrap().size, (20, 30));

        // Nothing queued: returns straight away
        assert!(!backend.update_window().unwrap());
    }

    #[test]
    fn test_blocking_stops_at_exit_and_keeps_the_rest() {
        let mut backend = HeadlessBackend::new(LoopModel::Blocking);
        let script = backend.script();
        script.extend([WindowEvent::Redraw, WindowEvent::Close, WindowEvent::Redraw]);

        backend.event_loop().unwrap();
        assert_eq!(script.pending(), 1);
    }

    #[test]
    fn test_close_ignored_when_exit_continues() {
        let mut backend = HeadlessBackend::new(LoopModel::Polling);
        backend.set_callbacks(WindowCallbacks::new().on_exit(|| ControlFlow::Continue(())));
        backend.script().push(WindowEvent::Close);
        assert!(!backend.update_window().unwrap());
    }

    #[test]
    fn test_wrong_loop_model_rejected() {
        let mut polling = HeadlessBackend::new(LoopModel::Polling);
        assert!(polling.event_loop().is_err());

        let mut blocking = HeadlessBackend::new(LoopModel::Blocking);
        assert!(blocking.update_window().is_err());
    }
}
