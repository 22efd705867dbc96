//! Application-facing window handle
//!
//! [`WindowHandle`] owns the backend picked by the dispatcher and is the only
//! way a driver reaches it. It tracks the lifecycle state machine
//!
//! ```text
//! Uninitialized -> DisplayReady -> WindowReady <-> Running
//!                       |               |
//!                       |               v
//!                       |          WindowClosed
//!                       v               |
//!                 DisplayClosed <-------+
//! ```
//!
//! and rejects out-of-order calls, so the backends themselves never see them.
//! `DisplayReady -> DisplayClosed` is only taken when no window was created.
//! Dropping the handle tears down whatever is still open, window first.

use std::ffi::CStr;

use ash::vk;

use crate::core::config::WindowConfig;
use crate::window::backend::{BackendKind, LoopModel, WindowBackend};
use crate::window::error::{SurfaceError, SurfaceResult, WsiError, WsiResult};
use crate::window::events::WindowCallbacks;
use crate::window::surface::SurfaceTarget;

/// Where a [`WindowHandle`] is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WindowState {
    /// Nothing opened yet
    Uninitialized,
    /// Display connection open, no window
    DisplayReady,
    /// Window mapped, loop not running
    WindowReady,
    /// Inside `event_loop` or `update_window`
    Running,
    /// Window destroyed, display still open
    WindowClosed,
    /// Display closed; terminal
    DisplayClosed,
}

/// High-level window handle over the selected backend
pub struct WindowHandle {
    backend: Box<dyn WindowBackend>,
    state: WindowState,
}

impl WindowHandle {
    /// Wrap a freshly constructed backend
    pub fn new(backend: Box<dyn WindowBackend>) -> Self {
        Self {
            backend,
            state: WindowState::Uninitialized,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> WindowState {
        self.state
    }

    /// Which backend this handle drives
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Which loop shape the backend implements
    pub fn loop_model(&self) -> LoopModel {
        self.backend.loop_model()
    }

    /// Platform surface extension the Vulkan instance must enable
    pub fn required_extension_name(&self) -> &'static CStr {
        self.backend.required_extension_name()
    }

    fn expect_state(&self, operation: &'static str, allowed: &[WindowState]) -> WsiResult<()> {
        if allowed.contains(&self.state) {
            return Ok(());
        }
        if self.state == WindowState::DisplayClosed {
            return Err(WsiError::TornDown { operation });
        }
        Err(WsiError::InvalidState {
            operation,
            state: self.state,
        })
    }

    /// Connect to the display server
    pub fn init_display(&mut self) -> WsiResult<()> {
        self.expect_state("init_display", &[WindowState::Uninitialized])?;
        self.backend.init_display()?;
        log::info!("{} display initialized", self.backend.kind());
        self.state = WindowState::DisplayReady;
        Ok(())
    }

    /// Create and show the window
    pub fn init_window(&mut self, config: &WindowConfig) -> WsiResult<()> {
        self.expect_state("init_window", &[WindowState::DisplayReady])?;
        config.validate()?;
        self.backend.init_window(config)?;
        log::info!(
            "{} window '{}' created ({}x{})",
            self.backend.kind(),
            config.title,
            config.width,
            config.height
        );
        self.state = WindowState::WindowReady;
        Ok(())
    }

    /// Register the driver's callbacks, replacing any earlier set
    pub fn set_callbacks(&mut self, callbacks: WindowCallbacks) -> WsiResult<()> {
        self.expect_state("set_callbacks", &[WindowState::DisplayReady, WindowState::WindowReady])?;
        self.backend.set_callbacks(callbacks);
        Ok(())
    }

    /// Run the backend's blocking loop until the exit callback stops it
    pub fn event_loop(&mut self) -> WsiResult<()> {
        self.expect_state("event_loop", &[WindowState::WindowReady])?;
        self.state = WindowState::Running;
        let result = self.backend.event_loop();
        self.state = WindowState::WindowReady;
        result
    }

    /// Drain the backend's queued events once; `true` means exit was requested
    pub fn update_window(&mut self) -> WsiResult<bool> {
        self.expect_state("update_window", &[WindowState::WindowReady])?;
        self.state = WindowState::Running;
        let result = self.backend.update_window();
        self.state = WindowState::WindowReady;
        result
    }

    /// Drive whichever loop the backend implements
    ///
    /// Blocking backends run `event_loop` and never call `frame`. Polling
    /// backends alternate `update_window` and `frame` until exit is requested.
    pub fn run(&mut self, mut frame: impl FnMut()) -> WsiResult<()> {
        match self.loop_model() {
            LoopModel::Blocking => self.event_loop(),
            LoopModel::Polling => {
                while !self.update_window()? {
                    frame();
                }
                Ok(())
            }
        }
    }

    /// Create a Vulkan surface for the window; ownership passes to the caller
    pub fn create_surface(&self, target: &SurfaceTarget<'_>) -> SurfaceResult<vk::SurfaceKHR> {
        if !matches!(self.state, WindowState::WindowReady | WindowState::Running) {
            return Err(SurfaceError::NoWindow);
        }
        self.backend.create_surface(target)
    }

    /// Destroy the window
    pub fn fini_window(&mut self) -> WsiResult<()> {
        self.expect_state("fini_window", &[WindowState::WindowReady])?;
        self.backend.fini_window();
        log::info!("{} window destroyed", self.backend.kind());
        self.state = WindowState::WindowClosed;
        Ok(())
    }

    /// Close the display connection
    pub fn fini_display(&mut self) -> WsiResult<()> {
        self.expect_state("fini_display", &[WindowState::WindowClosed, WindowState::DisplayReady])?;
        self.backend.fini_display();
        log::info!("{} display closed", self.backend.kind());
        self.state = WindowState::DisplayClosed;
        Ok(())
    }
}

impl Drop for WindowHandle {
    fn drop(&mut self) {
        // Running here means a callback unwound out of the loop
        if matches!(self.state, WindowState::WindowReady | WindowState::Running) {
            log::debug!("Window handle dropped with an open window; tearing down");
            self.backend.fini_window();
            self.state = WindowState::WindowClosed;
        }
        if matches!(self.state, WindowState::DisplayReady | WindowState::WindowClosed) {
            self.backend.fini_display();
            self.state = WindowState::DisplayClosed;
        }
    }
}

impl std::fmt::Debug for WindowHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowHandle")
            .field("backend", &self.backend.kind())
            .field("state", &self.state)
            .finish()
    }
}
