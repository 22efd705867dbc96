//! The capability interface every windowing backend implements
//!
//! A backend owns exactly one display connection and at most one window. The
//! driver never talks to a backend directly; it goes through
//! [`WindowHandle`](crate::window::WindowHandle), which enforces call order.
//! Backends therefore do not guard against out-of-order calls themselves.

use std::ffi::CStr;
use std::fmt;

use ash::vk;

use crate::core::config::WindowConfig;
use crate::window::error::{SurfaceResult, WsiError, WsiResult};
use crate::window::events::WindowCallbacks;
use crate::window::surface::SurfaceTarget;

/// The native windowing systems this crate can drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BackendKind {
    /// Wayland compositor through xdg-shell
    Wayland,
    /// X11 server through the XCB protocol
    X11,
    /// Win32 window manager
    Win32,
    /// Cocoa windows presented through Metal
    Metal,
    /// No native window; events are scripted
    Headless,
}

impl BackendKind {
    /// Every kind, in dispatcher preference order
    pub const ALL: [Self; 5] = [Self::Wayland, Self::X11, Self::Win32, Self::Metal, Self::Headless];

    /// Short lowercase name used in logs and error messages
    pub const fn name(self) -> &'static str {
        match self {
            Self::Wayland => "wayland",
            Self::X11 => "x11",
            Self::Win32 => "win32",
            Self::Metal => "metal",
            Self::Headless => "headless",
        }
    }

    /// Whether this is a desktop protocol backend shared across Unix systems
    pub const fn is_desktop_protocol(self) -> bool {
        matches!(self, Self::Wayland | Self::X11)
    }

    /// Whether this backend talks to the operating system's own window manager
    pub const fn is_platform_native(self) -> bool {
        matches!(self, Self::Win32 | Self::Metal)
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a backend hands control back to the driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoopModel {
    /// `event_loop` waits for events and only returns once the exit callback stops it
    Blocking,
    /// `update_window` drains queued events and returns immediately, once per frame
    Polling,
}

impl fmt::Display for LoopModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocking => f.write_str("blocking"),
            Self::Polling => f.write_str("polling"),
        }
    }
}

/// Windowing-system integration capabilities
///
/// Implemented once per native windowing system. A backend picks one
/// [`LoopModel`] and implements either [`event_loop`](Self::event_loop) or
/// [`update_window`](Self::update_window); the other keeps its default,
/// which reports [`WsiError::UnsupportedLoopModel`].
///
/// All calls happen on one thread. Callbacks run synchronously from inside
/// the loop method, in the order the native system produced the events.
pub trait WindowBackend {
    /// Which windowing system this is
    fn kind(&self) -> BackendKind;

    /// Which event-loop shape this backend drives
    fn loop_model(&self) -> LoopModel;

    /// Vulkan instance extension needed to build surfaces from this backend's windows
    fn required_extension_name(&self) -> &'static CStr;

    /// Connect to the native windowing system
    ///
    /// Must be called exactly once, before anything else.
    fn init_display(&mut self) -> WsiResult<()>;

    /// Release the connection and everything tied to it
    fn fini_display(&mut self);

    /// Create, map and show the window
    fn init_window(&mut self, config: &WindowConfig) -> WsiResult<()>;

    /// Destroy the window
    ///
    /// Surfaces created from it become invalid; the caller destroys them first.
    fn fini_window(&mut self);

    /// Replace the callback set
    fn set_callbacks(&mut self, callbacks: WindowCallbacks);

    /// Dispatch events until the exit callback returns `Break`
    fn event_loop(&mut self) -> WsiResult<()> {
        Err(WsiError::UnsupportedLoopModel {
            backend: self.kind(),
            supported: self.loop_model(),
            requested: LoopModel::Blocking,
        })
    }

    /// Dispatch the events already queued and return without waiting
    ///
    /// Returns `true` when the exit callback asked to stop during this drain.
    fn update_window(&mut self) -> WsiResult<bool> {
        Err(WsiError::UnsupportedLoopModel {
            backend: self.kind(),
            supported: self.loop_model(),
            requested: LoopModel::Polling,
        })
    }

    /// Build a presentable Vulkan surface for the window
    ///
    /// Checks presentation support on `target.physical_device` first and fails
    /// without side effects when it is missing. The returned surface belongs
    /// to the caller.
    fn create_surface(&self, target: &SurfaceTarget<'_>) -> SurfaceResult<vk::SurfaceKHR>;
}
