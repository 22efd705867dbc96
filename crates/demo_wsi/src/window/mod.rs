//! Windowing-system integration
//!
//! One interface over the native windowing APIs, picked once per process.
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────┐
//! │     Demo driver                 │
//! └─────────────┬───────────────────┘
//!               │ select_backend()
//!        ┌──────▼──────┐
//!        │ dispatcher  │ ← compiled set + WAYLAND_DISPLAY / USE_X11
//!        └──────┬──────┘
//!               │ Box<dyn WindowBackend>
//!        ┌──────▼───────┐
//!        │ WindowHandle │ ← lifecycle state machine (handle.rs)
//!        └──────┬───────┘
//!               │ WindowBackend trait (backend.rs)
//!   ┌───────────▼───────────┐
//!   │ backends::x11         │ blocking
//!   │ backends::wayland     │ blocking
//!   │ backends::win32       │ polling
//!   │ backends::metal       │ polling
//!   │ backends::headless    │ either
//!   └───────────────────────┘
//! ```
//!
//! Native events are normalized into [`WindowEvent`] and delivered to the
//! driver's [`WindowCallbacks`] in the order the platform produced them.
//! [`WindowHandle::create_surface`] hands back a `VkSurfaceKHR` for the
//! window after checking that the physical device can present to it.

pub mod backend;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod handle;
pub mod surface;

pub use backend::{BackendKind, LoopModel, WindowBackend};
pub use dispatcher::{select_backend, Environment};
pub use error::{SurfaceError, SurfaceResult, WsiError, WsiResult};
pub use events::{Key, WindowCallbacks, WindowEvent};
pub use handle::{WindowHandle, WindowState};
pub use surface::{instance_extensions, OwnedSurface, SurfaceTarget};
