//! # Demo WSI
//!
//! Windowing-system integration for the Vulkan demos: one interface over
//! X11 (XCB), Wayland, Win32 and Metal.
//!
//! ## Features
//!
//! - **Backend dispatch**: one backend per process, chosen from the compiled
//!   set and the `WAYLAND_DISPLAY` / `USE_X11` environment variables
//! - **Normalized events**: exit, resize, key and redraw callbacks on every platform
//! - **Two loop models**: blocking (`event_loop`) or polling (`update_window`)
//! - **Surface creation**: `VkSurfaceKHR` for the window, after a presentation check
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use demo_wsi::prelude::*;
//! use std::ops::ControlFlow;
//!
//! fn main() -> Result<(), WsiError> {
//!     demo_wsi::foundation::logging::init_with_default("info");
//!
//!     let mut window = WindowHandle::new(select_backend()?);
//!     window.init_display()?;
//!     window.init_window(&WindowConfig::new("Demo", 640, 480))?;
//!     window.set_callbacks(
//!         WindowCallbacks::new()
//!             .on_key(|pressed, key| if pressed { log::info!("{:?}", key) })
//!             .on_exit(|| ControlFlow::Break(())),
//!     )?;
//!     window.run(|| {})?;
//!     window.fini_window()?;
//!     window.fini_display()
//! }
//! ```

pub mod backends;
pub mod config;
pub mod core;
pub mod foundation;
pub mod window;

#[cfg(test)]
mod tests;

pub use window::{
    select_backend, BackendKind, Key, LoopModel, SurfaceError, WindowBackend, WindowCallbacks, WindowEvent,
    WindowHandle, WindowState, WsiError,
};

/// Common imports for demo drivers
pub mod prelude {
    pub use crate::{
        config::Config,
        core::config::{WindowConfig, WsiConfig},
        window::{
            instance_extensions, select_backend, BackendKind, Key, LoopModel, OwnedSurface, SurfaceError,
            SurfaceTarget, WindowCallbacks, WindowEvent, WindowHandle, WindowState, WsiError, WsiResult,
        },
    };
}
