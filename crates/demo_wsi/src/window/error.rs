//! Error types for the windowing layer

use ash::vk;
use thiserror::Error;

use crate::config::ConfigError;
use crate::window::backend::{BackendKind, LoopModel};
use crate::window::handle::WindowState;

/// Windowing layer errors
#[derive(Error, Debug)]
pub enum WsiError {
    /// The build contains no windowing backend at all
    #[error("no windowing backend compiled in; enable the `x11`, `wayland` or `headless` feature")]
    NoBackendCompiled,

    /// A specific backend was requested but is not part of this build
    #[error("the {0} backend is not compiled into this build")]
    BackendNotCompiled(BackendKind),

    /// The native display server could not be reached
    #[error("cannot open the {backend} display: {reason}")]
    DisplayUnavailable {
        /// Backend that failed
        backend: BackendKind,
        /// What was missing
        reason: String,
    },

    /// The native window system refused to create the window
    #[error("{backend} window creation failed: {reason}")]
    WindowCreationFailed {
        /// Backend that failed
        backend: BackendKind,
        /// What went wrong
        reason: String,
    },

    /// Reading or flushing the native event queue failed
    #[error("{backend} event dispatch failed: {reason}")]
    EventDispatch {
        /// Backend that failed
        backend: BackendKind,
        /// What went wrong
        reason: String,
    },

    /// An operation was called out of lifecycle order
    #[error("{operation} is not valid in the {state:?} state")]
    InvalidState {
        /// Operation that was rejected
        operation: &'static str,
        /// State the window handle was in
        state: WindowState,
    },

    /// An operation was called after the display was closed
    #[error("{operation} called after the display was closed")]
    TornDown {
        /// Operation that was rejected
        operation: &'static str,
    },

    /// The backend does not drive the requested kind of event loop
    #[error("the {backend} backend runs a {supported} event loop, not a {requested} one")]
    UnsupportedLoopModel {
        /// Backend that was asked
        backend: BackendKind,
        /// Loop model the backend implements
        supported: LoopModel,
        /// Loop model that was requested
        requested: LoopModel,
    },

    /// Configuration could not be loaded or is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl WsiError {
    /// Whether the error means no window can be shown at all
    ///
    /// Drivers report these and exit; nothing in this layer retries.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NoBackendCompiled
                | Self::BackendNotCompiled(_)
                | Self::DisplayUnavailable { .. }
                | Self::WindowCreationFailed { .. }
                | Self::Config(_)
        )
    }
}

/// Result type for windowing operations
pub type WsiResult<T> = Result<T, WsiError>;

/// Errors from creating a presentable Vulkan surface
///
/// These are the only errors a caller is expected to recover from, for
/// example by trying another physical device.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceError {
    /// No window exists to present to
    #[error("no window exists to build a surface from")]
    NoWindow,

    /// The physical device cannot present to this window system
    #[error("{0} presentation is not supported by this physical device")]
    PresentationUnsupported(BackendKind),

    /// The instance was created without the backend's surface extension
    #[error("{0} surface functions are not loaded; enable its instance extension")]
    ExtensionNotLoaded(BackendKind),

    /// The backend has no native window a surface could wrap
    #[error("the {0} backend has no native window to present to")]
    NoNativeWindow(BackendKind),

    /// Vulkan returned an error
    #[error("Vulkan API error: {0:?}")]
    Vulkan(vk::Result),
}

/// Result type for surface creation
pub type SurfaceResult<T> = Result<T, SurfaceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(WsiError::NoBackendCompiled.is_fatal());
        assert!(WsiError::DisplayUnavailable {
            backend: BackendKind::X11,
            reason: "DISPLAY not set".to_string(),
        }
        .is_fatal());
        assert!(!WsiError::TornDown { operation: "init_window" }.is_fatal());
    }

    #[test]
    fn test_messages_name_the_backend() {
        let err = WsiError::DisplayUnavailable {
            backend: BackendKind::Wayland,
            reason: "no compositor".to_string(),
        };
        assert_eq!(err.to_string(), "cannot open the wayland display: no compositor");

        let err = SurfaceError::PresentationUnsupported(BackendKind::Win32);
        assert_eq!(err.to_string(), "win32 presentation is not supported by this physical device");
    }
}
