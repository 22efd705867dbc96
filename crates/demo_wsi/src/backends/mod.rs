//! Concrete windowing backends
//!
//! Each module is compiled only where its native API exists. The dispatcher in
//! [`crate::window::dispatcher`] decides which of the compiled ones runs.

#[cfg(any(test, feature = "headless"))]
pub mod headless;

#[cfg(feature = "x11")]
pub mod x11;

#[cfg(all(feature = "wayland", unix, not(target_os = "macos")))]
pub mod wayland;

#[cfg(windows)]
pub mod win32;

#[cfg(target_os = "macos")]
pub mod metal;
