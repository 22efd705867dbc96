//! Surface creation through the handle

use ash::vk;

use super::headless_handle;
use crate::backends::headless::HeadlessBackend;
use crate::core::config::WindowConfig;
use crate::window::dispatcher::{compiled_backends, create_backend};
use crate::window::surface::{unloaded_vulkan, SurfaceTarget};
use crate::window::{BackendKind, LoopModel, SurfaceError, WindowHandle, WindowState};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_surface_needs_a_window() {
        let (entry, instance) = unloaded_vulkan();
        let target = SurfaceTarget::new(&entry, &instance, vk::PhysicalDevice::null());

        let (mut handle, _script, _window) = headless_handle(LoopModel::Polling);
        assert_eq!(handle.create_surface(&target), Err(SurfaceError::NoWindow));

        handle.init_display().unwrap();
        assert_eq!(handle.create_surface(&target), Err(SurfaceError::NoWindow));
    }

    #[test]
    fn test_presentation_failure_changes_nothing() {
        let (entry, instance) = unloaded_vulkan();
        let target = SurfaceTarget::new(&entry, &instance, vk::PhysicalDevice::null());

        let backend = HeadlessBackend::new(LoopModel::Polling).without_presentation();
        let window = backend.window();
        let mut handle = WindowHandle::new(Box::new(backend));
        handle.init_display().unwrap();
        handle.init_window(&WindowConfig::new("Test", 640, 480)).unwrap();
        let before = window.borrow().clone();

        assert_eq!(
            handle.create_surface(&target),
            Err(SurfaceError::PresentationUnsupported(BackendKind::Headless))
        );
        assert_eq!(handle.state(), WindowState::WindowReady);
        assert_eq!(*window.borrow(), before);

        // Still usable afterwards
        assert!(!handle.update_window().unwrap());
    }

    #[test]
    fn test_every_compiled_backend_names_its_extension() {
        for kind in compiled_backends() {
            let handle = WindowHandle::new(create_backend(kind).unwrap());
            let name = handle.required_extension_name().to_str().unwrap();
            let expected = match kind {
                BackendKind::Wayland => "VK_KHR_wayland_surface",
                BackendKind::X11 => "VK_KHR_xcb_surface",
                BackendKind::Win32 => "VK_KHR_win32_surface",
                BackendKind::Metal => "VK_EXT_metal_surface",
                BackendKind::Headless => "VK_EXT_headless_surface",
            };
            assert_eq!(name, expected);
            assert_eq!(handle.state(), WindowState::Uninitialized);
        }
    }
}
