//! Vulkan surface handshake
//!
//! Backends build `VkSurfaceKHR`s from their native handles here. Once
//! created, a surface belongs to the graphics layer; [`OwnedSurface`] is the
//! RAII wrapper for callers who want it destroyed on drop.

use std::ffi::CStr;

use ash::{extensions::khr, vk};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::window::backend::BackendKind;
use crate::window::error::{SurfaceError, SurfaceResult};

/// The Vulkan objects a surface is created against
#[derive(Clone, Copy)]
pub struct SurfaceTarget<'a> {
    /// Loaded Vulkan entry points
    pub entry: &'a ash::Entry,
    /// Instance with the surface extensions enabled
    pub instance: &'a ash::Instance,
    /// Device whose presentation support is checked
    pub physical_device: vk::PhysicalDevice,
    /// Queue family that will present
    pub queue_family_index: u32,
}

impl<'a> SurfaceTarget<'a> {
    /// Target queue family 0 of `physical_device`
    pub fn new(entry: &'a ash::Entry, instance: &'a ash::Instance, physical_device: vk::PhysicalDevice) -> Self {
        Self {
            entry,
            instance,
            physical_device,
            queue_family_index: 0,
        }
    }

    /// Check presentation on a different queue family
    pub fn with_queue_family(mut self, queue_family_index: u32) -> Self {
        self.queue_family_index = queue_family_index;
        self
    }
}

/// Instance extensions a driver must enable to present through a backend
///
/// `VK_KHR_surface` plus the backend's platform extension.
pub fn instance_extensions(platform_extension: &'static CStr) -> [&'static CStr; 2] {
    [khr::Surface::name(), platform_extension]
}

/// Check that the instance resolves every named command
///
/// Extension loaders in ash replace missing commands with stubs that abort the
/// process, so backends call this before building one.
pub(crate) fn require_instance_functions(
    target: &SurfaceTarget<'_>,
    backend: BackendKind,
    names: &[&CStr],
) -> SurfaceResult<()> {
    for name in names {
        // SAFETY: `name` is NUL-terminated and the instance handle belongs to `entry`.
        let function = unsafe {
            target
                .entry
                .get_instance_proc_addr(target.instance.handle(), name.as_ptr())
        };
        if function.is_none() {
            log::debug!("{} is not loaded for the {} backend", name.to_string_lossy(), backend);
            return Err(SurfaceError::ExtensionNotLoaded(backend));
        }
    }
    Ok(())
}

/// Create a surface from raw native handles
///
/// Callers check presentation support before getting here.
pub(crate) fn create_from_raw_handles(
    target: &SurfaceTarget<'_>,
    display: RawDisplayHandle,
    window: RawWindowHandle,
) -> SurfaceResult<vk::SurfaceKHR> {
    // SAFETY: the handles come from a live display connection and window owned
    // by the calling backend, and the instance was created by the caller with
    // the backend's surface extension enabled.
    let surface = unsafe { ash_window::create_surface(target.entry, target.instance, display, window, None) }
        .map_err(SurfaceError::Vulkan)?;
    log::debug!("Created Vulkan surface {:?}", surface);
    Ok(surface)
}

/// Vulkan surface wrapper that destroys the surface on drop
///
/// Drop it before calling `fini_window` on the backend it came from.
pub struct OwnedSurface {
    surface_loader: khr::Surface,
    surface: vk::SurfaceKHR,
}

impl OwnedSurface {
    /// Take ownership of a surface returned by `create_surface`
    pub fn new(entry: &ash::Entry, instance: &ash::Instance, surface: vk::SurfaceKHR) -> Self {
        Self {
            surface_loader: khr::Surface::new(entry, instance),
            surface,
        }
    }

    /// Get the underlying surface handle
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.surface
    }

    /// Check if a queue family supports presentation to this surface
    pub fn supports_present(&self, physical_device: vk::PhysicalDevice, queue_family_index: u32) -> SurfaceResult<bool> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_support(physical_device, queue_family_index, self.surface)
                .map_err(SurfaceError::Vulkan)
        }
    }

    /// Get surface capabilities for a physical device
    pub fn capabilities(&self, physical_device: vk::PhysicalDevice) -> SurfaceResult<vk::SurfaceCapabilitiesKHR> {
        unsafe {
            self.surface_loader
                .get_physical_device_surface_capabilities(physical_device, self.surface)
                .map_err(SurfaceError::Vulkan)
        }
    }
}

impl Drop for OwnedSurface {
    fn drop(&mut self) {
        unsafe {
            self.surface_loader.destroy_surface(self.surface, None);
        }
    }
}

/// Vulkan objects whose every entry point is missing
///
/// Good enough for code paths that must fail before touching Vulkan.
#[cfg(test)]
pub(crate) fn unloaded_vulkan() -> (ash::Entry, ash::Instance) {
    unsafe extern "system" fn no_proc_addr(
        _instance: vk::Instance,
        _name: *const std::os::raw::c_char,
    ) -> vk::PFN_vkVoidFunction {
        None
    }

    let static_fn = || vk::StaticFn {
        get_instance_proc_addr: no_proc_addr,
    };
    // SAFETY: every lookup returns null, so ash installs panicking stubs and
    // nothing is ever called through a dangling pointer.
    unsafe {
        let entry = ash::Entry::from_static_fn(static_fn());
        let instance = ash::Instance::load(&static_fn(), vk::Instance::null());
        (entry, instance)
    }
}
