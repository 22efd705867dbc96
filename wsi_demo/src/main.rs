//! WSI demo driver
//!
//! Opens a window on whichever backend the dispatcher picks, builds a Vulkan
//! surface for it on the first physical device that can present, and runs
//! the backend's event loop until the window is closed.
//!
//! Usage: `wsi_demo [config.toml|config.ron]` (a missing file means defaults)

use std::cell::Cell;
use std::ffi::CStr;
use std::ops::ControlFlow;
use std::os::raw::c_char;
use std::path::PathBuf;
use std::rc::Rc;

use ash::vk;
use demo_wsi::config::ConfigError;
use demo_wsi::foundation::logging;
use demo_wsi::prelude::*;
use thiserror::Error;

const APP_NAME: &CStr = c"wsi_demo";

#[derive(Debug, Error)]
enum DemoError {
    #[error(transparent)]
    Wsi(#[from] WsiError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Vulkan loader unavailable: {0}")]
    Loader(#[from] ash::LoadingError),

    #[error("Vulkan call failed: {0}")]
    Vulkan(#[from] vk::Result),
}

/// Vulkan instance plus the window's surface, torn down before the window
struct Presentation {
    entry: ash::Entry,
    instance: ash::Instance,
    surface: Option<OwnedSurface>,
}

impl Presentation {
    fn new(window: &WindowHandle) -> Result<Self, DemoError> {
        let entry = unsafe { ash::Entry::load()? };

        let mut extensions: Vec<*const c_char> = instance_extensions(window.required_extension_name())
            .iter()
            .map(|name| name.as_ptr())
            .collect();
        let mut flags = vk::InstanceCreateFlags::empty();
        if cfg!(target_os = "macos") {
            // MoltenVK is only enumerated as a portability driver
            extensions.push(vk::KhrPortabilityEnumerationFn::name().as_ptr());
            flags |= vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR;
        }

        let app_info = vk::ApplicationInfo::builder()
            .application_name(APP_NAME)
            .application_version(vk::make_api_version(0, 0, 1, 0))
            .engine_name(APP_NAME)
            .api_version(vk::API_VERSION_1_0);
        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .flags(flags);
        let instance = unsafe { entry.create_instance(&create_info, None)? };

        let mut presentation = Self {
            entry,
            instance,
            surface: None,
        };
        presentation.surface = presentation.first_presentable_surface(window)?;
        Ok(presentation)
    }

    fn first_presentable_surface(&self, window: &WindowHandle) -> Result<Option<OwnedSurface>, DemoError> {
        let devices = unsafe { self.instance.enumerate_physical_devices()? };

        for physical_device in devices {
            let properties = unsafe { self.instance.get_physical_device_properties(physical_device) };
            let name = unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }.to_string_lossy();

            let target = SurfaceTarget::new(&self.entry, &self.instance, physical_device);
            match window.create_surface(&target) {
                Ok(handle) => {
                    let surface = OwnedSurface::new(&self.entry, &self.instance, handle);
                    match surface.supports_present(physical_device, target.queue_family_index) {
                        Ok(true) => {}
                        Ok(false) => log::warn!(
                            "Queue family {} of '{}' cannot present to the surface",
                            target.queue_family_index,
                            name
                        ),
                        Err(e) => log::warn!("Surface support query failed on '{}': {}", name, e),
                    }
                    match surface.capabilities(physical_device) {
                        Ok(caps) => log::info!(
                            "Surface created on '{}' (extent {}x{}, {}..{} images)",
                            name,
                            caps.current_extent.width,
                            caps.current_extent.height,
                            caps.min_image_count,
                            caps.max_image_count
                        ),
                        Err(e) => log::warn!("Surface created on '{}' but capabilities failed: {}", name, e),
                    }
                    return Ok(Some(surface));
                }
                Err(e) => log::warn!("Skipping '{}': {}", name, e),
            }
        }

        log::warn!("No physical device can present to this window");
        Ok(None)
    }
}

impl Drop for Presentation {
    fn drop(&mut self) {
        self.surface.take();
        unsafe {
            self.instance.destroy_instance(None);
        }
    }
}

fn run(config: &WsiConfig) -> Result<(), DemoError> {
    config.validate()?;

    let mut window = WindowHandle::new(select_backend()?);
    window.init_display()?;
    window.init_window(&config.window)?;
    log::info!(
        "Running on the {} backend ({} loop)",
        window.backend_kind(),
        window.loop_model()
    );

    let redraws = Rc::new(Cell::new(0_u64));
    let redraw_count = Rc::clone(&redraws);
    window.set_callbacks(
        WindowCallbacks::new()
            .on_exit(|| {
                log::info!("Close requested");
                ControlFlow::Break(())
            })
            .on_resize(|width, height| log::info!("Window resized to {}x{}", width, height))
            .on_key(|pressed, key| log::debug!("{:?} {}", key, if pressed { "down" } else { "up" }))
            .on_redraw(move || redraw_count.set(redraw_count.get() + 1)),
    )?;

    let presentation = match Presentation::new(&window) {
        Ok(presentation) => Some(presentation),
        Err(e) => {
            log::warn!("Continuing without a Vulkan surface: {}", e);
            None
        }
    };

    let mut frames = 0_u64;
    window.run(|| frames += 1)?;
    log::info!("Event loop finished ({} polled frames, {} redraws)", frames, redraws.get());

    // The surface must go before the window it was built from
    drop(presentation);
    window.fini_window()?;
    window.fini_display()?;
    Ok(())
}

fn main() {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = match &config_path {
        Some(path) => WsiConfig::load_or_default(path),
        None => Ok(WsiConfig::default()),
    };

    let default_filter = config
        .as_ref()
        .map_or_else(|_| "info".to_string(), |config| config.log_level.clone());
    logging::init_with_default(&default_filter);

    log::info!("Starting WSI demo");
    let result = config.map_err(DemoError::from).and_then(|config| run(&config));

    if let Err(e) = result {
        log::error!("WSI demo failed: {}", e);
        std::process::exit(1);
    }
    log::info!("WSI demo finished");
}
