//! Metal backend using GLFW
//!
//! GLFW owns the Cocoa window and the `CAMetalLayer` behind it, so surface
//! creation also goes through GLFW rather than raw handles.

use std::ffi::CStr;

use ash::{extensions::ext, vk};

use crate::core::config::WindowConfig;
use crate::window::backend::{BackendKind, LoopModel, WindowBackend};
use crate::window::error::{SurfaceError, SurfaceResult, WsiError, WsiResult};
use crate::window::events::{Key, WindowCallbacks, WindowEvent};
use crate::window::surface::{self, SurfaceTarget};

fn key_from_glfw(key: glfw::Key) -> Key {
    match key {
        glfw::Key::Up => Key::Up,
        glfw::Key::Down => Key::Down,
        glfw::Key::Left => Key::Left,
        glfw::Key::Right => Key::Right,
        glfw::Key::A => Key::A,
        glfw::Key::Escape => Key::Escape,
        _ => Key::Other,
    }
}

fn translate(event: glfw::WindowEvent) -> Option<WindowEvent> {
    match event {
        glfw::WindowEvent::Close => Some(WindowEvent::Close),
        glfw::WindowEvent::FramebufferSize(width, height) => Some(WindowEvent::Resize {
            width: u32::try_from(width).ok()?,
            height: u32::try_from(height).ok()?,
        }),
        glfw::WindowEvent::Key(key, _scancode, action, _mods) => match action {
            glfw::Action::Press => Some(WindowEvent::Key {
                pressed: true,
                key: key_from_glfw(key),
            }),
            glfw::Action::Release => Some(WindowEvent::Key {
                pressed: false,
                key: key_from_glfw(key),
            }),
            glfw::Action::Repeat => None,
        },
        glfw::WindowEvent::Refresh => Some(WindowEvent::Redraw),
        _ => None,
    }
}

struct Window {
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
}

/// Cocoa windowing backend through GLFW
pub struct MetalBackend {
    glfw: Option<glfw::Glfw>,
    window: Option<Window>,
    callbacks: WindowCallbacks,
}

impl MetalBackend {
    /// Create a backend with GLFW not yet initialized
    pub fn new() -> Self {
        Self {
            glfw: None,
            window: None,
            callbacks: WindowCallbacks::new(),
        }
    }
}

impl Default for MetalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowBackend for MetalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Metal
    }

    fn loop_model(&self) -> LoopModel {
        LoopModel::Polling
    }

    fn required_extension_name(&self) -> &'static CStr {
        ext::MetalSurface::name()
    }

    fn init_display(&mut self) -> WsiResult<()> {
        let mut glfw = glfw::init(glfw::fail_on_errors).map_err(|e| WsiError::DisplayUnavailable {
            backend: BackendKind::Metal,
            reason: format!("GLFW initialization failed: {e:?}"),
        })?;
        if !glfw.vulkan_supported() {
            return Err(WsiError::DisplayUnavailable {
                backend: BackendKind::Metal,
                reason: "no Vulkan loader found by GLFW".to_string(),
            });
        }

        // No OpenGL context; Vulkan renders into the window's layer
        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));
        self.glfw = Some(glfw);
        Ok(())
    }

    fn fini_display(&mut self) {
        // Dropping the last Glfw handle terminates the library
        self.glfw.take();
    }

    fn init_window(&mut self, config: &WindowConfig) -> WsiResult<()> {
        let Some(glfw) = self.glfw.as_mut() else {
            return Err(WsiError::WindowCreationFailed {
                backend: BackendKind::Metal,
                reason: "display is not initialized".to_string(),
            });
        };

        let created = if config.fullscreen {
            glfw.with_primary_monitor(|glfw, monitor| {
                let monitor = monitor?;
                let mode = monitor.get_video_mode()?;
                glfw.create_window(mode.width, mode.height, &config.title, glfw::WindowMode::FullScreen(monitor))
            })
        } else {
            glfw.create_window(config.width, config.height, &config.title, glfw::WindowMode::Windowed)
        };
        let (mut window, events) = created.ok_or_else(|| WsiError::WindowCreationFailed {
            backend: BackendKind::Metal,
            reason: "GLFW could not create the window".to_string(),
        })?;

        if let (Some((x, y)), false) = (config.position(), config.fullscreen) {
            window.set_pos(x, y);
        }
        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);
        window.set_refresh_polling(true);
        window.show();

        self.window = Some(Window { window, events });
        Ok(())
    }

    fn fini_window(&mut self) {
        if let Some(mut window) = self.window.take() {
            window.window.set_should_close(true);
        }
    }

    fn set_callbacks(&mut self, callbacks: WindowCallbacks) {
        self.callbacks = callbacks;
    }

    fn update_window(&mut self) -> WsiResult<bool> {
        let (Some(glfw), Some(window)) = (self.glfw.as_mut(), self.window.as_mut()) else {
            return Err(WsiError::EventDispatch {
                backend: BackendKind::Metal,
                reason: "window is not initialized".to_string(),
            });
        };

        glfw.poll_events();
        let mut exit = false;
        for (_, event) in glfw::flush_messages(&window.events) {
            if let Some(event) = translate(event) {
                exit |= self.callbacks.dispatch(event).is_break();
            }
        }
        // GLFW latches the close flag; the exit callback decides instead
        window.window.set_should_close(false);
        Ok(exit)
    }

    fn create_surface(&self, target: &SurfaceTarget<'_>) -> SurfaceResult<vk::SurfaceKHR> {
        let (Some(glfw), Some(window)) = (self.glfw.as_ref(), self.window.as_ref()) else {
            return Err(SurfaceError::NoWindow);
        };

        surface::require_instance_functions(target, BackendKind::Metal, &[c"vkCreateMetalSurfaceEXT"])?;
        let instance = target.instance.handle();
        if !glfw.get_physical_device_presentation_support_raw(
            instance,
            target.physical_device,
            target.queue_family_index,
        ) {
            log::debug!("Physical device {:?} cannot present to Metal", target.physical_device);
            return Err(SurfaceError::PresentationUnsupported(BackendKind::Metal));
        }

        let mut surface = vk::SurfaceKHR::null();
        let result = window
            .window
            .create_window_surface(instance, std::ptr::null(), &mut surface);
        if result == vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(SurfaceError::Vulkan(result))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glfw_key_mapping() {
        assert_eq!(key_from_glfw(glfw::Key::Escape), Key::Escape);
        assert_eq!(key_from_glfw(glfw::Key::A), Key::A);
        assert_eq!(key_from_glfw(glfw::Key::B), Key::Other);
    }

    #[test]
    fn test_glfw_event_translation() {
        assert_eq!(translate(glfw::WindowEvent::Close), Some(WindowEvent::Close));
        assert_eq!(
            translate(glfw::WindowEvent::FramebufferSize(800, 600)),
            Some(WindowEvent::Resize {
                width: 800,
                height: 600
            })
        );
        assert_eq!(
            translate(glfw::WindowEvent::Key(
                glfw::Key::Up,
                0,
                glfw::Action::Repeat,
                glfw::Modifiers::empty()
            )),
            None
        );
        assert_eq!(translate(glfw::WindowEvent::Refresh), Some(WindowEvent::Redraw));
    }
}
