//! Wayland backend through xdg-shell
//!
//! Binds `wl_compositor`, `xdg_wm_base` and (when present) `wl_seat`, and runs
//! a blocking loop over the connection's event queue. Protocol handlers only
//! queue [`WindowEvent`]s; the callbacks run afterwards, in the same order.

use std::collections::VecDeque;
use std::ffi::CStr;

use ash::{extensions::khr, vk};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle, WaylandDisplayHandle, WaylandWindowHandle};
use wayland_client::globals::{registry_queue_init, GlobalListContents};
use wayland_client::protocol::{wl_compositor, wl_keyboard, wl_registry, wl_seat, wl_surface};
use wayland_client::{delegate_noop, Connection, Dispatch, EventQueue, Proxy, QueueHandle, WEnum};
use wayland_protocols::xdg::shell::client::{xdg_surface, xdg_toplevel, xdg_wm_base};

use crate::core::config::WindowConfig;
use crate::window::backend::{BackendKind, LoopModel, WindowBackend};
use crate::window::error::{SurfaceError, SurfaceResult, WsiError, WsiResult};
use crate::window::events::{Key, WindowCallbacks, WindowEvent};
use crate::window::surface::{self, SurfaceTarget};

/// Commands the `WaylandSurface` loader needs from the instance
const SURFACE_FUNCTIONS: [&CStr; 2] = [
    c"vkGetPhysicalDeviceWaylandPresentationSupportKHR",
    c"vkCreateWaylandSurfaceKHR",
];

const APP_ID: &str = "demo_wsi";

// Linux evdev key codes, as delivered by wl_keyboard.key
const KEY_ESC: u32 = 1;
const KEY_A: u32 = 30;
const KEY_UP: u32 = 103;
const KEY_LEFT: u32 = 105;
const KEY_RIGHT: u32 = 106;
const KEY_DOWN: u32 = 108;

fn key_from_evdev(code: u32) -> Key {
    match code {
        KEY_UP => Key::Up,
        KEY_DOWN => Key::Down,
        KEY_LEFT => Key::Left,
        KEY_RIGHT => Key::Right,
        KEY_A => Key::A,
        KEY_ESC => Key::Escape,
        _ => Key::Other,
    }
}

/// Protocol state updated by the dispatch handlers
#[derive(Debug, Default)]
struct WaylandState {
    events: VecDeque<WindowEvent>,
    configured: bool,
    size: (u32, u32),
    keyboard: Option<wl_keyboard::WlKeyboard>,
}

impl WaylandState {
    fn toplevel_configure(&mut self, width: i32, height: i32) {
        // Zero means the compositor leaves the size to us
        let (Ok(width), Ok(height)) = (u32::try_from(width), u32::try_from(height)) else {
            return;
        };
        if width == 0 || height == 0 || (width, height) == self.size {
            return;
        }
        self.size = (width, height);
        self.events.push_back(WindowEvent::Resize { width, height });
    }
}

impl Dispatch<wl_registry::WlRegistry, GlobalListContents> for WaylandState {
    fn event(
        _state: &mut Self,
        _registry: &wl_registry::WlRegistry,
        _event: wl_registry::Event,
        _data: &GlobalListContents,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<xdg_wm_base::XdgWmBase, ()> for WaylandState {
    fn event(
        _state: &mut Self,
        wm_base: &xdg_wm_base::XdgWmBase,
        event: xdg_wm_base::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let xdg_wm_base::Event::Ping { serial } = event {
            wm_base.pong(serial);
        }
    }
}

impl Dispatch<xdg_surface::XdgSurface, ()> for WaylandState {
    fn event(
        state: &mut Self,
        xdg_surface: &xdg_surface::XdgSurface,
        event: xdg_surface::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let xdg_surface::Event::Configure { serial } = event {
            xdg_surface.ack_configure(serial);
            state.configured = true;
            state.events.push_back(WindowEvent::Redraw);
        }
    }
}

impl Dispatch<xdg_toplevel::XdgToplevel, ()> for WaylandState {
    fn event(
        state: &mut Self,
        _toplevel: &xdg_toplevel::XdgToplevel,
        event: xdg_toplevel::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            xdg_toplevel::Event::Configure { width, height, .. } => state.toplevel_configure(width, height),
            xdg_toplevel::Event::Close => state.events.push_back(WindowEvent::Close),
            _ => {}
        }
    }
}

impl Dispatch<wl_seat::WlSeat, ()> for WaylandState {
    fn event(
        state: &mut Self,
        seat: &wl_seat::WlSeat,
        event: wl_seat::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        if let wl_seat::Event::Capabilities {
            capabilities: WEnum::Value(capabilities),
        } = event
        {
            if capabilities.contains(wl_seat::Capability::Keyboard) && state.keyboard.is_none() {
                state.keyboard = Some(seat.get_keyboard(qh, ()));
            }
        }
    }
}

impl Dispatch<wl_keyboard::WlKeyboard, ()> for WaylandState {
    fn event(
        state: &mut Self,
        _keyboard: &wl_keyboard::WlKeyboard,
        event: wl_keyboard::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let wl_keyboard::Event::Key {
            key,
            state: WEnum::Value(key_state),
            ..
        } = event
        {
            state.events.push_back(WindowEvent::Key {
                pressed: key_state == wl_keyboard::KeyState::Pressed,
                key: key_from_evdev(key),
            });
        }
    }
}

delegate_noop!(WaylandState: ignore wl_compositor::WlCompositor);
delegate_noop!(WaylandState: ignore wl_surface::WlSurface);

struct Display {
    conn: Connection,
    queue: EventQueue<WaylandState>,
    state: WaylandState,
    compositor: wl_compositor::WlCompositor,
    wm_base: xdg_wm_base::XdgWmBase,
    // Held so the seat keeps delivering capabilities
    _seat: Option<wl_seat::WlSeat>,
}

struct Window {
    surface: wl_surface::WlSurface,
    xdg_surface: xdg_surface::XdgSurface,
    toplevel: xdg_toplevel::XdgToplevel,
}

/// xdg-shell windowing backend
pub struct WaylandBackend {
    display: Option<Display>,
    window: Option<Window>,
    callbacks: WindowCallbacks,
}

impl WaylandBackend {
    /// Create an unconnected backend
    pub fn new() -> Self {
        Self {
            display: None,
            window: None,
            callbacks: WindowCallbacks::new(),
        }
    }

    fn display_error(reason: impl ToString) -> WsiError {
        WsiError::DisplayUnavailable {
            backend: BackendKind::Wayland,
            reason: reason.to_string(),
        }
    }

    fn window_error(reason: impl ToString) -> WsiError {
        WsiError::WindowCreationFailed {
            backend: BackendKind::Wayland,
            reason: reason.to_string(),
        }
    }

    fn dispatch_error(reason: impl ToString) -> WsiError {
        WsiError::EventDispatch {
            backend: BackendKind::Wayland,
            reason: reason.to_string(),
        }
    }
}

impl Default for WaylandBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowBackend for WaylandBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Wayland
    }

    fn loop_model(&self) -> LoopModel {
        LoopModel::Blocking
    }

    fn required_extension_name(&self) -> &'static CStr {
        khr::WaylandSurface::name()
    }

    fn init_display(&mut self) -> WsiResult<()> {
        let conn = Connection::connect_to_env().map_err(Self::display_error)?;
        let (globals, mut queue) = registry_queue_init::<WaylandState>(&conn).map_err(Self::display_error)?;
        let qh = queue.handle();

        let compositor: wl_compositor::WlCompositor = globals
            .bind(&qh, 1..=4, ())
            .map_err(|e| Self::display_error(format!("wl_compositor: {e}")))?;
        let wm_base: xdg_wm_base::XdgWmBase = globals
            .bind(&qh, 1..=2, ())
            .map_err(|e| Self::display_error(format!("xdg_wm_base: {e}")))?;
        let seat: Option<wl_seat::WlSeat> = match globals.bind(&qh, 1..=5, ()) {
            Ok(seat) => Some(seat),
            Err(e) => {
                log::warn!("No wl_seat available, keyboard input disabled: {}", e);
                None
            }
        };

        let mut state = WaylandState::default();
        queue.roundtrip(&mut state).map_err(Self::display_error)?;
        log::debug!("Bound Wayland globals (keyboard: {})", state.keyboard.is_some());

        self.display = Some(Display {
            conn,
            queue,
            state,
            compositor,
            wm_base,
            _seat: seat,
        });
        Ok(())
    }

    fn fini_display(&mut self) {
        if let Some(display) = self.display.take() {
            if let Some(keyboard) = &display.state.keyboard {
                if keyboard.version() >= 3 {
                    keyboard.release();
                }
            }
            display.wm_base.destroy();
            if let Err(e) = display.conn.flush() {
                log::warn!("Failed to flush Wayland connection on close: {}", e);
            }
        }
    }

    fn init_window(&mut self, config: &WindowConfig) -> WsiResult<()> {
        let display = self
            .display
            .as_mut()
            .ok_or_else(|| Self::window_error("display is not initialized"))?;
        let qh = display.queue.handle();

        let surface = display.compositor.create_surface(&qh, ());
        let xdg_surface = display.wm_base.get_xdg_surface(&surface, &qh, ());
        let toplevel = xdg_surface.get_toplevel(&qh, ());
        toplevel.set_title(config.title.clone());
        toplevel.set_app_id(APP_ID.to_string());
        if config.fullscreen {
            toplevel.set_fullscreen(None);
        }
        if config.position().is_some() {
            log::debug!("Wayland compositors place windows themselves; ignoring requested position");
        }

        display.state.size = (config.width, config.height);
        display.state.configured = false;
        surface.commit();

        // The surface may not be presented to before the first configure
        while !display.state.configured {
            display
                .queue
                .blocking_dispatch(&mut display.state)
                .map_err(Self::window_error)?;
        }

        self.window = Some(Window {
            surface,
            xdg_surface,
            toplevel,
        });
        Ok(())
    }

    fn fini_window(&mut self) {
        let Some(window) = self.window.take() else {
            return;
        };
        window.toplevel.destroy();
        window.xdg_surface.destroy();
        window.surface.destroy();
        if let Some(display) = self.display.as_mut() {
            display.state.events.clear();
            if let Err(e) = display.conn.flush() {
                log::warn!("Failed to flush Wayland connection: {}", e);
            }
        }
    }

    fn set_callbacks(&mut self, callbacks: WindowCallbacks) {
        self.callbacks = callbacks;
    }

    fn event_loop(&mut self) -> WsiResult<()> {
        let Some(display) = self.display.as_mut() else {
            return Err(Self::dispatch_error("display is not initialized"));
        };

        loop {
            while let Some(event) = display.state.events.pop_front() {
                if self.callbacks.dispatch(event).is_break() {
                    return Ok(());
                }
            }
            display
                .queue
                .blocking_dispatch(&mut display.state)
                .map_err(Self::dispatch_error)?;
        }
    }

    fn create_surface(&self, target: &SurfaceTarget<'_>) -> SurfaceResult<vk::SurfaceKHR> {
        let (Some(display), Some(window)) = (self.display.as_ref(), self.window.as_ref()) else {
            return Err(SurfaceError::NoWindow);
        };
        let display_ptr = display.conn.backend().display_ptr();

        surface::require_instance_functions(target, BackendKind::Wayland, &SURFACE_FUNCTIONS)?;
        let loader = khr::WaylandSurface::new(target.entry, target.instance);
        // SAFETY: `display_ptr` is the live wl_display behind `display.conn`.
        let supported = unsafe {
            loader.get_physical_device_wayland_presentation_support(
                target.physical_device,
                target.queue_family_index,
                &mut *display_ptr.cast::<vk::wl_display>(),
            )
        };
        if !supported {
            log::debug!("Physical device {:?} cannot present to Wayland", target.physical_device);
            return Err(SurfaceError::PresentationUnsupported(BackendKind::Wayland));
        }

        let mut display_handle = WaylandDisplayHandle::empty();
        display_handle.display = display_ptr.cast();
        let mut window_handle = WaylandWindowHandle::empty();
        window_handle.surface = window.surface.id().as_ptr().cast();

        surface::create_from_raw_handles(
            target,
            RawDisplayHandle::Wayland(display_handle),
            RawWindowHandle::Wayland(window_handle),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evdev_mapping() {
        assert_eq!(key_from_evdev(KEY_UP), Key::Up);
        assert_eq!(key_from_evdev(KEY_DOWN), Key::Down);
        assert_eq!(key_from_evdev(KEY_LEFT), Key::Left);
        assert_eq!(key_from_evdev(KEY_RIGHT), Key::Right);
        assert_eq!(key_from_evdev(KEY_A), Key::A);
        assert_eq!(key_from_evdev(KEY_ESC), Key::Escape);
        assert_eq!(key_from_evdev(57), Key::Other);
    }

    #[test]
    fn test_configure_only_reports_real_size_changes() {
        let mut state = WaylandState {
            size: (640, 480),
            ..WaylandState::default()
        };

        state.toplevel_configure(0, 0);
        state.toplevel_configure(640, 480);
        state.toplevel_configure(800, 600);
        state.toplevel_configure(-1, 10);

        assert_eq!(
            state.events.into_iter().collect::<Vec<_>>(),
            vec![WindowEvent::Resize {
                width: 800,
                height: 600
            }]
        );
    }

    #[test]
    fn test_unconnected_backend_has_no_surface() {
        let backend = WaylandBackend::new();
        assert_eq!(backend.loop_model(), LoopModel::Blocking);
        assert_eq!(backend.required_extension_name().to_str().unwrap(), "VK_KHR_wayland_surface");

        let (entry, instance) = surface::unloaded_vulkan();
        let target = SurfaceTarget::new(&entry, &instance, vk::PhysicalDevice::null());
        assert_eq!(backend.create_surface(&target), Err(SurfaceError::NoWindow));
    }

    #[test]
    fn test_surface_functions_checked_before_loading() {
        let (entry, instance) = surface::unloaded_vulkan();
        let target = SurfaceTarget::new(&entry, &instance, vk::PhysicalDevice::null());
        assert_eq!(
            surface::require_instance_functions(&target, BackendKind::Wayland, &SURFACE_FUNCTIONS),
            Err(SurfaceError::ExtensionNotLoaded(BackendKind::Wayland))
        );
    }
}
