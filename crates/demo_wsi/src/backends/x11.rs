//! X11 backend over the XCB protocol
//!
//! Uses `x11rb`'s libxcb connection (loaded at runtime) so the same
//! connection pointer can be handed to `VK_KHR_xcb_surface`. Runs a blocking
//! event loop.

use std::collections::VecDeque;
use std::ffi::CStr;

use ash::{extensions::khr, vk};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle, XcbDisplayHandle, XcbWindowHandle};
use x11rb::connection::Connection;
use x11rb::properties::{WmSizeHints, WmSizeHintsSpecification};
use x11rb::protocol::xproto::{
    AtomEnum, ConnectionExt as _, CreateWindowAux, EventMask, Keycode, Keysym, PropMode, Screen, WindowClass,
};
use x11rb::protocol::Event;
use x11rb::wrapper::ConnectionExt as _;
use x11rb::xcb_ffi::XCBConnection;
use x11rb::COPY_DEPTH_FROM_PARENT;

use crate::core::config::WindowConfig;
use crate::window::backend::{BackendKind, LoopModel, WindowBackend};
use crate::window::error::{SurfaceError, SurfaceResult, WsiError, WsiResult};
use crate::window::events::{Key, WindowCallbacks, WindowEvent};
use crate::window::surface::{self, SurfaceTarget};

/// Commands the `XcbSurface` loader needs from the instance
const SURFACE_FUNCTIONS: [&CStr; 2] = [
    c"vkGetPhysicalDeviceXcbPresentationSupportKHR",
    c"vkCreateXcbSurfaceKHR",
];

x11rb::atom_manager! {
    Atoms: AtomsCookie {
        WM_PROTOCOLS,
        WM_DELETE_WINDOW,
        _NET_WM_NAME,
        _NET_WM_STATE,
        _NET_WM_STATE_FULLSCREEN,
        UTF8_STRING,
    }
}

const XK_LEFT: Keysym = 0xff51;
const XK_UP: Keysym = 0xff52;
const XK_RIGHT: Keysym = 0xff53;
const XK_DOWN: Keysym = 0xff54;
const XK_ESCAPE: Keysym = 0xff1b;
const XK_UPPER_A: Keysym = 0x0041;
const XK_LOWER_A: Keysym = 0x0061;

fn key_from_keysym(keysym: Keysym) -> Key {
    match keysym {
        XK_UP => Key::Up,
        XK_DOWN => Key::Down,
        XK_LEFT => Key::Left,
        XK_RIGHT => Key::Right,
        XK_UPPER_A | XK_LOWER_A => Key::A,
        XK_ESCAPE => Key::Escape,
        _ => Key::Other,
    }
}

/// Keycode to unshifted keysym table fetched once per connection
#[derive(Debug, Clone, Default)]
struct Keymap {
    min_keycode: Keycode,
    keysyms_per_keycode: u8,
    keysyms: Vec<Keysym>,
}

impl Keymap {
    fn lookup(&self, keycode: Keycode) -> Key {
        let Some(offset) = keycode.checked_sub(self.min_keycode) else {
            return Key::Other;
        };
        let index = usize::from(offset) * usize::from(self.keysyms_per_keycode);
        self.keysyms.get(index).copied().map_or(Key::Other, key_from_keysym)
    }
}

struct Display {
    conn: XCBConnection,
    screen_num: usize,
    atoms: Atoms,
    keymap: Keymap,
}

impl Display {
    fn screen(&self) -> &Screen {
        &self.conn.setup().roots[self.screen_num]
    }
}

struct Window {
    id: u32,
    visual: u32,
    size: (u32, u32),
}

fn clamp_u16(value: u32) -> u16 {
    u16::try_from(value).unwrap_or(u16::MAX)
}

fn clamp_i16(value: i32) -> i16 {
    i16::try_from(value).unwrap_or(if value < 0 { i16::MIN } else { i16::MAX })
}

/// Translate one X event; `None` for events the layer does not report
fn translate(display: &Display, window: &mut Window, event: &Event) -> Option<WindowEvent> {
    match event {
        Event::Expose(e) if e.window == window.id && e.count == 0 => Some(WindowEvent::Redraw),
        Event::ConfigureNotify(e) if e.window == window.id => {
            let size = (u32::from(e.width), u32::from(e.height));
            if size == window.size {
                return None;
            }
            window.size = size;
            Some(WindowEvent::Resize {
                width: size.0,
                height: size.1,
            })
        }
        Event::KeyPress(e) => Some(WindowEvent::Key {
            pressed: true,
            key: display.keymap.lookup(e.detail),
        }),
        Event::KeyRelease(e) => Some(WindowEvent::Key {
            pressed: false,
            key: display.keymap.lookup(e.detail),
        }),
        Event::ClientMessage(e)
            if e.format == 32
                && e.type_ == display.atoms.WM_PROTOCOLS
                && e.data.as_data32()[0] == display.atoms.WM_DELETE_WINDOW =>
        {
            Some(WindowEvent::Close)
        }
        _ => None,
    }
}

/// XCB windowing backend
pub struct X11Backend {
    display: Option<Display>,
    window: Option<Window>,
    pending: VecDeque<WindowEvent>,
    callbacks: WindowCallbacks,
}

impl X11Backend {
    /// Create an unconnected backend
    pub fn new() -> Self {
        Self {
            display: None,
            window: None,
            pending: VecDeque::new(),
            callbacks: WindowCallbacks::new(),
        }
    }

    fn display_error(reason: impl ToString) -> WsiError {
        WsiError::DisplayUnavailable {
            backend: BackendKind::X11,
            reason: reason.to_string(),
        }
    }

    fn window_error(reason: impl ToString) -> WsiError {
        WsiError::WindowCreationFailed {
            backend: BackendKind::X11,
            reason: reason.to_string(),
        }
    }

    fn dispatch_error(reason: impl ToString) -> WsiError {
        WsiError::EventDispatch {
            backend: BackendKind::X11,
            reason: reason.to_string(),
        }
    }
}

impl Default for X11Backend {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowBackend for X11Backend {
    fn kind(&self) -> BackendKind {
        BackendKind::X11
    }

    fn loop_model(&self) -> LoopModel {
        LoopModel::Blocking
    }

    fn required_extension_name(&self) -> &'static CStr {
        khr::XcbSurface::name()
    }

    fn init_display(&mut self) -> WsiResult<()> {
        let (conn, screen_num) = XCBConnection::connect(None).map_err(Self::display_error)?;
        let atoms = Atoms::new(&conn)
            .map_err(Self::display_error)?
            .reply()
            .map_err(Self::display_error)?;

        let (min_keycode, max_keycode) = (conn.setup().min_keycode, conn.setup().max_keycode);
        let mapping = conn
            .get_keyboard_mapping(min_keycode, max_keycode - min_keycode + 1)
            .map_err(Self::display_error)?
            .reply()
            .map_err(Self::display_error)?;
        let keymap = Keymap {
            min_keycode,
            keysyms_per_keycode: mapping.keysyms_per_keycode,
            keysyms: mapping.keysyms,
        };

        log::debug!("Connected to X server, screen {}", screen_num);
        self.display = Some(Display {
            conn,
            screen_num,
            atoms,
            keymap,
        });
        Ok(())
    }

    fn fini_display(&mut self) {
        self.pending.clear();
        self.display = None;
    }

    fn init_window(&mut self, config: &WindowConfig) -> WsiResult<()> {
        let display = self
            .display
            .as_ref()
            .ok_or_else(|| Self::window_error("display is not initialized"))?;
        let conn = &display.conn;
        let screen = display.screen();
        let (root, root_visual, black_pixel) = (screen.root, screen.root_visual, screen.black_pixel);

        let (x, y) = config.position().unwrap_or((0, 0));
        let (width, height) = if config.fullscreen {
            (u32::from(screen.width_in_pixels), u32::from(screen.height_in_pixels))
        } else {
            (config.width, config.height)
        };

        let id = conn.generate_id().map_err(Self::window_error)?;
        let aux = CreateWindowAux::new().background_pixel(black_pixel).event_mask(
            EventMask::EXPOSURE | EventMask::STRUCTURE_NOTIFY | EventMask::KEY_PRESS | EventMask::KEY_RELEASE,
        );
        conn.create_window(
            COPY_DEPTH_FROM_PARENT,
            id,
            root,
            clamp_i16(x),
            clamp_i16(y),
            clamp_u16(width),
            clamp_u16(height),
            0,
            WindowClass::INPUT_OUTPUT,
            root_visual,
            &aux,
        )
        .map_err(Self::window_error)?;

        let atoms = &display.atoms;
        let title = config.title.as_bytes();
        conn.change_property8(PropMode::REPLACE, id, AtomEnum::WM_NAME, AtomEnum::STRING, title)
            .map_err(Self::window_error)?;
        conn.change_property8(PropMode::REPLACE, id, atoms._NET_WM_NAME, atoms.UTF8_STRING, title)
            .map_err(Self::window_error)?;
        conn.change_property32(
            PropMode::REPLACE,
            id,
            atoms.WM_PROTOCOLS,
            AtomEnum::ATOM,
            &[atoms.WM_DELETE_WINDOW],
        )
        .map_err(Self::window_error)?;

        if config.fullscreen {
            conn.change_property32(
                PropMode::REPLACE,
                id,
                atoms._NET_WM_STATE,
                AtomEnum::ATOM,
                &[atoms._NET_WM_STATE_FULLSCREEN],
            )
            .map_err(Self::window_error)?;
        } else if let Some((x, y)) = config.position() {
            let mut hints = WmSizeHints::new();
            hints.position = Some((WmSizeHintsSpecification::UserSpecified, x, y));
            hints.set_normal_hints(conn, id).map_err(Self::window_error)?;
        }

        conn.map_window(id).map_err(Self::window_error)?;
        conn.flush().map_err(Self::window_error)?;

        // Hold on until the server reports the window mapped; anything that
        // arrives first is kept for the event loop.
        let mut window = Window {
            id,
            visual: root_visual,
            size: (width, height),
        };
        loop {
            let event = conn.wait_for_event().map_err(Self::window_error)?;
            if matches!(&event, Event::MapNotify(e) if e.window == id) {
                break;
            }
            if let Some(translated) = translate(display, &mut window, &event) {
                self.pending.push_back(translated);
            }
        }

        self.window = Some(window);
        Ok(())
    }

    fn fini_window(&mut self) {
        let (Some(display), Some(window)) = (self.display.as_ref(), self.window.take()) else {
            return;
        };
        let destroyed = display
            .conn
            .destroy_window(window.id)
            .map(drop)
            .and_then(|()| display.conn.flush());
        if let Err(e) = destroyed {
            log::warn!("Failed to destroy X11 window {}: {}", window.id, e);
        }
    }

    fn set_callbacks(&mut self, callbacks: WindowCallbacks) {
        self.callbacks = callbacks;
    }

    fn event_loop(&mut self) -> WsiResult<()> {
        let (Some(display), Some(window)) = (self.display.as_ref(), self.window.as_mut()) else {
            return Err(Self::dispatch_error("no window to run an event loop for"));
        };

        loop {
            while let Some(event) = self.pending.pop_front() {
                if self.callbacks.dispatch(event).is_break() {
                    return Ok(());
                }
            }

            let first = display.conn.wait_for_event().map_err(Self::dispatch_error)?;
            if let Some(event) = translate(display, window, &first) {
                self.pending.push_back(event);
            }
            while let Some(next) = display.conn.poll_for_event().map_err(Self::dispatch_error)? {
                if let Some(event) = translate(display, window, &next) {
                    self.pending.push_back(event);
                }
            }
        }
    }

    fn create_surface(&self, target: &SurfaceTarget<'_>) -> SurfaceResult<vk::SurfaceKHR> {
        let (Some(display), Some(window)) = (self.display.as_ref(), self.window.as_ref()) else {
            return Err(SurfaceError::NoWindow);
        };
        let connection = display.conn.get_raw_xcb_connection();

        surface::require_instance_functions(target, BackendKind::X11, &SURFACE_FUNCTIONS)?;
        let loader = khr::XcbSurface::new(target.entry, target.instance);
        // SAFETY: `connection` is the live libxcb connection owned by `display`.
        let supported = unsafe {
            loader.get_physical_device_xcb_presentation_support(
                target.physical_device,
                target.queue_family_index,
                &mut *connection.cast::<vk::xcb_connection_t>(),
                window.visual,
            )
        };
        if !supported {
            log::debug!("Physical device {:?} cannot present to XCB", target.physical_device);
            return Err(SurfaceError::PresentationUnsupported(BackendKind::X11));
        }

        let mut display_handle = XcbDisplayHandle::empty();
        display_handle.connection = connection;
        display_handle.screen = i32::try_from(display.screen_num).unwrap_or(0);
        let mut window_handle = XcbWindowHandle::empty();
        window_handle.window = window.id;
        window_handle.visual_id = window.visual;

        surface::create_from_raw_handles(
            target,
            RawDisplayHandle::Xcb(display_handle),
            RawWindowHandle::Xcb(window_handle),
        )
    }
}
