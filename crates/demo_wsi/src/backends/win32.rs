//! Win32 backend
//!
//! A polling backend: `update_window` pumps the thread's message queue with
//! `PeekMessageW`. The window procedure never calls into the driver. It
//! queues [`WindowEvent`]s in a buffer owned by the window (reached through
//! `GWLP_USERDATA`), and the buffer is dispatched after `DispatchMessageW`
//! returns, so callbacks never run re-entrantly.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::ffi::{CStr, OsStr};
use std::mem;
use std::os::windows::ffi::OsStrExt;
use std::ptr;

use ash::{extensions::khr, vk};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle, Win32WindowHandle, WindowsDisplayHandle};
use winapi::shared::minwindef::{DWORD, FALSE, HINSTANCE, HIWORD, LOWORD, LPARAM, LRESULT, UINT, WPARAM};
use winapi::shared::windef::{DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2, HWND, RECT};
use winapi::um::errhandlingapi::GetLastError;
use winapi::um::libloaderapi::GetModuleHandleW;
use winapi::um::winuser::{
    AdjustWindowRectEx, CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetSystemMetrics,
    GetWindowLongPtrW, LoadCursorW, PeekMessageW, PostQuitMessage, RegisterClassExW, SetProcessDpiAwarenessContext,
    SetWindowLongPtrW, ShowWindow, TranslateMessage, UnregisterClassW, ValidateRect, CREATESTRUCTW, CS_HREDRAW,
    CS_OWNDC, CS_VREDRAW, CW_USEDEFAULT, GWLP_USERDATA, IDC_ARROW, MSG, PM_REMOVE, SM_CXSCREEN, SM_CYSCREEN,
    SW_SHOW, VK_DOWN, VK_ESCAPE, VK_LEFT, VK_RIGHT, VK_UP, WM_CLOSE, WM_DESTROY, WM_KEYDOWN, WM_KEYUP, WM_NCCREATE,
    WM_PAINT, WM_QUIT, WM_SIZE, WNDCLASSEXW, WS_OVERLAPPEDWINDOW, WS_POPUP, WS_VISIBLE,
};

use crate::core::config::WindowConfig;
use crate::window::backend::{BackendKind, LoopModel, WindowBackend};
use crate::window::error::{SurfaceError, SurfaceResult, WsiError, WsiResult};
use crate::window::events::{Key, WindowCallbacks, WindowEvent};
use crate::window::surface::{self, SurfaceTarget};

/// Commands the `Win32Surface` loader needs from the instance
const SURFACE_FUNCTIONS: [&CStr; 2] = [
    c"vkGetPhysicalDeviceWin32PresentationSupportKHR",
    c"vkCreateWin32SurfaceKHR",
];

const CLASS_NAME: &str = "demo-wsi-window";
const ERROR_CLASS_ALREADY_EXISTS: DWORD = 1410;

type EventBuffer = RefCell<VecDeque<WindowEvent>>;

fn wide(text: &str) -> Vec<u16> {
    OsStr::new(text).encode_wide().chain(Some(0)).collect()
}

fn key_from_virtual_key(vk: WPARAM) -> Key {
    match i32::try_from(vk) {
        Ok(VK_UP) => Key::Up,
        Ok(VK_DOWN) => Key::Down,
        Ok(VK_LEFT) => Key::Left,
        Ok(VK_RIGHT) => Key::Right,
        Ok(VK_ESCAPE) => Key::Escape,
        Ok(0x41) => Key::A,
        _ => Key::Other,
    }
}

/// Map a window message to its normalized event, if it has one
fn translate(msg: UINT, wparam: WPARAM, lparam: LPARAM) -> Option<WindowEvent> {
    match msg {
        WM_CLOSE => Some(WindowEvent::Close),
        WM_SIZE => {
            // Client size is packed into the low 32 bits
            let packed = lparam as DWORD;
            Some(WindowEvent::Resize {
                width: u32::from(LOWORD(packed)),
                height: u32::from(HIWORD(packed)),
            })
        }
        WM_KEYDOWN | WM_KEYUP => Some(WindowEvent::Key {
            pressed: msg == WM_KEYDOWN,
            key: key_from_virtual_key(wparam),
        }),
        WM_PAINT => Some(WindowEvent::Redraw),
        _ => None,
    }
}

unsafe extern "system" fn window_proc(hwnd: HWND, msg: UINT, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    if msg == WM_NCCREATE {
        let create = &*(lparam as *const CREATESTRUCTW);
        SetWindowLongPtrW(hwnd, GWLP_USERDATA, create.lpCreateParams as isize);
        return DefWindowProcW(hwnd, msg, wparam, lparam);
    }

    let buffer = GetWindowLongPtrW(hwnd, GWLP_USERDATA) as *const EventBuffer;
    if buffer.is_null() {
        return DefWindowProcW(hwnd, msg, wparam, lparam);
    }

    if let Some(event) = translate(msg, wparam, lparam) {
        match (*buffer).try_borrow_mut() {
            Ok(mut queue) => queue.push_back(event),
            Err(_) => log::warn!("Dropped {:?}: event buffer busy", event),
        }
    }

    match msg {
        // Closing is the driver's decision, so DestroyWindow is not called here
        WM_CLOSE => 0,
        WM_PAINT => {
            ValidateRect(hwnd, ptr::null());
            0
        }
        WM_DESTROY => {
            PostQuitMessage(0);
            0
        }
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

struct Display {
    hinstance: HINSTANCE,
    class_name: Vec<u16>,
}

struct Window {
    hwnd: HWND,
    // Boxed so the address stored in GWLP_USERDATA stays put
    events: Box<EventBuffer>,
}

/// Win32 windowing backend
pub struct Win32Backend {
    display: Option<Display>,
    window: Option<Window>,
    callbacks: WindowCallbacks,
}

impl Win32Backend {
    /// Create a backend with no class registered yet
    pub fn new() -> Self {
        Self {
            display: None,
            window: None,
            callbacks: WindowCallbacks::new(),
        }
    }

    fn last_error(call: &str) -> String {
        // SAFETY: reads thread-local error state only.
        let code = unsafe { GetLastError() };
        format!("{call} failed (error {code})")
    }
}

impl Default for Win32Backend {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowBackend for Win32Backend {
    fn kind(&self) -> BackendKind {
        BackendKind::Win32
    }

    fn loop_model(&self) -> LoopModel {
        LoopModel::Polling
    }

    fn required_extension_name(&self) -> &'static CStr {
        khr::Win32Surface::name()
    }

    fn init_display(&mut self) -> WsiResult<()> {
        let class_name = wide(CLASS_NAME);

        // SAFETY: plain Win32 calls with valid, NUL-terminated arguments.
        unsafe {
            if SetProcessDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2) == FALSE {
                log::debug!("{}", Self::last_error("SetProcessDpiAwarenessContext"));
            }

            let hinstance = GetModuleHandleW(ptr::null());
            if hinstance.is_null() {
                return Err(WsiError::DisplayUnavailable {
                    backend: BackendKind::Win32,
                    reason: Self::last_error("GetModuleHandleW"),
                });
            }

            let class = WNDCLASSEXW {
                cbSize: mem::size_of::<WNDCLASSEXW>() as UINT,
                style: CS_HREDRAW | CS_VREDRAW | CS_OWNDC,
                lpfnWndProc: Some(window_proc),
                cbClsExtra: 0,
                cbWndExtra: 0,
                hInstance: hinstance,
                hIcon: ptr::null_mut(),
                hCursor: LoadCursorW(ptr::null_mut(), IDC_ARROW),
                hbrBackground: ptr::null_mut(),
                lpszMenuName: ptr::null(),
                lpszClassName: class_name.as_ptr(),
                hIconSm: ptr::null_mut(),
            };
            if RegisterClassExW(&class) == 0 && GetLastError() != ERROR_CLASS_ALREADY_EXISTS {
                return Err(WsiError::DisplayUnavailable {
                    backend: BackendKind::Win32,
                    reason: Self::last_error("RegisterClassExW"),
                });
            }

            self.display = Some(Display { hinstance, class_name });
        }
        Ok(())
    }

    fn fini_display(&mut self) {
        if let Some(display) = self.display.take() {
            // SAFETY: the class was registered with this name and instance.
            if unsafe { UnregisterClassW(display.class_name.as_ptr(), display.hinstance) } == FALSE {
                log::warn!("{}", Self::last_error("UnregisterClassW"));
            }
        }
    }

    fn init_window(&mut self, config: &WindowConfig) -> WsiResult<()> {
        let Some(display) = self.display.as_ref() else {
            return Err(WsiError::WindowCreationFailed {
                backend: BackendKind::Win32,
                reason: "display is not initialized".to_string(),
            });
        };
        let title = wide(&config.title);
        let events: Box<EventBuffer> = Box::default();

        // SAFETY: `events` outlives the window; it is dropped only after DestroyWindow.
        let hwnd = unsafe {
            let (style, x, y, width, height) = if config.fullscreen {
                (
                    WS_POPUP | WS_VISIBLE,
                    0,
                    0,
                    GetSystemMetrics(SM_CXSCREEN),
                    GetSystemMetrics(SM_CYSCREEN),
                )
            } else {
                let mut rect = RECT {
                    left: 0,
                    top: 0,
                    right: i32::try_from(config.width).unwrap_or(i32::MAX),
                    bottom: i32::try_from(config.height).unwrap_or(i32::MAX),
                };
                AdjustWindowRectEx(&mut rect, WS_OVERLAPPEDWINDOW, FALSE, 0);
                let (x, y) = config.position().unwrap_or((CW_USEDEFAULT, CW_USEDEFAULT));
                (
                    WS_OVERLAPPEDWINDOW | WS_VISIBLE,
                    x,
                    y,
                    rect.right - rect.left,
                    rect.bottom - rect.top,
                )
            };

            CreateWindowExW(
                0,
                display.class_name.as_ptr(),
                title.as_ptr(),
                style,
                x,
                y,
                width,
                height,
                ptr::null_mut(),
                ptr::null_mut(),
                display.hinstance,
                &*events as *const EventBuffer as *mut _,
            )
        };
        if hwnd.is_null() {
            return Err(WsiError::WindowCreationFailed {
                backend: BackendKind::Win32,
                reason: Self::last_error("CreateWindowExW"),
            });
        }

        // SAFETY: `hwnd` was just created on this thread.
        unsafe {
            ShowWindow(hwnd, SW_SHOW);
        }

        self.window = Some(Window { hwnd, events });
        Ok(())
    }

    fn fini_window(&mut self) {
        let Some(window) = self.window.take() else {
            return;
        };
        // SAFETY: detach the buffer first so teardown messages are not queued.
        unsafe {
            SetWindowLongPtrW(window.hwnd, GWLP_USERDATA, 0);
            if DestroyWindow(window.hwnd) == FALSE {
                log::warn!("{}", Self::last_error("DestroyWindow"));
            }
        }
    }

    fn set_callbacks(&mut self, callbacks: WindowCallbacks) {
        self.callbacks = callbacks;
    }

    fn update_window(&mut self) -> WsiResult<bool> {
        let Some(window) = self.window.as_ref() else {
            return Err(WsiError::EventDispatch {
                backend: BackendKind::Win32,
                reason: "window is not initialized".to_string(),
            });
        };

        // SAFETY: MSG is plain data; the message pump runs on the window's thread.
        unsafe {
            let mut msg: MSG = mem::zeroed();
            while PeekMessageW(&mut msg, ptr::null_mut(), 0, 0, PM_REMOVE) != FALSE {
                if msg.message == WM_QUIT {
                    window.events.borrow_mut().push_back(WindowEvent::Close);
                    continue;
                }
                TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }

        let events: Vec<WindowEvent> = window.events.borrow_mut().drain(..).collect();
        let mut exit = false;
        for event in events {
            exit |= self.callbacks.dispatch(event).is_break();
        }
        Ok(exit)
    }

    fn create_surface(&self, target: &SurfaceTarget<'_>) -> SurfaceResult<vk::SurfaceKHR> {
        let (Some(display), Some(window)) = (self.display.as_ref(), self.window.as_ref()) else {
            return Err(SurfaceError::NoWindow);
        };

        surface::require_instance_functions(target, BackendKind::Win32, &SURFACE_FUNCTIONS)?;
        let loader = khr::Win32Surface::new(target.entry, target.instance);
        // SAFETY: the instance and physical device come from the same loader.
        let supported = unsafe {
            loader.get_physical_device_win32_presentation_support(target.physical_device, target.queue_family_index)
        };
        if !supported {
            log::debug!("Physical device {:?} cannot present to Win32", target.physical_device);
            return Err(SurfaceError::PresentationUnsupported(BackendKind::Win32));
        }

        let mut window_handle = Win32WindowHandle::empty();
        window_handle.hwnd = window.hwnd.cast();
        window_handle.hinstance = display.hinstance.cast();

        surface::create_from_raw_handles(
            target,
            RawDisplayHandle::Windows(WindowsDisplayHandle::empty()),
            RawWindowHandle::Win32(window_handle),
        )
    }
}
