//! Backend selection
//!
//! Picks exactly one backend from the ones compiled into this build. The
//! choice is a pure function of that set and two environment signals, so the
//! same build in the same environment always gets the same backend.

use std::env;
use std::ffi::OsString;

use crate::window::backend::{BackendKind, WindowBackend};
use crate::window::error::{WsiError, WsiResult};

/// Variable set by Wayland sessions
pub const WAYLAND_DISPLAY_VAR: &str = "WAYLAND_DISPLAY";
/// Opt-in that prefers the XCB backend over Win32 or Metal
pub const USE_X11_VAR: &str = "USE_X11";

/// Snapshot of the environment signals the dispatcher looks at
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    /// Value of `WAYLAND_DISPLAY`, if set
    pub wayland_display: Option<OsString>,
    /// Whether `USE_X11` is set at all
    pub use_x11: bool,
}

impl Environment {
    /// Read the signals from the process environment
    pub fn capture() -> Self {
        Self {
            wayland_display: env::var_os(WAYLAND_DISPLAY_VAR),
            use_x11: env::var_os(USE_X11_VAR).is_some(),
        }
    }

    /// Whether a Wayland session is active (variable present and non-empty)
    pub fn wayland_session(&self) -> bool {
        self.wayland_display.as_ref().is_some_and(|display| !display.is_empty())
    }
}

/// Backends linked into this build, in preference order
pub fn compiled_backends() -> Vec<BackendKind> {
    BackendKind::ALL.into_iter().filter(|kind| is_compiled(*kind)).collect()
}

/// Whether `kind` is linked into this build
pub fn is_compiled(kind: BackendKind) -> bool {
    match kind {
        BackendKind::Wayland => cfg!(all(feature = "wayland", unix, not(target_os = "macos"))),
        BackendKind::X11 => cfg!(feature = "x11"),
        BackendKind::Win32 => cfg!(windows),
        BackendKind::Metal => cfg!(target_os = "macos"),
        BackendKind::Headless => cfg!(any(test, feature = "headless")),
    }
}

/// Choose one backend from `available`
///
/// First match wins:
/// 1. a single available backend is used as is;
/// 2. with both Wayland and X11, a non-empty `WAYLAND_DISPLAY` picks Wayland, otherwise X11;
/// 3. with Win32 or Metal next to X11, `USE_X11` picks X11, otherwise the native backend;
/// 4. otherwise the first available kind in [`BackendKind::ALL`] order.
pub fn select(available: &[BackendKind], environment: &Environment) -> WsiResult<BackendKind> {
    let has = |kind| available.contains(&kind);

    if let [only] = available {
        return Ok(*only);
    }

    if has(BackendKind::Wayland) && has(BackendKind::X11) {
        return Ok(if environment.wayland_session() {
            BackendKind::Wayland
        } else {
            BackendKind::X11
        });
    }

    if has(BackendKind::X11) {
        if let Some(native) = BackendKind::ALL
            .into_iter()
            .find(|kind| kind.is_platform_native() && has(*kind))
        {
            return Ok(if environment.use_x11 { BackendKind::X11 } else { native });
        }
    }

    BackendKind::ALL
        .into_iter()
        .find(|kind| has(*kind))
        .ok_or(WsiError::NoBackendCompiled)
}

/// Construct a backend without touching the native system
pub fn create_backend(kind: BackendKind) -> WsiResult<Box<dyn WindowBackend>> {
    match kind {
        #[cfg(all(feature = "wayland", unix, not(target_os = "macos")))]
        BackendKind::Wayland => Ok(Box::new(crate::backends::wayland::WaylandBackend::new())),
        #[cfg(feature = "x11")]
        BackendKind::X11 => Ok(Box::new(crate::backends::x11::X11Backend::new())),
        #[cfg(windows)]
        BackendKind::Win32 => Ok(Box::new(crate::backends::win32::Win32Backend::new())),
        #[cfg(target_os = "macos")]
        BackendKind::Metal => Ok(Box::new(crate::backends::metal::MetalBackend::new())),
        #[cfg(any(test, feature = "headless"))]
        BackendKind::Headless => Ok(Box::new(crate::backends::headless::HeadlessBackend::default())),
        #[allow(unreachable_patterns)]
        other => Err(WsiError::BackendNotCompiled(other)),
    }
}

/// Pick and construct the backend for this process
pub fn select_backend() -> WsiResult<Box<dyn WindowBackend>> {
    let available = compiled_backends();
    let environment = Environment::capture();
    let kind = select(&available, &environment)?;
    log::info!(
        "Selected {} windowing backend (compiled: {:?}, {}={:?}, {} set: {})",
        kind,
        available,
        WAYLAND_DISPLAY_VAR,
        environment.wayland_display,
        USE_X11_VAR,
        environment.use_x11
    );
    create_backend(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use BackendKind::{Headless, Metal, Wayland, Win32, X11};

    fn env(wayland: Option<&str>, use_x11: bool) -> Environment {
        Environment {
            wayland_display: wayland.map(OsString::from),
            use_x11,
        }
    }

    #[test]
    fn test_single_backend_wins_unconditionally() {
        for kind in BackendKind::ALL {
            assert_eq!(select(&[kind], &env(Some("wayland-0"), true)).unwrap(), kind);
            assert_eq!(select(&[kind], &Environment::default()).unwrap(), kind);
        }
    }

    #[test]
    fn test_wayland_session_picks_wayland() {
        assert_eq!(select(&[Wayland, X11], &env(Some("wayland-0"), false)).unwrap(), Wayland);
        assert_eq!(select(&[X11, Wayland], &env(Some("wayland-1"), true)).unwrap(), Wayland);
    }

    #[test]
    fn test_empty_or_missing_wayland_display_picks_x11() {
        assert_eq!(select(&[Wayland, X11], &env(None, false)).unwrap(), X11);
        assert_eq!(select(&[Wayland, X11], &env(Some(""), false)).unwrap(), X11);
    }

    #[test]
    fn test_use_x11_opt_in_over_native() {
        assert_eq!(select(&[X11, Metal], &env(None, true)).unwrap(), X11);
        assert_eq!(select(&[X11, Metal], &env(None, false)).unwrap(), Metal);
        assert_eq!(select(&[Win32, X11], &env(None, true)).unwrap(), X11);
        assert_eq!(select(&[Win32, X11], &env(Some("wayland-0"), false)).unwrap(), Win32);
    }

    #[test]
    fn test_headless_only_as_last_resort() {
        assert_eq!(select(&[X11, Headless], &Environment::default()).unwrap(), X11);
        assert_eq!(select(&[Headless, Win32], &Environment::default()).unwrap(), Win32);
    }

    #[test]
    fn test_nothing_compiled_is_fatal() {
        let err = select(&[], &Environment::default()).unwrap_err();
        assert!(matches!(err, WsiError::NoBackendCompiled));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_selection_is_deterministic() {
        let sets: [&[BackendKind]; 5] = [
            &[Wayland, X11],
            &[X11, Metal],
            &[Win32, X11],
            &[Wayland, X11, Headless],
            &[Headless],
        ];
        let envs = [
            env(None, false),
            env(Some(""), true),
            env(Some("wayland-0"), false),
            env(Some("wayland-0"), true),
        ];

        for set in sets {
            for environment in &envs {
                let first = select(set, environment).unwrap();
                for _ in 0..10 {
                    assert_eq!(select(set, environment).unwrap(), first);
                }
            }
        }
    }

    #[test]
    fn test_compiled_backends_are_constructible() {
        let compiled = compiled_backends();
        assert!(compiled.contains(&Headless));

        for kind in BackendKind::ALL {
            match create_backend(kind) {
                Ok(backend) => {
                    assert!(is_compiled(kind));
                    assert_eq!(backend.kind(), kind);
                }
                Err(err) => {
                    assert!(!is_compiled(kind));
                    assert!(matches!(err, WsiError::BackendNotCompiled(k) if k == kind));
                }
            }
        }
    }
}
