//! Lifecycle ordering enforced by `WindowHandle`

use std::panic::{self, AssertUnwindSafe};

use super::headless_handle;
use crate::core::config::WindowConfig;
use crate::window::{LoopModel, WindowCallbacks, WindowEvent, WindowState, WsiError};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_lifecycle_walks_every_state() {
        let (mut handle, _script, window) = headless_handle(LoopModel::Polling);
        assert_eq!(handle.state(), WindowState::Uninitialized);

        handle.init_display().unwrap();
        assert_eq!(handle.state(), WindowState::DisplayReady);

        handle.init_window(&WindowConfig::new("Test", 640, 480)).unwrap();
        assert_eq!(handle.state(), WindowState::WindowReady);
        assert_eq!(window.borrow().as_ref().unwrap().title, "Test");

        assert!(!handle.update_window().unwrap());
        assert_eq!(handle.state(), WindowState::WindowReady);

        handle.fini_window().unwrap();
        assert_eq!(handle.state(), WindowState::WindowClosed);
        assert!(window.borrow().is_none());

        handle.fini_display().unwrap();
        assert_eq!(handle.state(), WindowState::DisplayClosed);
    }

    #[test]
    fn test_window_before_display_is_rejected() {
        let (mut handle, _script, window) = headless_handle(LoopModel::Polling);

        let err = handle.init_window(&WindowConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            WsiError::InvalidState {
                operation: "init_window",
                state: WindowState::Uninitialized
            }
        ));
        assert!(window.borrow().is_none());
        assert_eq!(handle.state(), WindowState::Uninitialized);
    }

    #[test]
    fn test_loop_requires_a_window() {
        let (mut handle, _script, _window) = headless_handle(LoopModel::Polling);
        handle.init_display().unwrap();

        assert!(matches!(handle.update_window(), Err(WsiError::InvalidState { .. })));
        assert!(matches!(handle.fini_window(), Err(WsiError::InvalidState { .. })));
    }

    #[test]
    fn test_display_can_close_without_a_window() {
        let (mut handle, _script, _window) = headless_handle(LoopModel::Blocking);
        handle.init_display().unwrap();
        handle.fini_display().unwrap();
        assert_eq!(handle.state(), WindowState::DisplayClosed);
    }

    #[test]
    fn test_display_cannot_close_under_an_open_window() {
        let (mut handle, _script, _window) = headless_handle(LoopModel::Polling);
        handle.init_display().unwrap();
        handle.init_window(&WindowConfig::default()).unwrap();

        assert!(matches!(handle.fini_display(), Err(WsiError::InvalidState { .. })));
        assert_eq!(handle.state(), WindowState::WindowReady);
    }

    #[test]
    fn test_everything_after_teardown_is_torn_down() {
        let (mut handle, _script, _window) = headless_handle(LoopModel::Polling);
        handle.init_display().unwrap();
        handle.fini_display().unwrap();

        assert!(matches!(handle.init_display(), Err(WsiError::TornDown { operation: "init_display" })));
        assert!(matches!(
            handle.init_window(&WindowConfig::default()),
            Err(WsiError::TornDown { .. })
        ));
        assert!(matches!(handle.update_window(), Err(WsiError::TornDown { .. })));
        assert!(matches!(handle.set_callbacks(WindowCallbacks::new()), Err(WsiError::TornDown { .. })));
        assert!(matches!(handle.fini_display(), Err(WsiError::TornDown { .. })));
    }

    #[test]
    fn test_invalid_window_config_leaves_state_alone() {
        let (mut handle, _script, window) = headless_handle(LoopModel::Polling);
        handle.init_display().unwrap();

        let err = handle.init_window(&WindowConfig::new("", 640, 480)).unwrap_err();
        assert!(matches!(err, WsiError::Config(_)));
        assert!(err.is_fatal());
        assert_eq!(handle.state(), WindowState::DisplayReady);
        assert!(window.borrow().is_none());
    }

    #[test]
    fn test_drop_tears_down_in_reverse_order() {
        let backend = crate::backends::headless::HeadlessBackend::new(LoopModel::Polling);
        let window = backend.window();
        let mut handle = crate::window::WindowHandle::new(Box::new(backend));
        handle.init_display().unwrap();
        handle.init_window(&WindowConfig::default()).unwrap();
        assert!(window.borrow().is_some());

        drop(handle);
        assert!(window.borrow().is_none());
    }

    #[test]
    fn test_wrong_loop_model_reports_both_models() {
        let (mut handle, _script, _window) = headless_handle(LoopModel::Blocking);
        handle.init_display().unwrap();
        handle.init_window(&WindowConfig::default()).unwrap();

        match handle.update_window() {
            Err(WsiError::UnsupportedLoopModel {
                supported, requested, ..
            }) => {
                assert_eq!(supported, LoopModel::Blocking);
                assert_eq!(requested, LoopModel::Polling);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        // Failed loop call returns the handle to WindowReady
        assert_eq!(handle.state(), WindowState::WindowReady);
    }

    #[test]
    fn test_panicking_callback_still_tears_down_on_drop() {
        let (mut handle, script, window) = headless_handle(LoopModel::Polling);
        handle.init_display().unwrap();
        handle.init_window(&WindowConfig::default()).unwrap();
        handle
            .set_callbacks(WindowCallbacks::new().on_redraw(|| panic!("redraw failed")))
            .unwrap();
        script.push(WindowEvent::Redraw);

        let unwound = panic::catch_unwind(AssertUnwindSafe(|| handle.update_window()));
        assert!(unwound.is_err());
        assert_eq!(handle.state(), WindowState::Running);

        drop(handle);
        assert!(window.borrow().is_none());
    }
}
