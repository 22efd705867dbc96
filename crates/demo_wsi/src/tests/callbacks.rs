//! Event delivery through registered callbacks

use std::cell::RefCell;
use std::ops::ControlFlow;
use std::rc::Rc;

use super::headless_handle;
use crate::core::config::WindowConfig;
use crate::window::{Key, LoopModel, WindowCallbacks, WindowEvent, WindowHandle};

/// Everything a callback saw, in order
#[derive(Debug, Clone, PartialEq, Eq)]
enum Seen {
    Exit,
    Resize(u32, u32),
    Key(bool, Key),
    Redraw,
}

fn recording_callbacks(log: &Rc<RefCell<Vec<Seen>>>) -> WindowCallbacks {
    let (exit, resize, key, redraw) = (Rc::clone(log), Rc::clone(log), Rc::clone(log), Rc::clone(log));
    WindowCallbacks::new()
        .on_exit(move || {
            exit.borrow_mut().push(Seen::Exit);
            ControlFlow::Break(())
        })
        .on_resize(move |w, h| resize.borrow_mut().push(Seen::Resize(w, h)))
        .on_key(move |pressed, k| key.borrow_mut().push(Seen::Key(pressed, k)))
        .on_redraw(move || redraw.borrow_mut().push(Seen::Redraw))
}

fn opened(loop_model: LoopModel) -> (WindowHandle, crate::backends::headless::EventScript) {
    let (mut handle, script, _window) = headless_handle(loop_model);
    handle.init_display().unwrap();
    handle.init_window(&WindowConfig::new("Test", 640, 480)).unwrap();
    (handle, script)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_resize_reaches_callback_once() {
        let (mut handle, script, window) = headless_handle(LoopModel::Polling);
        handle.init_display().unwrap();
        handle
            .init_window(&WindowConfig::new("Test", 640, 480).with_position(0, 0))
            .unwrap();

        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&calls);
        handle
            .set_callbacks(WindowCallbacks::new().on_resize(move |w, h| sink.borrow_mut().push((w, h))))
            .unwrap();

        script.push(WindowEvent::Resize {
            width: 800,
            height: 600,
        });
        assert!(!handle.update_window().unwrap());

        assert_eq!(*calls.borrow(), vec![(800, 600)]);
        assert_eq!(window.borrow().as_ref().unwrap().size, (800, 600));

        handle.fini_window().unwrap();
        handle.fini_display().unwrap();
    }

    #[test]
    fn test_events_arrive_in_native_order() {
        let (mut handle, script) = opened(LoopModel::Polling);
        let log = Rc::new(RefCell::new(Vec::new()));
        handle.set_callbacks(recording_callbacks(&log)).unwrap();

        script.extend([
            WindowEvent::Resize {
                width: 100,
                height: 100,
            },
            WindowEvent::Key {
                pressed: true,
                key: Key::A,
            },
            WindowEvent::Resize {
                width: 200,
                height: 200,
            },
        ]);
        assert!(!handle.update_window().unwrap());

        assert_eq!(
            *log.borrow(),
            vec![Seen::Resize(100, 100), Seen::Key(true, Key::A), Seen::Resize(200, 200)]
        );
    }

    #[test]
    fn test_blocking_loop_returns_when_exit_breaks() {
        let (mut handle, script) = opened(LoopModel::Blocking);
        let log = Rc::new(RefCell::new(Vec::new()));
        handle.set_callbacks(recording_callbacks(&log)).unwrap();

        script.extend([
            WindowEvent::Redraw,
            WindowEvent::Close,
            WindowEvent::Resize {
                width: 1,
                height: 1,
            },
        ]);
        handle.event_loop().unwrap();

        assert_eq!(*log.borrow(), vec![Seen::Redraw, Seen::Exit]);
        assert_eq!(script.pending(), 1);
    }

    #[test]
    fn test_exit_that_continues_keeps_the_loop_alive() {
        let (mut handle, script) = opened(LoopModel::Polling);
        let closes = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&closes);
        handle
            .set_callbacks(WindowCallbacks::new().on_exit(move || {
                *counter.borrow_mut() += 1;
                ControlFlow::Continue(())
            }))
            .unwrap();

        script.extend([WindowEvent::Close, WindowEvent::Close]);
        assert!(!handle.update_window().unwrap());
        assert_eq!(*closes.borrow(), 2);
    }

    #[test]
    fn test_run_polls_and_renders_until_exit() {
        let (mut handle, script) = opened(LoopModel::Polling);
        let log = Rc::new(RefCell::new(Vec::new()));
        handle.set_callbacks(recording_callbacks(&log)).unwrap();

        let frames = Rc::new(RefCell::new(0_u32));
        let frame_count = Rc::clone(&frames);
        let frame_script = script.clone();
        handle
            .run(move || {
                *frame_count.borrow_mut() += 1;
                if *frame_count.borrow() == 3 {
                    frame_script.push(WindowEvent::Key {
                        pressed: true,
                        key: Key::Escape,
                    });
                    frame_script.push(WindowEvent::Close);
                }
            })
            .unwrap();

        assert_eq!(*frames.borrow(), 3);
        assert_eq!(*log.borrow(), vec![Seen::Key(true, Key::Escape), Seen::Exit]);
    }

    #[test]
    fn test_run_uses_event_loop_for_blocking_backends() {
        let (mut handle, script) = opened(LoopModel::Blocking);
        let log = Rc::new(RefCell::new(Vec::new()));
        handle.set_callbacks(recording_callbacks(&log)).unwrap();
        script.extend([WindowEvent::Redraw, WindowEvent::Close]);

        let mut frames = 0;
        handle.run(|| frames += 1).unwrap();

        assert_eq!(frames, 0);
        assert_eq!(*log.borrow(), vec![Seen::Redraw, Seen::Exit]);
    }

    #[test]
    fn test_new_callbacks_replace_the_old_set() {
        let (mut handle, script) = opened(LoopModel::Polling);
        let first = Rc::new(RefCell::new(Vec::new()));
        let second = Rc::new(RefCell::new(Vec::new()));

        handle.set_callbacks(recording_callbacks(&first)).unwrap();
        script.push(WindowEvent::Redraw);
        assert!(!handle.update_window().unwrap());

        handle.set_callbacks(recording_callbacks(&second)).unwrap();
        script.push(WindowEvent::Redraw);
        assert!(!handle.update_window().unwrap());

        assert_eq!(*first.borrow(), vec![Seen::Redraw]);
        assert_eq!(*second.borrow(), vec![Seen::Redraw]);
    }

    #[test]
    fn test_default_callbacks_exit_on_close() {
        let (mut handle, script) = opened(LoopModel::Polling);
        script.push(WindowEvent::Close);
        assert!(handle.update_window().unwrap());
    }
}
