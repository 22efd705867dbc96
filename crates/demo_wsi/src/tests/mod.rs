//! Cross-module tests driving `WindowHandle` over the headless backend

mod callbacks;
mod lifecycle;
mod surface;

use std::cell::RefCell;
use std::rc::Rc;

use crate::backends::headless::{EventScript, HeadlessBackend, HeadlessWindow};
use crate::window::{LoopModel, WindowHandle};

/// A handle over a fresh headless backend plus its script and window observer
fn headless_handle(loop_model: LoopModel) -> (WindowHandle, EventScript, Rc<RefCell<Option<HeadlessWindow>>>) {
    let backend = HeadlessBackend::new(loop_model);
    let script = backend.script();
    let window = backend.window();
    (WindowHandle::new(Box::new(backend)), script, window)
}
