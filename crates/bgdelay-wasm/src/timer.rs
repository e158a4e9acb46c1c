//! `window.setTimeout` timer backend

use bgdelay_core::TimerBackend;
use std::time::Duration;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::Window;

/// Timer backed by the window's timeout queue
#[derive(Clone)]
pub struct WindowTimer {
    window: Window,
}

impl WindowTimer {
    pub fn new(window: Window) -> Self {
        Self { window }
    }
}

impl TimerBackend for WindowTimer {
    /// `None` if the browser refused the timeout
    type Handle = Option<i32>;

    fn set_timeout(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> Self::Handle {
        let millis = delay.as_millis().min(i32::MAX as u128) as i32;
        let callback = Closure::once_into_js(move || callback());
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(callback.unchecked_ref(), millis)
        {
            Ok(id) => Some(id),
            Err(e) => {
                web_sys::console::error_2(&"[bgdelay] setTimeout failed:".into(), &e);
                None
            }
        }
    }

    fn clear_timeout(&self, handle: Self::Handle) {
        if let Some(id) = handle {
            self.window.clear_timeout_with_handle(id);
        }
    }
}
