//! Event-loop scheduling on `requestIdleCallback` and `setTimeout`

use js_sys::{Function, Reflect};
use perfume_core::{IdleCallback, IdleDeadline, Task, TaskScheduler};
use tracing::debug;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

/// Idle budget handed out when `requestIdleCallback` is missing
const EMULATED_IDLE_BUDGET_MS: f64 = 50.0;

/// The browser's `IdleDeadline` object
struct BrowserDeadline(JsValue);

impl IdleDeadline for BrowserDeadline {
    fn time_remaining(&self) -> f64 {
        Reflect::get(&self.0, &"timeRemaining".into())
            .and_then(|f| f.dyn_into::<Function>())
            .and_then(|f| f.call0(&self.0))
            .ok()
            .and_then(|value| value.as_f64())
            .unwrap_or(0.0)
    }

    fn did_timeout(&self) -> bool {
        Reflect::get(&self.0, &"didTimeout".into())
            .ok()
            .and_then(|value| value.as_bool())
            .unwrap_or(false)
    }
}

/// Fixed budget measured from when the timeout fired
struct EmulatedDeadline {
    started: f64,
}

impl IdleDeadline for EmulatedDeadline {
    fn time_remaining(&self) -> f64 {
        (EMULATED_IDLE_BUDGET_MS - (js_sys::Date::now() - self.started)).max(0.0)
    }
}

/// Scheduler backed by the window's timers
#[derive(Debug, Default, Clone, Copy)]
pub struct WebScheduler;

impl WebScheduler {
    fn request_idle_callback(callback: &JsValue) -> Result<(), JsValue> {
        let window = web_sys::window().ok_or("No window")?;
        let request: Function = Reflect::get(&window, &"requestIdleCallback".into())?.dyn_into()?;
        request.call1(&window, callback)?;
        Ok(())
    }

    fn timeout(handler: &JsValue) -> Result<(), JsValue> {
        let window = web_sys::window().ok_or("No window")?;
        window.set_timeout_with_callback(handler.unchecked_ref())?;
        Ok(())
    }
}

impl TaskScheduler for WebScheduler {
    fn request_idle(&self, callback: IdleCallback) {
        let supported = web_sys::window()
            .map(|window| Reflect::has(&window, &"requestIdleCallback".into()).unwrap_or(false))
            .unwrap_or(false);

        if supported {
            let on_idle = Closure::once_into_js(move |deadline: JsValue| {
                callback(&BrowserDeadline(deadline));
            });
            if let Err(e) = Self::request_idle_callback(&on_idle) {
                debug!("requestIdleCallback failed: {:?}", e);
            }
            return;
        }

        // Emulate an idle period on the next macrotask
        let on_timeout = Closure::once_into_js(move || {
            callback(&EmulatedDeadline {
                started: js_sys::Date::now(),
            });
        });
        if let Err(e) = Self::timeout(&on_timeout) {
            debug!("setTimeout failed: {:?}", e);
        }
    }

    fn set_timeout(&self, task: Task) {
        let handler = Closure::once_into_js(move || task());
        if let Err(e) = Self::timeout(&handler) {
            debug!("setTimeout failed: {:?}", e);
        }
    }
}

#[cfg(target_arch = "wasm32")]
mod wasm_tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;
    use wasm_bindgen_futures::JsFuture;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    async fn next_macrotask() {
        let promise = js_sys::Promise::new(&mut |resolve, _| {
            let _ = web_sys::window()
                .unwrap()
                .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, 10);
        });
        let _ = JsFuture::from(promise).await;
    }

    #[wasm_bindgen_test]
    async fn test_set_timeout_runs_task() {
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();
        WebScheduler.set_timeout(Box::new(move || flag.set(true)));
        assert!(!ran.get());
        next_macrotask().await;
        assert!(ran.get());
    }

    #[wasm_bindgen_test]
    fn test_emulated_deadline_has_budget() {
        let deadline = EmulatedDeadline {
            started: js_sys::Date::now(),
        };
        assert!(deadline.time_remaining() > 0.0);
        assert!(deadline.time_remaining() <= EMULATED_IDLE_BUDGET_MS);
        assert!(!deadline.did_timeout());
    }
}
