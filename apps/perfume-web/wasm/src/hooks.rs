//! Page globals the engine reports to or listens on
//!
//! - `perfMetrics.onFirstInputDelay` (first-input-delay polyfill)
//! - `ttiPolyfill.getFirstConsistentlyInteractive` (time-to-interactive polyfill)
//! - `ga` (Google Analytics command queue)

use crate::performance::platform_error;
use js_sys::{Array, Function, Promise, Reflect};
use perfume_core::{
    GoogleAnalytics, MilestoneCallback, MilestoneHook, PerfumeError, FIRST_INPUT_DELAY_HOOK,
    TIME_TO_INTERACTIVE_HOOK,
};
use tracing::debug;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

/// `window[object][method]` with its receiver, when both exist
fn global_method(object: &str, method: &str) -> Option<(JsValue, Function)> {
    let window = web_sys::window()?;
    let owner = Reflect::get(&window, &JsValue::from_str(object)).ok()?;
    if owner.is_undefined() || owner.is_null() {
        return None;
    }
    let function = Reflect::get(&owner, &JsValue::from_str(method))
        .ok()?
        .dyn_into::<Function>()
        .ok()?;
    Some((owner, function))
}

/// `perfMetrics.onFirstInputDelay((delay, event) => ...)`
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstInputDelayPolyfill;

impl MilestoneHook for FirstInputDelayPolyfill {
    fn subscribe(&self, mut callback: MilestoneCallback) -> Result<(), PerfumeError> {
        let (owner, on_first_input_delay) = global_method("perfMetrics", "onFirstInputDelay")
            .ok_or(PerfumeError::HookUnavailable {
                hook: FIRST_INPUT_DELAY_HOOK,
            })?;

        let on_delay = Closure::wrap(Box::new(move |delay: JsValue, _event: JsValue| {
            if let Some(delay) = delay.as_f64() {
                callback(delay);
            }
        }) as Box<dyn FnMut(JsValue, JsValue)>);
        on_first_input_delay
            .call1(&owner, on_delay.as_ref())
            .map_err(platform_error)?;
        on_delay.forget();
        Ok(())
    }
}

/// `ttiPolyfill.getFirstConsistentlyInteractive()`, a promise of the TTI time
#[derive(Debug, Default, Clone, Copy)]
pub struct TimeToInteractivePolyfill;

impl MilestoneHook for TimeToInteractivePolyfill {
    fn subscribe(&self, mut callback: MilestoneCallback) -> Result<(), PerfumeError> {
        let (owner, get_first_consistently_interactive) =
            global_method("ttiPolyfill", "getFirstConsistentlyInteractive").ok_or(
                PerfumeError::HookUnavailable {
                    hook: TIME_TO_INTERACTIVE_HOOK,
                },
            )?;

        let promise: Promise = get_first_consistently_interactive
            .call0(&owner)
            .and_then(|value| value.dyn_into())
            .map_err(platform_error)?;

        wasm_bindgen_futures::spawn_local(async move {
            match JsFuture::from(promise).await {
                Ok(value) => match value.as_f64() {
                    Some(time) => callback(time),
                    None => debug!("time to interactive resolved without a value"),
                },
                Err(e) => debug!("time to interactive polyfill rejected: {:?}", e),
            }
        });
        Ok(())
    }
}

/// The page's global `ga` function, looked up on every send
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowGoogleAnalytics;

impl GoogleAnalytics for WindowGoogleAnalytics {
    fn send_timing(
        &self,
        category: &str,
        timing_var: &str,
        value: i64,
    ) -> Result<(), PerfumeError> {
        let window = web_sys::window().ok_or(PerfumeError::AnalyticsUnavailable)?;
        let ga = Reflect::get(&window, &"ga".into())
            .ok()
            .and_then(|ga| ga.dyn_into::<Function>().ok())
            .ok_or(PerfumeError::AnalyticsUnavailable)?;

        let args = Array::new();
        args.push(&"send".into());
        args.push(&"timing".into());
        args.push(&JsValue::from_str(category));
        args.push(&JsValue::from_str(timing_var));
        args.push(&JsValue::from_f64(value as f64));
        ga.apply(&JsValue::NULL, &args).map_err(platform_error)?;
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
mod wasm_tests {
    use super::*;
    use js_sys::Object;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn window() -> web_sys::Window {
        web_sys::window().unwrap()
    }

    #[wasm_bindgen_test]
    fn test_missing_polyfills_are_reported() {
        let err = TimeToInteractivePolyfill
            .subscribe(Box::new(|_| {}))
            .unwrap_err();
        assert_eq!(err.to_string(), "Time to Interactive polyfill has not been loaded");
    }

    #[wasm_bindgen_test]
    fn test_first_input_delay_forwards_delay() {
        let perf_metrics = Object::new();
        let register = Function::new_with_args("cb", "cb(12.5, null)");
        Reflect::set(&perf_metrics, &"onFirstInputDelay".into(), &register).unwrap();
        Reflect::set(&window(), &"perfMetrics".into(), &perf_metrics).unwrap();

        let seen = std::rc::Rc::new(std::cell::Cell::new(0.0));
        let sink = seen.clone();
        FirstInputDelayPolyfill
            .subscribe(Box::new(move |delay| sink.set(delay)))
            .unwrap();
        assert_eq!(seen.get(), 12.5);

        Reflect::delete_property(&window(), &"perfMetrics".into()).unwrap();
    }

    #[wasm_bindgen_test]
    fn test_ga_absent_is_an_error() {
        let _ = Reflect::delete_property(&window(), &"ga".into());
        assert_eq!(
            WindowGoogleAnalytics.send_timing("x", "name", 10),
            Err(PerfumeError::AnalyticsUnavailable)
        );
    }

    #[wasm_bindgen_test]
    fn test_ga_receives_timing_command() {
        let ga = Function::new_with_args(
            "cmd, type, category, timingVar, value",
            "window.__gaArgs = [cmd, type, category, timingVar, value]",
        );
        Reflect::set(&window(), &"ga".into(), &ga).unwrap();

        WindowGoogleAnalytics
            .send_timing("fetch", "name", 42)
            .unwrap();

        let args: Array = Reflect::get(&window(), &"__gaArgs".into())
            .unwrap()
            .dyn_into()
            .unwrap();
        assert_eq!(args.get(0).as_string().as_deref(), Some("send"));
        assert_eq!(args.get(2).as_string().as_deref(), Some("fetch"));
        assert_eq!(args.get(4).as_f64(), Some(42.0));

        Reflect::delete_property(&window(), &"ga".into()).unwrap();
    }
}
