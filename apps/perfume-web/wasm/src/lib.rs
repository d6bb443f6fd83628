//! WASM bindings for the Perfume measurement engine
//!
//! Implements the `perfume-core` platform traits on `web-sys` and exposes the
//! engine as a JS class. Durations are plain numbers; milestones are
//! `Promise`s that resolve once.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { Perfume } from './pkg/perfume_wasm.js';
//!
//! await init();
//!
//! const perfume = new Perfume({
//!     firstContentfulPaint: true,
//!     firstInputDelay: true,
//!     analyticsTracker: (metricName, duration, browser, customProperties) => {
//!         myAnalytics.track(metricName, duration);
//!     },
//! });
//!
//! perfume.start('fibonacci');
//! fibonacci(400);
//! perfume.end('fibonacci');
//!
//! const fcp = await perfume.observeFirstContentfulPaint;
//! ```

pub mod console;
pub mod hooks;
pub mod lifecycle;
pub mod performance;
pub mod platform;
pub mod scheduler;

use js_sys::{Array, Function, Object, Promise, Reflect};
use perfume_core::{
    AnalyticsTracker, BrowserInfo, CustomProperties, MilestoneObserver, Perfume, PerfumeConfig,
    PerfumeOptions,
};
use serde::Serialize;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::future_to_promise;

pub use platform::{browser_platform, detect_browser};

/// Initialize the WASM module
/// Called automatically by wasm-bindgen
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Get the library version
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn to_js<T: Serialize>(value: &T) -> JsValue {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .unwrap_or(JsValue::UNDEFINED)
}

fn is_absent(value: &JsValue) -> bool {
    value.is_undefined() || value.is_null()
}

/// `customProperties` argument as a map; anything but a plain object is ignored
fn custom_properties(value: JsValue) -> Option<CustomProperties> {
    if is_absent(&value) {
        return None;
    }
    serde_wasm_bindgen::from_value(value).ok()
}

/// Wrap a JS `analyticsTracker(metricName, duration, browser, customProperties)`
fn js_tracker(function: Function) -> AnalyticsTracker {
    Rc::new(
        move |metric_name: &str,
              duration: f64,
              browser: Option<&BrowserInfo>,
              properties: Option<&CustomProperties>| {
            let args = Array::new();
            args.push(&JsValue::from_str(metric_name));
            args.push(&JsValue::from_f64(duration));
            args.push(&browser.map(to_js).unwrap_or(JsValue::UNDEFINED));
            args.push(&properties.map(to_js).unwrap_or(JsValue::UNDEFINED));
            if let Err(e) = function.apply(&JsValue::NULL, &args) {
                tracing::debug!("analyticsTracker threw: {:?}", e);
            }
        },
    )
}

/// Resolve JS construction options over the defaults
fn parse_options(options: &JsValue) -> Result<PerfumeConfig, JsValue> {
    if is_absent(options) {
        return Ok(PerfumeConfig::default());
    }
    let options: &Object = options
        .dyn_ref()
        .ok_or_else(|| JsValue::from_str("Perfume options must be an object"))?;

    let tracker = Reflect::get(options, &"analyticsTracker".into())?
        .dyn_into::<Function>()
        .ok();

    // serde only sees the data fields
    let data = Object::assign(&Object::new(), options);
    Reflect::delete_property(&data, &"analyticsTracker".into())?;
    let parsed: PerfumeOptions = serde_wasm_bindgen::from_value(data.into())
        .map_err(|e| JsValue::from_str(&format!("Invalid Perfume options: {}", e)))?;

    let config = PerfumeConfig::from(parsed);
    Ok(match tracker {
        Some(tracker) => config.with_analytics_tracker(js_tracker(tracker)),
        None => config,
    })
}

/// Anything but a string becomes `""`, which the engine warns about
fn metric_name(value: &JsValue) -> String {
    value.as_string().unwrap_or_default()
}

fn observer_promise(observer: Option<MilestoneObserver>) -> Option<Promise> {
    observer.map(|observer| {
        future_to_promise(async move {
            Ok(observer
                .await
                .map(JsValue::from_f64)
                .unwrap_or(JsValue::UNDEFINED))
        })
    })
}

/// Perfume measurement engine for the current page
#[wasm_bindgen(js_name = Perfume)]
pub struct PerfumeJs {
    engine: Perfume,
    first_contentful_paint: Option<Promise>,
    first_input_delay: Option<Promise>,
    time_to_interactive: Option<Promise>,
}

#[wasm_bindgen(js_class = Perfume)]
impl PerfumeJs {
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<PerfumeJs, JsValue> {
        let config = parse_options(&options)?;
        let platform = browser_platform(config.browser_tracker);
        let engine = Perfume::new(config, platform);
        Ok(Self {
            first_contentful_paint: observer_promise(engine.observe_first_contentful_paint()),
            first_input_delay: observer_promise(engine.observe_first_input_delay()),
            time_to_interactive: observer_promise(engine.observe_time_to_interactive()),
            engine,
        })
    }

    pub fn start(&self, metric_name: JsValue) {
        self.engine.start(&self::metric_name(&metric_name));
    }

    /// Duration in milliseconds, `undefined` when the metric was not started
    pub fn end(&self, metric_name: JsValue, custom_properties: JsValue) -> Option<f64> {
        self.engine.end(
            &self::metric_name(&metric_name),
            self::custom_properties(custom_properties),
        )
    }

    /// Ends on the next macrotask; resolves with the duration or `undefined`
    #[wasm_bindgen(js_name = endPaint)]
    pub fn end_paint(&self, metric_name: JsValue, custom_properties: JsValue) -> Promise {
        let pending = self.engine.end_paint(
            &self::metric_name(&metric_name),
            self::custom_properties(custom_properties),
        );
        future_to_promise(async move {
            Ok(pending
                .await
                .map(JsValue::from_f64)
                .unwrap_or(JsValue::UNDEFINED))
        })
    }

    pub fn log(&self, metric_name: JsValue, duration: f64, custom_properties: JsValue) {
        let properties = self::custom_properties(custom_properties);
        self.engine
            .log(&self::metric_name(&metric_name), duration, properties.as_ref());
    }

    #[wasm_bindgen(js_name = sendTiming)]
    pub fn send_timing(&self, metric_name: JsValue, duration: f64, custom_properties: JsValue) {
        let properties = self::custom_properties(custom_properties);
        self.engine.send_timing(
            &self::metric_name(&metric_name),
            duration,
            properties.as_ref(),
        );
    }

    #[wasm_bindgen(getter, js_name = firstPaintDuration)]
    pub fn first_paint_duration(&self) -> f64 {
        self.engine.first_paint_duration()
    }

    #[wasm_bindgen(getter, js_name = firstContentfulPaintDuration)]
    pub fn first_contentful_paint_duration(&self) -> f64 {
        self.engine.first_contentful_paint_duration()
    }

    #[wasm_bindgen(getter, js_name = firstInputDelayDuration)]
    pub fn first_input_delay_duration(&self) -> f64 {
        self.engine.first_input_delay_duration()
    }

    #[wasm_bindgen(getter, js_name = timeToInteractiveDuration)]
    pub fn time_to_interactive_duration(&self) -> f64 {
        self.engine.time_to_interactive_duration()
    }

    /// `undefined` unless `firstPaint` or `firstContentfulPaint` is enabled
    #[wasm_bindgen(getter, js_name = observeFirstContentfulPaint)]
    pub fn observe_first_contentful_paint(&self) -> Option<Promise> {
        self.first_contentful_paint.clone()
    }

    #[wasm_bindgen(getter, js_name = observeFirstInputDelay)]
    pub fn observe_first_input_delay(&self) -> Option<Promise> {
        self.first_input_delay.clone()
    }

    #[wasm_bindgen(getter, js_name = observeTimeToInteractive)]
    pub fn observe_time_to_interactive(&self) -> Option<Promise> {
        self.time_to_interactive.clone()
    }

    /// Resolved configuration as a plain object
    #[wasm_bindgen(getter)]
    pub fn config(&self) -> JsValue {
        let config = self.engine.config();
        let options = PerfumeOptions {
            first_contentful_paint: Some(config.first_contentful_paint),
            first_paint: Some(config.first_paint),
            first_input_delay: Some(config.first_input_delay),
            time_to_interactive: Some(config.time_to_interactive),
            browser_tracker: Some(config.browser_tracker),
            google_analytics: Some(config.google_analytics.clone()),
            log_prefix: Some(config.log_prefix.clone()),
            logging: Some(config.logging),
            max_measure_time: Some(config.max_measure_time),
            warning: Some(config.warning),
            debugging: Some(config.debugging),
        };
        to_js(&options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_version() {
        assert!(!get_version().is_empty());
    }
}

#[cfg(target_arch = "wasm32")]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_futures::JsFuture;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn options(json: &str) -> JsValue {
        js_sys::JSON::parse(json).unwrap()
    }

    #[wasm_bindgen_test]
    fn test_default_options() {
        let config = parse_options(&JsValue::UNDEFINED).unwrap();
        assert_eq!(config.log_prefix, "Perfume.js:");
        assert_eq!(config.max_measure_time, 15000.0);
    }

    #[wasm_bindgen_test]
    fn test_options_merge_over_defaults() {
        let config = parse_options(&options(
            r#"{"firstPaint": true, "googleAnalytics": {"enable": true}, "maxMeasureTime": 500}"#,
        ))
        .unwrap();
        assert!(config.first_paint);
        assert!(config.google_analytics.enable);
        assert_eq!(config.google_analytics.timing_var, "name");
        assert_eq!(config.max_measure_time, 500.0);
        assert!(config.logging);
    }

    #[wasm_bindgen_test]
    fn test_non_object_options_are_rejected() {
        assert!(parse_options(&JsValue::from_f64(3.0)).is_err());
    }

    #[wasm_bindgen_test]
    fn test_analytics_tracker_is_wired() {
        let opts = options("{}");
        let tracker = Function::new_with_args(
            "name, duration",
            "window.__tracked = [name, duration]",
        );
        Reflect::set(&opts, &"analyticsTracker".into(), &tracker).unwrap();

        let perfume = PerfumeJs::new(opts).unwrap();
        perfume.send_timing("fetch".into(), 12.0, JsValue::UNDEFINED);

        let window = web_sys::window().unwrap();
        let tracked: Array = Reflect::get(&window, &"__tracked".into())
            .unwrap()
            .dyn_into()
            .unwrap();
        assert_eq!(tracked.get(0).as_string().as_deref(), Some("fetch"));
        assert_eq!(tracked.get(1).as_f64(), Some(12.0));
    }

    #[wasm_bindgen_test]
    fn test_start_end_round_trip() {
        let perfume = PerfumeJs::new(JsValue::UNDEFINED).unwrap();
        perfume.start("wasm".into());
        let duration = perfume.end("wasm".into(), JsValue::UNDEFINED);
        assert!(duration.unwrap() >= 0.0);
        assert_eq!(perfume.end("wasm".into(), JsValue::UNDEFINED), None);
    }

    #[wasm_bindgen_test]
    fn test_missing_metric_name_is_ignored() {
        let perfume = PerfumeJs::new(options(r#"{"warning": true}"#)).unwrap();
        perfume.start(JsValue::UNDEFINED);
        assert_eq!(perfume.end(JsValue::UNDEFINED, JsValue::UNDEFINED), None);
        perfume.log(JsValue::from_f64(7.0), 1.0, JsValue::UNDEFINED);
        perfume.send_timing(JsValue::NULL, 1.0, JsValue::UNDEFINED);
    }

    #[wasm_bindgen_test]
    async fn test_end_paint_resolves_duration() {
        let perfume = PerfumeJs::new(JsValue::UNDEFINED).unwrap();
        perfume.start("paint".into());
        let value = JsFuture::from(perfume.end_paint("paint".into(), JsValue::UNDEFINED))
            .await
            .unwrap();
        assert!(value.as_f64().unwrap() >= 0.0);
    }

    #[wasm_bindgen_test]
    fn test_observers_follow_flags() {
        let perfume = PerfumeJs::new(options(r#"{"firstInputDelay": true}"#)).unwrap();
        assert!(perfume.observe_first_contentful_paint().is_none());
        assert!(perfume.observe_first_input_delay().is_some());
    }

    #[wasm_bindgen_test]
    fn test_observer_promise_is_stable() {
        let perfume = PerfumeJs::new(options(r#"{"firstInputDelay": true}"#)).unwrap();
        let first = perfume.observe_first_input_delay().unwrap();
        let second = perfume.observe_first_input_delay().unwrap();
        assert!(Object::is(&first, &second));
    }
}
