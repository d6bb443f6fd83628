//! Browser timing capabilities
//!
//! `window.performance` backs the native timing backend; `Date.now()` and the
//! pre-Paint-Timing globals back the emulated one.

use js_sys::{Array, Function, Object, Reflect};
use perfume_core::{
    LegacyPaintTiming, PaintCallback, PaintTiming, PerformanceBuffer, PerfumeError, WallClock,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Performance, PerformanceEntry, PerformanceObserver, PerformanceObserverEntryList};

pub(crate) fn platform_error(value: JsValue) -> PerfumeError {
    PerfumeError::Platform(value.as_string().unwrap_or_else(|| format!("{:?}", value)))
}

fn has_property(target: &JsValue, key: &str) -> bool {
    Reflect::has(target, &JsValue::from_str(key)).unwrap_or(false)
}

fn performance() -> Option<Performance> {
    web_sys::window()?.performance()
}

/// True when the User Timing API is usable (`now`, `mark`, `getEntriesByName`)
pub fn supported() -> bool {
    performance()
        .map(|perf| {
            ["now", "mark", "measure", "getEntriesByName"]
                .iter()
                .all(|key| has_property(&perf, key))
        })
        .unwrap_or(false)
}

/// True when `PerformanceObserver` exists on the window
pub fn supported_performance_observer() -> bool {
    web_sys::window()
        .map(|window| has_property(&window, "PerformanceObserver"))
        .unwrap_or(false)
}

/// `window.performance` as a [`PerformanceBuffer`]
pub struct WebPerformance {
    performance: Performance,
}

impl WebPerformance {
    pub fn new() -> Option<Self> {
        performance().map(|performance| Self { performance })
    }
}

impl PerformanceBuffer for WebPerformance {
    fn now(&self) -> f64 {
        self.performance.now()
    }

    fn mark(&self, mark: &str) -> Result<(), PerfumeError> {
        self.performance.mark(mark).map(|_| ()).map_err(platform_error)
    }

    fn measure(
        &self,
        name: &str,
        start_mark: &str,
        end_mark: &str,
    ) -> Result<Option<f64>, PerfumeError> {
        self.performance
            .measure_with_start_mark_and_end_mark(name, start_mark, end_mark)
            .map(|_| ())
            .map_err(platform_error)?;

        let entry = self.performance.get_entries_by_name(name).pop();
        Ok(entry
            .dyn_into::<PerformanceEntry>()
            .ok()
            .filter(|entry| entry.entry_type() == "measure")
            .map(|entry| entry.duration()))
    }

    fn observe_paint(&self, mut callback: PaintCallback) -> Result<(), PerfumeError> {
        let on_entries = Closure::wrap(Box::new(move |list: PerformanceObserverEntryList| {
            let entries = list
                .get_entries()
                .iter()
                .filter_map(|entry| entry.dyn_into::<PerformanceEntry>().ok())
                .map(|entry| PaintTiming {
                    name: entry.name(),
                    entry_type: entry.entry_type(),
                    start_time: entry.start_time(),
                    duration: entry.duration(),
                })
                .collect();
            callback(entries);
        }) as Box<dyn FnMut(PerformanceObserverEntryList)>);

        let observer =
            PerformanceObserver::new(on_entries.as_ref().unchecked_ref()).map_err(platform_error)?;
        // The observer lives for the rest of the page.
        on_entries.forget();

        let options = Object::new();
        Reflect::set(
            &options,
            &"entryTypes".into(),
            &Array::of1(&JsValue::from_str("paint")),
        )
        .map_err(platform_error)?;
        let observe: Function = Reflect::get(&observer, &"observe".into())
            .and_then(|f| f.dyn_into())
            .map_err(platform_error)?;
        observe.call1(&observer, &options).map_err(platform_error)?;
        Ok(())
    }
}

/// `Date.now()`
pub struct DateClock;

impl WallClock for DateClock {
    fn now_ms(&self) -> f64 {
        js_sys::Date::now()
    }
}

/// First paint from `chrome.loadTimes()` or `performance.timing.msFirstPaint`
pub struct LegacyPaint;

impl LegacyPaint {
    fn chrome_load_times(window: &JsValue) -> Option<f64> {
        let chrome = Reflect::get(window, &"chrome".into()).ok()?;
        let load_times: Function = Reflect::get(&chrome, &"loadTimes".into())
            .ok()?
            .dyn_into()
            .ok()?;
        let times = load_times.call0(&chrome).ok()?;
        // Seconds since the epoch
        let first_paint = Reflect::get(&times, &"firstPaintTime".into()).ok()?.as_f64()?;
        let start_load = Reflect::get(&times, &"startLoadTime".into()).ok()?.as_f64()?;
        (first_paint > 0.0).then(|| (first_paint - start_load) * 1000.0)
    }

    fn ms_first_paint(window: &JsValue) -> Option<f64> {
        let perf = Reflect::get(window, &"performance".into()).ok()?;
        let timing = Reflect::get(&perf, &"timing".into()).ok()?;
        let first_paint = Reflect::get(&timing, &"msFirstPaint".into()).ok()?.as_f64()?;
        let navigation_start = Reflect::get(&timing, &"navigationStart".into())
            .ok()?
            .as_f64()?;
        (first_paint > 0.0).then(|| first_paint - navigation_start)
    }
}

impl LegacyPaintTiming for LegacyPaint {
    fn first_paint(&self) -> Option<f64> {
        let window: JsValue = web_sys::window()?.into();
        Self::chrome_load_times(&window).or_else(|| Self::ms_first_paint(&window))
    }
}

#[cfg(target_arch = "wasm32")]
mod wasm_tests {
    use super::*;
    use perfume_core::{MarkPhase, MetricEntry, NativeTiming, TimingBackend};
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_browser_supports_user_timing() {
        assert!(supported());
        assert!(WebPerformance::new().is_some());
    }

    #[wasm_bindgen_test]
    fn test_native_measure_reads_platform_entry() {
        let timing = NativeTiming::new(WebPerformance::new().unwrap());
        let start = timing.now();
        timing.mark("wasm_measure", MarkPhase::Start);
        timing.mark("wasm_measure", MarkPhase::End);
        let entry = MetricEntry {
            start,
            end: timing.now(),
        };
        assert!(timing.measure("wasm_measure", &entry) >= 0.0);
    }

    #[wasm_bindgen_test]
    fn test_date_clock_is_wall_time() {
        assert!(DateClock.now_ms() > 1.0e12);
    }
}
