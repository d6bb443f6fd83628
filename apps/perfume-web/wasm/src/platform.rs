//! Feature detection and assembly of the browser [`Platform`]

use crate::console::BrowserConsole;
use crate::hooks::{FirstInputDelayPolyfill, TimeToInteractivePolyfill, WindowGoogleAnalytics};
use crate::lifecycle::DocumentLifecycle;
use crate::performance::{self, DateClock, LegacyPaint, WebPerformance};
use crate::scheduler::WebScheduler;
use perfume_core::{
    browser, BrowserInfo, EmulatedTiming, NativeTiming, Platform, TaskScheduler, TimingBackend,
};
use std::rc::Rc;
use tracing::debug;

fn emulated(scheduler: &Rc<dyn TaskScheduler>) -> Rc<dyn TimingBackend> {
    Rc::new(EmulatedTiming::new(DateClock, LegacyPaint, Rc::clone(scheduler)))
}

/// `navigator.userAgent` parsed into browser and OS
pub fn detect_browser() -> Option<BrowserInfo> {
    let user_agent = web_sys::window()?.navigator().user_agent().ok()?;
    browser::detect(&user_agent)
}

/// Pick every capability from what the current page provides
pub fn browser_platform(browser_tracker: bool) -> Platform {
    let scheduler: Rc<dyn TaskScheduler> = Rc::new(WebScheduler);

    let native = performance::supported()
        .then(WebPerformance::new)
        .flatten()
        .map(|buffer| Rc::new(NativeTiming::new(buffer)) as Rc<dyn TimingBackend>);
    let high_resolution = native.is_some();
    let timing = match native {
        Some(native) => native,
        None => {
            debug!("performance API unavailable, using Date.now()");
            emulated(&scheduler)
        }
    };

    let mut platform = Platform::new(timing, Rc::clone(&scheduler), Rc::new(BrowserConsole))
        .with_high_resolution(high_resolution)
        .with_first_input_delay(Rc::new(FirstInputDelayPolyfill))
        .with_time_to_interactive(Rc::new(TimeToInteractivePolyfill))
        .with_google_analytics(Rc::new(WindowGoogleAnalytics));

    if !performance::supported_performance_observer() {
        platform = platform.with_paint_fallback(emulated(&scheduler));
    }
    if let Some(lifecycle) = DocumentLifecycle::new() {
        platform = platform.with_lifecycle(Rc::new(lifecycle));
    }
    if browser_tracker {
        platform = platform.with_browser(detect_browser());
    }
    platform
}

#[cfg(target_arch = "wasm32")]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_browser_platform_uses_native_timer() {
        let platform = browser_platform(false);
        assert!(platform.high_resolution);
        assert!(platform.lifecycle.is_some());
        assert!(platform.browser.is_none());
    }

    #[wasm_bindgen_test]
    fn test_headless_browser_is_detected() {
        assert!(detect_browser().is_some());
    }
}
