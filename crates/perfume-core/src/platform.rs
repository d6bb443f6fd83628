//! The set of host capabilities an engine is built from

use crate::analytics::{GoogleAnalytics, NoGoogleAnalytics};
use crate::browser::BrowserInfo;
use crate::console::Console;
use crate::idle_queue::TaskScheduler;
use crate::input_delay::{
    MilestoneHook, MissingHook, FIRST_INPUT_DELAY_HOOK, TIME_TO_INTERACTIVE_HOOK,
};
use crate::timing::TimingBackend;
use crate::visibility::PageLifecycle;
use std::rc::Rc;

/// Host capabilities, selected once by feature detection
///
/// `timing` is the native backend when the platform timer exists, the
/// emulated one otherwise. `paint_fallback` is set only when the platform
/// lacks a paint observer; paint entries are then polled through it.
pub struct Platform {
    pub timing: Rc<dyn TimingBackend>,
    /// Native high-resolution timer present (gates the polyfill hooks)
    pub high_resolution: bool,
    pub paint_fallback: Option<Rc<dyn TimingBackend>>,
    pub scheduler: Rc<dyn TaskScheduler>,
    pub console: Rc<dyn Console>,
    pub lifecycle: Option<Rc<dyn PageLifecycle>>,
    pub first_input_delay: Rc<dyn MilestoneHook>,
    pub time_to_interactive: Rc<dyn MilestoneHook>,
    pub google_analytics: Rc<dyn GoogleAnalytics>,
    pub browser: Option<BrowserInfo>,
}

impl Platform {
    /// Minimal platform: no lifecycle events, no polyfills, no `ga`
    pub fn new(
        timing: Rc<dyn TimingBackend>,
        scheduler: Rc<dyn TaskScheduler>,
        console: Rc<dyn Console>,
    ) -> Self {
        Self {
            timing,
            high_resolution: true,
            paint_fallback: None,
            scheduler,
            console,
            lifecycle: None,
            first_input_delay: Rc::new(MissingHook {
                name: FIRST_INPUT_DELAY_HOOK,
            }),
            time_to_interactive: Rc::new(MissingHook {
                name: TIME_TO_INTERACTIVE_HOOK,
            }),
            google_analytics: Rc::new(NoGoogleAnalytics),
            browser: None,
        }
    }

    pub fn with_high_resolution(mut self, supported: bool) -> Self {
        self.high_resolution = supported;
        self
    }

    pub fn with_paint_fallback(mut self, emulated: Rc<dyn TimingBackend>) -> Self {
        self.paint_fallback = Some(emulated);
        self
    }

    pub fn with_lifecycle(mut self, lifecycle: Rc<dyn PageLifecycle>) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn with_first_input_delay(mut self, hook: Rc<dyn MilestoneHook>) -> Self {
        self.first_input_delay = hook;
        self
    }

    pub fn with_time_to_interactive(mut self, hook: Rc<dyn MilestoneHook>) -> Self {
        self.time_to_interactive = hook;
        self
    }

    pub fn with_google_analytics(mut self, ga: Rc<dyn GoogleAnalytics>) -> Self {
        self.google_analytics = ga;
        self
    }

    pub fn with_browser(mut self, browser: Option<BrowserInfo>) -> Self {
        self.browser = browser;
        self
    }
}
