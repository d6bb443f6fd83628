//! In-memory host for driving the engine from tests
//!
//! Every capability records what the engine did with it and exposes a way to
//! play the platform's part (advance the clock, grant an idle window, fire a
//! paint entry, hide the page).

#![allow(dead_code)]

use perfume_core::{
    AnalyticsTracker, BrowserInfo, Console, CustomProperties, GoogleAnalytics, IdleCallback,
    IdleDeadline, LifecycleEvent, LifecycleListener, MarkPhase, MetricEntry, MilestoneCallback,
    MilestoneHook, PageLifecycle, PaintCallback, PaintTiming, Perfume, PerfumeConfig,
    PerfumeError, Platform, Task, TaskScheduler, TimingBackend,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Default)]
pub struct FakeTiming {
    pub now: Cell<f64>,
    pub marks: RefCell<Vec<String>>,
    pub paint_callback: RefCell<Option<PaintCallback>>,
    pub fail_paint: Cell<bool>,
}

impl FakeTiming {
    pub fn set_now(&self, now: f64) {
        self.now.set(now);
    }

    pub fn emit_paint(&self, entries: Vec<PaintTiming>) {
        let mut callback = self.paint_callback.borrow_mut();
        let callback = callback.as_mut().expect("paint observer not registered");
        callback(entries);
    }

    pub fn is_observing_paint(&self) -> bool {
        self.paint_callback.borrow().is_some()
    }
}

impl TimingBackend for FakeTiming {
    fn now(&self) -> f64 {
        self.now.get()
    }

    fn mark(&self, metric_name: &str, phase: MarkPhase) {
        self.marks
            .borrow_mut()
            .push(format!("{}:{}", metric_name, phase.as_str()));
    }

    fn measure(&self, _metric_name: &str, entry: &MetricEntry) -> f64 {
        entry.elapsed()
    }

    fn first_contentful_paint(&self, callback: PaintCallback) -> Result<(), PerfumeError> {
        if self.fail_paint.get() {
            return Err(PerfumeError::Platform("PerformanceObserver threw".to_string()));
        }
        *self.paint_callback.borrow_mut() = Some(callback);
        Ok(())
    }
}

struct Window(f64);

impl IdleDeadline for Window {
    fn time_remaining(&self) -> f64 {
        self.0
    }
}

#[derive(Default)]
pub struct FakeScheduler {
    pub idle: RefCell<Vec<IdleCallback>>,
    pub timeouts: RefCell<Vec<Task>>,
}

impl TaskScheduler for FakeScheduler {
    fn request_idle(&self, callback: IdleCallback) {
        self.idle.borrow_mut().push(callback);
    }

    fn set_timeout(&self, task: Task) {
        self.timeouts.borrow_mut().push(task);
    }
}

impl FakeScheduler {
    /// Grant one generous idle window to every pending request
    pub fn run_idle(&self) {
        let callbacks: Vec<IdleCallback> = self.idle.borrow_mut().drain(..).collect();
        for callback in callbacks {
            callback(&Window(50.0));
        }
    }

    pub fn run_timeouts(&self) {
        let tasks: Vec<Task> = self.timeouts.borrow_mut().drain(..).collect();
        for task in tasks {
            task();
        }
    }

    pub fn has_idle_requests(&self) -> bool {
        !self.idle.borrow().is_empty()
    }
}

#[derive(Default)]
pub struct RecordingConsole {
    pub logs: RefCell<Vec<(String, String)>>,
    pub warnings: RefCell<Vec<String>>,
    pub debug: RefCell<Vec<String>>,
}

impl Console for RecordingConsole {
    fn log(&self, text: &str, style: &str) {
        self.logs
            .borrow_mut()
            .push((text.to_string(), style.to_string()));
    }

    fn warn(&self, prefix: &str, message: &str) {
        self.warnings
            .borrow_mut()
            .push(format!("{} {}", prefix, message));
    }

    fn debug(&self, label: &str, value: &str) {
        self.debug.borrow_mut().push(format!("{} {}", label, value));
    }
}

impl RecordingConsole {
    pub fn lines(&self) -> Vec<String> {
        self.logs.borrow().iter().map(|(text, _)| text.clone()).collect()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.borrow().clone()
    }
}

#[derive(Default)]
pub struct FakeLifecycle {
    listeners: RefCell<Vec<LifecycleListener>>,
}

impl PageLifecycle for FakeLifecycle {
    fn subscribe(&self, listener: LifecycleListener) -> bool {
        self.listeners.borrow_mut().push(listener);
        true
    }
}

impl FakeLifecycle {
    pub fn emit(&self, event: LifecycleEvent) {
        for listener in self.listeners.borrow_mut().iter_mut() {
            listener(event);
        }
    }
}

#[derive(Default)]
pub struct FakeHook {
    callback: RefCell<Option<MilestoneCallback>>,
}

impl MilestoneHook for FakeHook {
    fn subscribe(&self, callback: MilestoneCallback) -> Result<(), PerfumeError> {
        *self.callback.borrow_mut() = Some(callback);
        Ok(())
    }
}

impl FakeHook {
    pub fn fire(&self, value: f64) {
        if let Some(callback) = self.callback.borrow_mut().as_mut() {
            callback(value);
        }
    }

    pub fn is_subscribed(&self) -> bool {
        self.callback.borrow().is_some()
    }
}

#[derive(Default)]
pub struct FakeGa {
    pub loaded: Cell<bool>,
    pub sent: RefCell<Vec<(String, String, i64)>>,
}

impl GoogleAnalytics for FakeGa {
    fn send_timing(&self, category: &str, timing_var: &str, value: i64) -> Result<(), PerfumeError> {
        if !self.loaded.get() {
            return Err(PerfumeError::AnalyticsUnavailable);
        }
        self.sent
            .borrow_mut()
            .push((category.to_string(), timing_var.to_string(), value));
        Ok(())
    }
}

/// Arguments the custom analytics callback received
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedTiming {
    pub metric_name: String,
    pub duration: f64,
    pub browser: Option<BrowserInfo>,
    pub custom_properties: Option<serde_json::Value>,
}

/// The fake host plus the engine it drives
pub struct Harness {
    pub perfume: Perfume,
    pub timing: Rc<FakeTiming>,
    pub scheduler: Rc<FakeScheduler>,
    pub console: Rc<RecordingConsole>,
    pub lifecycle: Rc<FakeLifecycle>,
    pub fid: Rc<FakeHook>,
    pub tti: Rc<FakeHook>,
    pub ga: Rc<FakeGa>,
    pub tracked: Rc<RefCell<Vec<TrackedTiming>>>,
}

pub struct HarnessBuilder {
    config: PerfumeConfig,
    high_resolution: bool,
    ga_loaded: bool,
    browser: Option<BrowserInfo>,
    track: bool,
    fail_paint: bool,
}

impl HarnessBuilder {
    pub fn new(config: PerfumeConfig) -> Self {
        Self {
            config,
            high_resolution: true,
            ga_loaded: false,
            browser: None,
            track: false,
            fail_paint: false,
        }
    }

    pub fn high_resolution(mut self, supported: bool) -> Self {
        self.high_resolution = supported;
        self
    }

    pub fn ga_loaded(mut self) -> Self {
        self.ga_loaded = true;
        self
    }

    pub fn browser(mut self, browser: BrowserInfo) -> Self {
        self.browser = Some(browser);
        self
    }

    /// Install a custom analytics tracker that records its arguments
    pub fn tracked(mut self) -> Self {
        self.track = true;
        self
    }

    pub fn failing_paint_observer(mut self) -> Self {
        self.fail_paint = true;
        self
    }

    pub fn build(self) -> Harness {
        let timing = Rc::new(FakeTiming::default());
        timing.fail_paint.set(self.fail_paint);
        let scheduler = Rc::new(FakeScheduler::default());
        let console = Rc::new(RecordingConsole::default());
        let lifecycle = Rc::new(FakeLifecycle::default());
        let fid = Rc::new(FakeHook::default());
        let tti = Rc::new(FakeHook::default());
        let ga = Rc::new(FakeGa::default());
        ga.loaded.set(self.ga_loaded);
        let tracked = Rc::new(RefCell::new(Vec::new()));

        let mut config = self.config;
        if self.track {
            let sink = tracked.clone();
            let tracker: AnalyticsTracker = Rc::new(
                move |name: &str,
                      duration: f64,
                      browser: Option<&BrowserInfo>,
                      props: Option<&CustomProperties>| {
                    sink.borrow_mut().push(TrackedTiming {
                        metric_name: name.to_string(),
                        duration,
                        browser: browser.cloned(),
                        custom_properties: props.map(|p| serde_json::Value::Object(p.clone())),
                    });
                },
            );
            config = config.with_analytics_tracker(tracker);
        }

        let platform = Platform::new(timing.clone(), scheduler.clone(), console.clone())
            .with_high_resolution(self.high_resolution)
            .with_lifecycle(lifecycle.clone())
            .with_first_input_delay(fid.clone())
            .with_time_to_interactive(tti.clone())
            .with_google_analytics(ga.clone())
            .with_browser(self.browser);

        Harness {
            perfume: Perfume::new(config, platform),
            timing,
            scheduler,
            console,
            lifecycle,
            fid,
            tti,
            ga,
            tracked,
        }
    }
}

impl Harness {
    pub fn new(config: PerfumeConfig) -> Self {
        HarnessBuilder::new(config).build()
    }

    /// Let the idle queue drain
    pub fn idle(&self) {
        self.scheduler.run_idle();
    }
}

pub fn warning_config() -> PerfumeConfig {
    PerfumeConfig {
        warning: true,
        ..PerfumeConfig::default()
    }
}
