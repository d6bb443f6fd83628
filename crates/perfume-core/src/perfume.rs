//! Measurement engine
//!
//! [`Perfume`] owns the in-flight metrics, the milestone slots and the
//! visibility flag, and wires the platform observers into one dispatch path.
//! All logging and analytics work is deferred onto the [`IdleQueue`] so the
//! measured code path only pays for two timestamps and two marks.
//!
//! The handle is cheap to clone. Callbacks handed to the platform hold weak
//! references, so dropping the last handle releases the engine.

use crate::analytics::{CustomProperties, GoogleAnalytics};
use crate::browser::{tag_metric_name, BrowserInfo};
use crate::config::PerfumeConfig;
use crate::console::{format_metric_line, round_two_decimals, Console, METRIC_STYLE};
use crate::error::PerfumeError;
use crate::idle_queue::{IdleQueue, TaskScheduler};
use crate::input_delay::MilestoneHook;
use crate::milestone::{Milestone, MilestoneObserver};
use crate::paint::PaintObserver;
use crate::platform::Platform;
use crate::timing::{MarkPhase, MetricEntry, PaintCallback, PaintTiming, TimingBackend};
use crate::visibility::{LifecycleEvent, PageLifecycle, VisibilityTracker};
use futures::channel::oneshot;
use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::rc::{Rc, Weak};
use tracing::{debug, trace};

struct Inner {
    config: PerfumeConfig,
    timing: Rc<dyn TimingBackend>,
    paint_fallback: Option<Rc<dyn TimingBackend>>,
    high_resolution: bool,
    scheduler: Rc<dyn TaskScheduler>,
    console: Rc<dyn Console>,
    google_analytics: Rc<dyn GoogleAnalytics>,
    browser: Option<BrowserInfo>,
    queue: IdleQueue,
    visibility: VisibilityTracker,
    metrics: RefCell<HashMap<String, MetricEntry>>,
    durations: RefCell<HashMap<Milestone, f64>>,
    observers: RefCell<HashMap<Milestone, oneshot::Sender<f64>>>,
    paint: RefCell<PaintObserver>,
    observe_first_contentful_paint: Option<MilestoneObserver>,
    observe_first_input_delay: Option<MilestoneObserver>,
    observe_time_to_interactive: Option<MilestoneObserver>,
}

/// Performance measurement engine
#[derive(Clone)]
pub struct Perfume {
    inner: Rc<Inner>,
}

impl Perfume {
    pub fn new(config: PerfumeConfig, platform: Platform) -> Self {
        let Platform {
            timing,
            high_resolution,
            paint_fallback,
            scheduler,
            console,
            lifecycle,
            first_input_delay,
            time_to_interactive,
            google_analytics,
            browser,
        } = platform;

        let mut observers = HashMap::new();
        let mut arm = |enabled: bool, milestone: Milestone| {
            enabled.then(|| {
                let (tx, observer) = MilestoneObserver::pending();
                observers.insert(milestone, tx);
                observer
            })
        };
        let observe_first_contentful_paint =
            arm(config.observes_paint(), Milestone::FirstContentfulPaint);
        let observe_first_input_delay = arm(config.first_input_delay, Milestone::FirstInputDelay);
        let observe_time_to_interactive =
            arm(config.time_to_interactive, Milestone::TimeToInteractive);

        let browser = if config.browser_tracker { browser } else { None };
        let paint = PaintObserver::new(config.first_paint, config.first_contentful_paint);
        // Flush pending work whenever the page might soon be unloaded.
        let queue = IdleQueue::new(Rc::clone(&scheduler), true);

        let perfume = Self {
            inner: Rc::new(Inner {
                config,
                timing,
                paint_fallback,
                high_resolution,
                scheduler,
                console,
                google_analytics,
                browser,
                queue,
                visibility: VisibilityTracker::new(),
                metrics: RefCell::new(HashMap::new()),
                durations: RefCell::new(HashMap::new()),
                observers: RefCell::new(observers),
                paint: RefCell::new(paint),
                observe_first_contentful_paint,
                observe_first_input_delay,
                observe_time_to_interactive,
            }),
        };

        if perfume.inner.config.observes_paint() {
            perfume.log_debug("observeFirstContentfulPaint", "");
            perfume.init_first_paint();
        }
        if perfume.inner.config.first_input_delay {
            perfume.init_milestone_hook(first_input_delay.as_ref(), Milestone::FirstInputDelay);
        }
        if perfume.inner.config.time_to_interactive {
            perfume.init_milestone_hook(
                time_to_interactive.as_ref(),
                Milestone::TimeToInteractive,
            );
        }
        if let Some(lifecycle) = lifecycle {
            perfume.on_visibility_change(lifecycle.as_ref());
        }

        perfume
    }

    pub fn config(&self) -> &PerfumeConfig {
        &self.inner.config
    }

    /// Start a named measurement
    pub fn start(&self, metric_name: &str) {
        if let Err(e) = self.try_start(metric_name) {
            self.log_warn(&e);
        }
    }

    pub fn try_start(&self, metric_name: &str) -> Result<(), PerfumeError> {
        check_metric_name(metric_name)?;
        {
            let mut metrics = self.inner.metrics.borrow_mut();
            if metrics.contains_key(metric_name) {
                return Err(PerfumeError::AlreadyStarted {
                    metric: metric_name.to_string(),
                });
            }
            let start = self.inner.timing.now();
            metrics.insert(metric_name.to_string(), MetricEntry::started_at(start));
        }
        self.inner.timing.mark(metric_name, MarkPhase::Start);
        self.inner.visibility.reset();
        Ok(())
    }

    /// End a named measurement and return its duration, rounded to two
    /// decimals. Logging and delivery happen later on the idle queue.
    pub fn end(
        &self,
        metric_name: &str,
        custom_properties: Option<CustomProperties>,
    ) -> Option<f64> {
        match self.try_end(metric_name, custom_properties) {
            Ok(duration) => Some(duration),
            Err(e) => {
                self.log_warn(&e);
                None
            }
        }
    }

    pub fn try_end(
        &self,
        metric_name: &str,
        custom_properties: Option<CustomProperties>,
    ) -> Result<f64, PerfumeError> {
        check_metric_name(metric_name)?;
        let mut entry = self
            .inner
            .metrics
            .borrow()
            .get(metric_name)
            .copied()
            .ok_or_else(|| PerfumeError::NotStarted {
                metric: metric_name.to_string(),
            })?;

        entry.end = self.inner.timing.now();
        self.inner.timing.mark(metric_name, MarkPhase::End);
        let duration = round_two_decimals(self.inner.timing.measure(metric_name, &entry));
        self.inner.metrics.borrow_mut().remove(metric_name);

        let name = metric_name.to_string();
        self.defer(move |perfume| {
            if perfume.exceeds_ceiling(duration) {
                trace!("{} dropped: {} ms over ceiling", name, duration);
                return;
            }
            perfume.log(&name, duration, custom_properties.as_ref());
            perfume.send_timing(&name, duration, custom_properties.as_ref());
        });

        Ok(duration)
    }

    /// End a measurement on the next macrotask, so paint work scheduled by
    /// the caller completes first
    pub fn end_paint(
        &self,
        metric_name: &str,
        custom_properties: Option<CustomProperties>,
    ) -> impl Future<Output = Option<f64>> + 'static {
        let (tx, rx) = oneshot::channel();
        let weak = Rc::downgrade(&self.inner);
        let name = metric_name.to_string();
        self.inner.scheduler.set_timeout(Box::new(move || {
            let duration = upgrade(&weak).and_then(|perfume| perfume.end(&name, custom_properties));
            let _ = tx.send(duration);
        }));
        async move { rx.await.ok().flatten() }
    }

    /// Styled console line for a measurement
    pub fn log(
        &self,
        metric_name: &str,
        duration: f64,
        custom_properties: Option<&CustomProperties>,
    ) {
        if self.inner.visibility.is_hidden() || !self.inner.config.logging {
            return;
        }
        if let Err(e) = check_metric_name(metric_name) {
            self.log_warn(&e);
            return;
        }
        let text = format_metric_line(
            &self.inner.config.log_prefix,
            metric_name,
            duration,
            custom_properties,
        );
        self.inner.console.log(&text, METRIC_STYLE);
    }

    pub fn log_debug(&self, method_name: &str, debug_value: &str) {
        if !self.inner.config.debugging {
            return;
        }
        self.inner
            .console
            .debug(&format!("Perfume.js debugging {}:", method_name), debug_value);
    }

    /// Deliver a measurement to the custom tracker and Google Analytics.
    ///
    /// GA receives `ga('send', 'timing', name, timingVar, round(duration))`
    /// where `name` carries the browser tags when browser tracking is on.
    pub fn send_timing(
        &self,
        metric_name: &str,
        duration: f64,
        custom_properties: Option<&CustomProperties>,
    ) {
        if self.inner.visibility.is_hidden() {
            return;
        }
        let config = &self.inner.config;
        let browser = self.inner.browser.as_ref();

        if let Some(tracker) = &config.analytics_tracker {
            tracker(metric_name, duration, browser, custom_properties);
        }

        if !config.google_analytics.enable {
            return;
        }
        let category = if config.browser_tracker {
            tag_metric_name(metric_name, browser)
        } else {
            metric_name.to_string()
        };
        let result = self.inner.google_analytics.send_timing(
            &category,
            &config.google_analytics.timing_var,
            duration.round() as i64,
        );
        if let Err(e) = result {
            self.log_warn(&e);
        }
    }

    pub fn first_paint_duration(&self) -> f64 {
        self.milestone_duration(Milestone::FirstPaint)
    }

    pub fn first_contentful_paint_duration(&self) -> f64 {
        self.milestone_duration(Milestone::FirstContentfulPaint)
    }

    pub fn first_input_delay_duration(&self) -> f64 {
        self.milestone_duration(Milestone::FirstInputDelay)
    }

    pub fn time_to_interactive_duration(&self) -> f64 {
        self.milestone_duration(Milestone::TimeToInteractive)
    }

    /// Recorded milestone duration, `0.0` until it fires
    pub fn milestone_duration(&self, milestone: Milestone) -> f64 {
        self.inner
            .durations
            .borrow()
            .get(&milestone)
            .copied()
            .unwrap_or(0.0)
    }

    /// Present when first paint or first contentful paint is enabled
    pub fn observe_first_contentful_paint(&self) -> Option<MilestoneObserver> {
        self.inner.observe_first_contentful_paint.clone()
    }

    pub fn observe_first_input_delay(&self) -> Option<MilestoneObserver> {
        self.inner.observe_first_input_delay.clone()
    }

    pub fn observe_time_to_interactive(&self) -> Option<MilestoneObserver> {
        self.inner.observe_time_to_interactive.clone()
    }

    pub fn is_hidden(&self) -> bool {
        self.inner.visibility.is_hidden()
    }

    pub fn is_recording(&self, metric_name: &str) -> bool {
        self.inner.metrics.borrow().contains_key(metric_name)
    }

    pub fn pending_tasks(&self) -> usize {
        self.inner.queue.len()
    }

    /// Milestone dispatch shared by the paint and polyfill observers
    fn log_metric(&self, duration: f64, milestone: Milestone) {
        let duration = round_two_decimals(duration);
        // False negatives, e.g. a tab suspended and resumed mid-load
        if self.exceeds_ceiling(duration) {
            trace!(
                "{} dropped: {} ms over ceiling",
                milestone.metric_name(),
                duration
            );
            return;
        }

        self.inner.durations.borrow_mut().insert(milestone, duration);
        let resolver = self.inner.observers.borrow_mut().remove(&milestone);
        if let Some(tx) = resolver {
            let _ = tx.send(duration);
        }

        self.log(milestone.log_text(), duration, None);
        self.send_timing(milestone.metric_name(), duration, None);
    }

    fn first_contentful_paint_cb(&self, entries: Vec<PaintTiming>) {
        if self.inner.config.debugging {
            let value = serde_json::to_string(&entries).unwrap_or_default();
            self.log_debug("firstContentfulPaintCb", &value);
        }
        let matched = self.inner.paint.borrow_mut().accept(&entries);
        for (milestone, start_time) in matched {
            self.defer(move |perfume| perfume.log_metric(start_time, milestone));
        }
    }

    fn init_first_paint(&self) {
        self.log_debug("initFirstPaint", "");
        let weak = Rc::downgrade(&self.inner);
        let callback: PaintCallback = Box::new(move |entries| {
            if let Some(perfume) = upgrade(&weak) {
                perfume.first_contentful_paint_cb(entries);
            }
        });

        let result = match &self.inner.paint_fallback {
            None => {
                self.log_debug("initFirstPaint.supportedPerformanceObserver", "");
                self.inner.timing.first_contentful_paint(callback)
            }
            Some(emulated) => {
                self.log_debug("initFirstPaint.perfEmulated", "");
                emulated.first_contentful_paint(callback)
            }
        };

        if let Err(e) = result {
            let e = match e {
                PerfumeError::PaintObserverFailed(_) => e,
                other => PerfumeError::PaintObserverFailed(other.to_string()),
            };
            self.log_warn(&e);
        }
    }

    fn init_milestone_hook(&self, hook: &dyn MilestoneHook, milestone: Milestone) {
        if !self.inner.high_resolution {
            debug!("{} skipped: no high resolution timer", milestone.metric_name());
            return;
        }
        let weak = Rc::downgrade(&self.inner);
        let result = hook.subscribe(Box::new(move |duration| {
            if let Some(perfume) = upgrade(&weak) {
                perfume.defer(move |perfume| perfume.log_metric(duration, milestone));
            }
        }));
        if let Err(e) = result {
            self.log_warn(&e);
        }
    }

    /// The queue flushes before the hidden flag latches, so measurements
    /// taken in the foreground are still delivered.
    fn on_visibility_change(&self, lifecycle: &dyn PageLifecycle) {
        let weak = Rc::downgrade(&self.inner);
        let supported = lifecycle.subscribe(Box::new(move |event: LifecycleEvent| {
            if let Some(inner) = weak.upgrade() {
                if event.is_teardown() {
                    inner.queue.on_page_teardown();
                }
                inner.visibility.on_event(event);
            }
        }));
        if !supported {
            debug!("page visibility notifications unsupported");
        }
    }

    /// Queue work that runs only if the engine is still alive
    fn defer(&self, work: impl FnOnce(&Perfume) + 'static) {
        let weak = Rc::downgrade(&self.inner);
        self.inner.queue.push_task(Box::new(move || {
            if let Some(perfume) = upgrade(&weak) {
                work(&perfume);
            }
        }));
    }

    fn exceeds_ceiling(&self, duration: f64) -> bool {
        duration > self.inner.config.max_measure_time
    }

    fn log_warn(&self, error: &PerfumeError) {
        debug!("perfume warning: {}", error);
        if !self.inner.config.warning || !self.inner.config.logging {
            return;
        }
        self.inner
            .console
            .warn(&self.inner.config.log_prefix, &error.to_string());
    }
}

impl std::fmt::Debug for Perfume {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Perfume")
            .field("config", &self.inner.config)
            .field("in_flight", &self.inner.metrics.borrow().len())
            .field("hidden", &self.inner.visibility.is_hidden())
            .field("queue", &self.inner.queue)
            .finish()
    }
}

fn upgrade(weak: &Weak<Inner>) -> Option<Perfume> {
    weak.upgrade().map(|inner| Perfume { inner })
}

fn check_metric_name(metric_name: &str) -> Result<(), PerfumeError> {
    if metric_name.is_empty() {
        return Err(PerfumeError::MissingMetricName);
    }
    Ok(())
}
