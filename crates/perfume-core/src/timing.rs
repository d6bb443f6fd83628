//! Timing backends
//!
//! The engine depends only on [`TimingBackend`]. Two implementations exist:
//!
//! - [`NativeTiming`]: wraps a platform high-resolution timer with User Timing
//!   marks and measures (`performance.now()`, `performance.mark()`, ...)
//! - [`EmulatedTiming`]: wall-clock fallback for platforms without the
//!   Performance API. Millisecond resolution, no platform buffer.
//!
//! The platform bindings implement the small capability traits
//! ([`PerformanceBuffer`], [`WallClock`], [`LegacyPaintTiming`]) and pick a
//! backend once at construction.

use crate::error::PerfumeError;
use crate::idle_queue::TaskScheduler;
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use tracing::{debug, trace};

/// Milliseconds on the backend's clock
pub type Timestamp = f64;

pub const FIRST_PAINT: &str = "first-paint";
pub const FIRST_CONTENTFUL_PAINT: &str = "first-contentful-paint";

/// A named measurement that has been started
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MetricEntry {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl MetricEntry {
    pub fn started_at(start: Timestamp) -> Self {
        Self { start, end: 0.0 }
    }

    /// Duration from the locally stored timestamps
    pub fn elapsed(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkPhase {
    Start,
    End,
}

impl MarkPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkPhase::Start => "start",
            MarkPhase::End => "end",
        }
    }
}

/// Name of the platform mark for a metric phase, e.g. `mark_render_start`
pub fn mark_name(metric_name: &str, phase: MarkPhase) -> String {
    format!("mark_{}_{}", metric_name, phase.as_str())
}

/// A paint timing entry as reported by the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaintTiming {
    pub name: String,
    pub entry_type: String,
    pub start_time: f64,
    pub duration: f64,
}

impl PaintTiming {
    pub fn paint(name: &str, start_time: f64) -> Self {
        Self {
            name: name.to_string(),
            entry_type: "paint".to_string(),
            start_time,
            duration: 0.0,
        }
    }
}

/// Receives batches of paint entries
pub type PaintCallback = Box<dyn FnMut(Vec<PaintTiming>)>;

/// Clock, marks and paint observation as seen by the engine
pub trait TimingBackend {
    fn now(&self) -> Timestamp;

    /// Record a platform mark. Never fails; platform errors are swallowed.
    fn mark(&self, metric_name: &str, phase: MarkPhase);

    /// Duration of an ended entry in milliseconds
    fn measure(&self, metric_name: &str, entry: &MetricEntry) -> f64;

    /// Start delivering paint entries to `callback`
    fn first_contentful_paint(&self, callback: PaintCallback) -> Result<(), PerfumeError>;
}

/// Platform high-resolution timer with a User Timing buffer
pub trait PerformanceBuffer {
    fn now(&self) -> f64;

    fn mark(&self, mark: &str) -> Result<(), PerfumeError>;

    /// Create a measure between two marks and return its recorded duration.
    /// `Ok(None)` when the platform kept no matching measure entry.
    fn measure(&self, name: &str, start_mark: &str, end_mark: &str)
        -> Result<Option<f64>, PerfumeError>;

    /// Register a native paint-timing observer
    fn observe_paint(&self, callback: PaintCallback) -> Result<(), PerfumeError>;
}

/// Native backend over a [`PerformanceBuffer`]
pub struct NativeTiming<B> {
    buffer: B,
}

impl<B: PerformanceBuffer> NativeTiming<B> {
    pub fn new(buffer: B) -> Self {
        Self { buffer }
    }
}

impl<B: PerformanceBuffer> TimingBackend for NativeTiming<B> {
    fn now(&self) -> Timestamp {
        self.buffer.now()
    }

    fn mark(&self, metric_name: &str, phase: MarkPhase) {
        if let Err(e) = self.buffer.mark(&mark_name(metric_name, phase)) {
            trace!("mark {} {} swallowed: {}", metric_name, phase.as_str(), e);
        }
    }

    fn measure(&self, metric_name: &str, entry: &MetricEntry) -> f64 {
        let start_mark = mark_name(metric_name, MarkPhase::Start);
        let end_mark = mark_name(metric_name, MarkPhase::End);
        match self.buffer.measure(metric_name, &start_mark, &end_mark) {
            Ok(Some(duration)) if duration >= 0.0 => duration,
            Ok(_) => entry.elapsed(),
            Err(e) => {
                trace!("measure {} fell back to stored entry: {}", metric_name, e);
                entry.elapsed()
            }
        }
    }

    fn first_contentful_paint(&self, callback: PaintCallback) -> Result<(), PerfumeError> {
        self.buffer.observe_paint(callback)
    }
}

/// Millisecond wall clock (`Date.now()`)
pub trait WallClock {
    fn now_ms(&self) -> f64;
}

/// Pre-Paint-Timing sources of the first paint time
pub trait LegacyPaintTiming {
    /// First paint in milliseconds since navigation start, if the platform
    /// exposes one
    fn first_paint(&self) -> Option<f64>;
}

/// Wall-clock fallback backend
pub struct EmulatedTiming<C, P> {
    clock: C,
    legacy_paint: Rc<P>,
    scheduler: Rc<dyn TaskScheduler>,
}

impl<C: WallClock, P: LegacyPaintTiming + 'static> EmulatedTiming<C, P> {
    pub fn new(clock: C, legacy_paint: P, scheduler: Rc<dyn TaskScheduler>) -> Self {
        Self {
            clock,
            legacy_paint: Rc::new(legacy_paint),
            scheduler,
        }
    }
}

impl<C: WallClock, P: LegacyPaintTiming + 'static> TimingBackend for EmulatedTiming<C, P> {
    fn now(&self) -> Timestamp {
        self.clock.now_ms()
    }

    // No platform buffer to mark against.
    fn mark(&self, _metric_name: &str, _phase: MarkPhase) {}

    fn measure(&self, _metric_name: &str, entry: &MetricEntry) -> f64 {
        entry.elapsed()
    }

    /// Polls the legacy paint timing on the next macrotask
    fn first_contentful_paint(&self, mut callback: PaintCallback) -> Result<(), PerfumeError> {
        let legacy_paint = Rc::clone(&self.legacy_paint);
        self.scheduler.set_timeout(Box::new(move || {
            match legacy_paint.first_paint() {
                Some(start_time) => {
                    callback(vec![PaintTiming::paint(FIRST_CONTENTFUL_PAINT, start_time)])
                }
                None => debug!("no legacy paint timing available"),
            }
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idle_queue::{IdleCallback, Task};
    use std::cell::{Cell, RefCell};

    struct FakeBuffer {
        now: Cell<f64>,
        marks: RefCell<Vec<String>>,
        measured: Option<f64>,
        fail: bool,
    }

    impl FakeBuffer {
        fn new(measured: Option<f64>) -> Self {
            Self {
                now: Cell::new(0.0),
                marks: RefCell::new(Vec::new()),
                measured,
                fail: false,
            }
        }
    }

    impl PerformanceBuffer for &FakeBuffer {
        fn now(&self) -> f64 {
            self.now.get()
        }

        fn mark(&self, mark: &str) -> Result<(), PerfumeError> {
            if self.fail {
                return Err(PerfumeError::Platform("buffer full".to_string()));
            }
            self.marks.borrow_mut().push(mark.to_string());
            Ok(())
        }

        fn measure(&self, _: &str, _: &str, _: &str) -> Result<Option<f64>, PerfumeError> {
            if self.fail {
                return Err(PerfumeError::Platform("missing mark".to_string()));
            }
            Ok(self.measured)
        }

        fn observe_paint(&self, _: PaintCallback) -> Result<(), PerfumeError> {
            Err(PerfumeError::PaintObserverFailed("unsupported".to_string()))
        }
    }

    #[derive(Default)]
    struct TimeoutOnly {
        timeouts: RefCell<Vec<Task>>,
    }

    impl TaskScheduler for TimeoutOnly {
        fn request_idle(&self, _callback: IdleCallback) {}

        fn set_timeout(&self, task: Task) {
            self.timeouts.borrow_mut().push(task);
        }
    }

    impl TimeoutOnly {
        fn run(&self) {
            let tasks: Vec<Task> = self.timeouts.borrow_mut().drain(..).collect();
            for task in tasks {
                task();
            }
        }
    }

    struct FixedClock(f64);

    impl WallClock for FixedClock {
        fn now_ms(&self) -> f64 {
            self.0
        }
    }

    struct Legacy(Option<f64>);

    impl LegacyPaintTiming for Legacy {
        fn first_paint(&self) -> Option<f64> {
            self.0
        }
    }

    #[test]
    fn test_mark_name_format() {
        assert_eq!(mark_name("render", MarkPhase::Start), "mark_render_start");
        assert_eq!(mark_name("render", MarkPhase::End), "mark_render_end");
    }

    #[test]
    fn test_native_marks_use_phase_names() {
        let buffer = FakeBuffer::new(None);
        let timing = NativeTiming::new(&buffer);
        timing.mark("fetch", MarkPhase::Start);
        timing.mark("fetch", MarkPhase::End);
        assert_eq!(
            *buffer.marks.borrow(),
            vec!["mark_fetch_start".to_string(), "mark_fetch_end".to_string()]
        );
    }

    #[test]
    fn test_native_measure_prefers_platform_record() {
        let buffer = FakeBuffer::new(Some(12.5));
        let timing = NativeTiming::new(&buffer);
        let entry = MetricEntry { start: 100.0, end: 200.0 };
        assert_eq!(timing.measure("fetch", &entry), 12.5);
    }

    #[test]
    fn test_native_measure_falls_back_to_entry() {
        let buffer = FakeBuffer::new(None);
        let timing = NativeTiming::new(&buffer);
        let entry = MetricEntry { start: 100.0, end: 137.456 };
        assert!((timing.measure("fetch", &entry) - 37.456).abs() < 1e-9);
    }

    #[test]
    fn test_native_swallows_platform_errors() {
        let mut buffer = FakeBuffer::new(Some(1.0));
        buffer.fail = true;
        let timing = NativeTiming::new(&buffer);
        timing.mark("fetch", MarkPhase::Start);
        let entry = MetricEntry { start: 10.0, end: 15.0 };
        assert_eq!(timing.measure("fetch", &entry), 5.0);
        assert!(buffer.marks.borrow().is_empty());
    }

    #[test]
    fn test_emulated_measure_uses_entry() {
        let scheduler: Rc<dyn TaskScheduler> = Rc::new(TimeoutOnly::default());
        let timing = EmulatedTiming::new(FixedClock(42.0), Legacy(None), scheduler);
        assert_eq!(timing.now(), 42.0);
        let entry = MetricEntry { start: 40.0, end: 42.0 };
        assert_eq!(timing.measure("x", &entry), 2.0);
    }

    #[test]
    fn test_emulated_paint_polls_on_next_macrotask() {
        let scheduler = Rc::new(TimeoutOnly::default());
        let timing = EmulatedTiming::new(FixedClock(0.0), Legacy(Some(320.0)), scheduler.clone());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();

        timing
            .first_contentful_paint(Box::new(move |entries| sink.borrow_mut().extend(entries)))
            .unwrap();
        assert!(seen.borrow().is_empty());

        scheduler.run();
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].name, FIRST_CONTENTFUL_PAINT);
        assert_eq!(seen[0].start_time, 320.0);
    }

    #[test]
    fn test_emulated_paint_without_legacy_source_reports_nothing() {
        let scheduler = Rc::new(TimeoutOnly::default());
        let timing = EmulatedTiming::new(FixedClock(0.0), Legacy(None), scheduler.clone());
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();

        timing
            .first_contentful_paint(Box::new(move |_| counter.set(counter.get() + 1)))
            .unwrap();
        scheduler.run();
        assert_eq!(calls.get(), 0);
    }
}
