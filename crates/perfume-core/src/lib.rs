//! Perfume metric measurement engine
//!
//! Times named application events, observes paint and input-responsiveness
//! milestones, and forwards the durations to console and analytics sinks
//! without charging the measured code path for the reporting work.
//!
//! The engine is platform-agnostic: every browser capability it consumes is
//! a trait ([`TimingBackend`], [`TaskScheduler`], [`PageLifecycle`],
//! [`MilestoneHook`], [`GoogleAnalytics`], [`Console`]). The wasm bindings
//! implement them on `web-sys`; tests implement them with fakes.
//!
//! # Example
//!
//! ```ignore
//! use perfume_core::{Perfume, PerfumeConfig, Platform};
//!
//! let perfume = Perfume::new(PerfumeConfig::default(), platform);
//! perfume.start("fibonacci");
//! fibonacci(400);
//! let duration = perfume.end("fibonacci", None);
//! ```

pub mod analytics;
pub mod browser;
pub mod config;
pub mod console;
pub mod error;
pub mod idle_queue;
pub mod input_delay;
pub mod milestone;
pub mod paint;
pub mod perfume;
pub mod platform;
pub mod timing;
pub mod visibility;

pub use analytics::{AnalyticsTracker, CustomProperties, GoogleAnalytics, NoGoogleAnalytics};
pub use browser::BrowserInfo;
pub use config::{GoogleAnalyticsConfig, PerfumeConfig, PerfumeOptions};
pub use console::{format_metric_line, round_two_decimals, Console};
pub use error::PerfumeError;
pub use idle_queue::{IdleCallback, IdleDeadline, IdleQueue, Task, TaskScheduler};
pub use input_delay::{
    MilestoneCallback, MilestoneHook, MissingHook, FIRST_INPUT_DELAY_HOOK,
    TIME_TO_INTERACTIVE_HOOK,
};
pub use milestone::{Milestone, MilestoneObserver};
pub use paint::{MilestoneState, PaintObserver};
pub use perfume::Perfume;
pub use platform::Platform;
pub use timing::{
    EmulatedTiming, LegacyPaintTiming, MarkPhase, MetricEntry, NativeTiming, PaintCallback,
    PaintTiming, PerformanceBuffer, TimingBackend, Timestamp, WallClock,
};
pub use visibility::{LifecycleEvent, LifecycleListener, PageLifecycle, VisibilityTracker};
