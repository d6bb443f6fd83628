//! Engine configuration
//!
//! [`PerfumeOptions`] is what callers hand in (every field optional, camelCase
//! so a JS options object deserializes directly). [`PerfumeConfig`] is the
//! resolved record the engine reads; it never changes after construction.

use crate::analytics::AnalyticsTracker;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const DEFAULT_LOG_PREFIX: &str = "Perfume.js:";
pub const DEFAULT_TIMING_VAR: &str = "name";
/// Durations above this are treated as tab-suspension artifacts.
pub const DEFAULT_MAX_MEASURE_TIME: f64 = 15_000.0;

/// Google Analytics delivery settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GoogleAnalyticsConfig {
    pub enable: bool,
    /// Sent as the `timingVar` argument of `ga('send', 'timing', ...)`
    pub timing_var: String,
}

impl Default for GoogleAnalyticsConfig {
    fn default() -> Self {
        Self {
            enable: false,
            timing_var: DEFAULT_TIMING_VAR.to_string(),
        }
    }
}

/// Caller-supplied overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PerfumeOptions {
    pub first_contentful_paint: Option<bool>,
    pub first_paint: Option<bool>,
    pub first_input_delay: Option<bool>,
    pub time_to_interactive: Option<bool>,
    pub browser_tracker: Option<bool>,
    pub google_analytics: Option<GoogleAnalyticsConfig>,
    pub log_prefix: Option<String>,
    pub logging: Option<bool>,
    pub max_measure_time: Option<f64>,
    pub warning: Option<bool>,
    pub debugging: Option<bool>,
}

/// Resolved engine configuration
#[derive(Clone)]
pub struct PerfumeConfig {
    pub first_contentful_paint: bool,
    pub first_paint: bool,
    pub first_input_delay: bool,
    pub time_to_interactive: bool,
    pub analytics_tracker: Option<AnalyticsTracker>,
    pub browser_tracker: bool,
    pub google_analytics: GoogleAnalyticsConfig,
    pub log_prefix: String,
    pub logging: bool,
    pub max_measure_time: f64,
    pub warning: bool,
    pub debugging: bool,
}

impl Default for PerfumeConfig {
    fn default() -> Self {
        Self {
            first_contentful_paint: false,
            first_paint: false,
            first_input_delay: false,
            time_to_interactive: false,
            analytics_tracker: None,
            browser_tracker: false,
            google_analytics: GoogleAnalyticsConfig::default(),
            log_prefix: DEFAULT_LOG_PREFIX.to_string(),
            logging: true,
            max_measure_time: DEFAULT_MAX_MEASURE_TIME,
            warning: false,
            debugging: false,
        }
    }
}

impl PerfumeConfig {
    /// Merge caller options over the defaults
    pub fn from_options(options: PerfumeOptions) -> Self {
        let defaults = Self::default();
        Self {
            first_contentful_paint: options
                .first_contentful_paint
                .unwrap_or(defaults.first_contentful_paint),
            first_paint: options.first_paint.unwrap_or(defaults.first_paint),
            first_input_delay: options
                .first_input_delay
                .unwrap_or(defaults.first_input_delay),
            time_to_interactive: options
                .time_to_interactive
                .unwrap_or(defaults.time_to_interactive),
            analytics_tracker: None,
            browser_tracker: options.browser_tracker.unwrap_or(defaults.browser_tracker),
            google_analytics: options
                .google_analytics
                .unwrap_or(defaults.google_analytics),
            log_prefix: options.log_prefix.unwrap_or(defaults.log_prefix),
            logging: options.logging.unwrap_or(defaults.logging),
            max_measure_time: options
                .max_measure_time
                .unwrap_or(defaults.max_measure_time),
            warning: options.warning.unwrap_or(defaults.warning),
            debugging: options.debugging.unwrap_or(defaults.debugging),
        }
    }

    /// Parse a JSON options document and merge it over the defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let options: PerfumeOptions = serde_json::from_str(json)?;
        Ok(Self::from_options(options))
    }

    pub fn with_analytics_tracker(mut self, tracker: AnalyticsTracker) -> Self {
        self.analytics_tracker = Some(tracker);
        self
    }

    /// Whether any paint milestone needs the paint observer
    pub fn observes_paint(&self) -> bool {
        self.first_paint || self.first_contentful_paint
    }
}

impl fmt::Debug for PerfumeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerfumeConfig")
            .field("first_contentful_paint", &self.first_contentful_paint)
            .field("first_paint", &self.first_paint)
            .field("first_input_delay", &self.first_input_delay)
            .field("time_to_interactive", &self.time_to_interactive)
            .field("analytics_tracker", &self.analytics_tracker.is_some())
            .field("browser_tracker", &self.browser_tracker)
            .field("google_analytics", &self.google_analytics)
            .field("log_prefix", &self.log_prefix)
            .field("logging", &self.logging)
            .field("max_measure_time", &self.max_measure_time)
            .field("warning", &self.warning)
            .field("debugging", &self.debugging)
            .finish()
    }
}

impl From<PerfumeOptions> for PerfumeConfig {
    fn from(options: PerfumeOptions) -> Self {
        Self::from_options(options)
    }
}
