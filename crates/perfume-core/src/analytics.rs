//! Analytics delivery targets

use crate::browser::BrowserInfo;
use crate::error::PerfumeError;
use std::rc::Rc;

/// Free-form properties attached to a measurement
pub type CustomProperties = serde_json::Map<String, serde_json::Value>;

/// Custom analytics callback: `(metric_name, duration, browser, custom_properties)`
pub type AnalyticsTracker =
    Rc<dyn Fn(&str, f64, Option<&BrowserInfo>, Option<&CustomProperties>)>;

/// The page's global `ga()` function
pub trait GoogleAnalytics {
    /// `ga('send', 'timing', category, timing_var, value)`.
    /// `Err(AnalyticsUnavailable)` when the global is not loaded.
    fn send_timing(&self, category: &str, timing_var: &str, value: i64)
        -> Result<(), PerfumeError>;
}

/// Target for platforms where `ga` never exists
#[derive(Debug, Clone, Copy, Default)]
pub struct NoGoogleAnalytics;

impl GoogleAnalytics for NoGoogleAnalytics {
    fn send_timing(&self, _: &str, _: &str, _: i64) -> Result<(), PerfumeError> {
        Err(PerfumeError::AnalyticsUnavailable)
    }
}
