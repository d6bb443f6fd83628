use thiserror::Error;

/// Failures the engine reports as warnings.
///
/// None of these abort the host application: the public operations turn an
/// `Err` into a console warning (when enabled) and a no-op.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PerfumeError {
    #[error("Please provide a metric name")]
    MissingMetricName,

    #[error("Recording already started.")]
    AlreadyStarted { metric: String },

    #[error("Recording already stopped.")]
    NotStarted { metric: String },

    #[error("Google Analytics has not been loaded")]
    AnalyticsUnavailable,

    #[error("initFirstPaint failed: {0}")]
    PaintObserverFailed(String),

    #[error("{hook} has not been loaded")]
    HookUnavailable { hook: &'static str },

    #[error("Platform call failed: {0}")]
    Platform(String),
}
