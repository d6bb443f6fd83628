//! External milestone hooks
//!
//! First Input Delay and Time to Interactive are detected by polyfills
//! outside the engine (`perfMetrics.onFirstInputDelay`,
//! `ttiPolyfill.getFirstConsistentlyInteractive`). The engine registers one
//! callback with each and forwards whatever the hook reports. "First"
//! semantics belong to the hook; nothing is deduplicated here.

use crate::error::PerfumeError;

pub const FIRST_INPUT_DELAY_HOOK: &str = "First Input Delay polyfill";
pub const TIME_TO_INTERACTIVE_HOOK: &str = "Time to Interactive polyfill";

pub type MilestoneCallback = Box<dyn FnMut(f64)>;

pub trait MilestoneHook {
    /// Register the callback; `Err` when the polyfill is not loaded
    fn subscribe(&self, callback: MilestoneCallback) -> Result<(), PerfumeError>;
}

/// Hook that never fires, for platforms without the polyfill
#[derive(Debug, Clone, Copy, Default)]
pub struct MissingHook {
    pub name: &'static str,
}

impl MilestoneHook for MissingHook {
    fn subscribe(&self, _callback: MilestoneCallback) -> Result<(), PerfumeError> {
        Err(PerfumeError::HookUnavailable { hook: self.name })
    }
}
