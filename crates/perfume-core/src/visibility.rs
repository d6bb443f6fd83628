//! Page visibility gate
//!
//! Timings taken while the page is backgrounded are not trustworthy, so the
//! first transition to hidden latches a flag that suppresses logging and
//! analytics. Only a fresh `start()` clears it.

use std::cell::Cell;
use std::rc::Rc;

/// Page lifecycle transitions the engine reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Hidden,
    Visible,
    /// The page is being unloaded (`pagehide` / `beforeunload`)
    Unloading,
}

impl LifecycleEvent {
    /// Whether queued work must run now or be lost
    pub fn is_teardown(&self) -> bool {
        matches!(self, LifecycleEvent::Hidden | LifecycleEvent::Unloading)
    }
}

pub type LifecycleListener = Box<dyn FnMut(LifecycleEvent)>;

/// Source of page lifecycle notifications
pub trait PageLifecycle {
    /// Register `listener`; returns `false` when the platform has no
    /// visibility notifications at all
    fn subscribe(&self, listener: LifecycleListener) -> bool;
}

/// Latched hidden flag, owned by one engine instance
#[derive(Debug, Clone, Default)]
pub struct VisibilityTracker {
    hidden: Rc<Cell<bool>>,
}

impl VisibilityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden.get()
    }

    /// Listener path: only ever sets the flag
    pub fn on_event(&self, event: LifecycleEvent) {
        if event == LifecycleEvent::Hidden {
            self.hidden.set(true);
        }
    }

    /// A new foreground measurement starts
    pub fn reset(&self) {
        self.hidden.set(false);
    }
}
