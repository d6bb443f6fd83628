//! Idle-until-urgent task queue
//!
//! Logging and analytics work is pushed here so it never competes with the
//! work being measured. Tasks drain in FIFO order during idle windows granted
//! by the [`TaskScheduler`]. When the page is about to be hidden or unloaded,
//! [`IdleQueue::flush`] runs everything that is still pending synchronously.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use tracing::trace;

pub type Task = Box<dyn FnOnce()>;
pub type IdleCallback = Box<dyn FnOnce(&dyn IdleDeadline)>;

/// Budget of an idle window (`IdleDeadline` in the browser)
pub trait IdleDeadline {
    /// Milliseconds left in the current idle period
    fn time_remaining(&self) -> f64;

    fn did_timeout(&self) -> bool {
        false
    }
}

/// Host event-loop scheduling
pub trait TaskScheduler {
    /// Run `callback` during the next idle period
    fn request_idle(&self, callback: IdleCallback);

    /// Run `task` on the next macrotask (`setTimeout(fn, 0)`)
    fn set_timeout(&self, task: Task);
}

#[derive(Default)]
struct QueueState {
    tasks: VecDeque<Task>,
    idle_requested: bool,
}

/// FIFO queue of deferred tasks with a forced-flush escape hatch
#[derive(Clone)]
pub struct IdleQueue {
    state: Rc<RefCell<QueueState>>,
    scheduler: Rc<dyn TaskScheduler>,
    ensure_tasks_run: bool,
}

impl IdleQueue {
    /// `ensure_tasks_run` makes [`IdleQueue::on_page_teardown`] flush pending tasks
    pub fn new(scheduler: Rc<dyn TaskScheduler>, ensure_tasks_run: bool) -> Self {
        Self {
            state: Rc::new(RefCell::new(QueueState::default())),
            scheduler,
            ensure_tasks_run,
        }
    }

    pub fn push_task(&self, task: Task) {
        let needs_idle = {
            let mut state = self.state.borrow_mut();
            state.tasks.push_back(task);
            !std::mem::replace(&mut state.idle_requested, true)
        };
        if needs_idle {
            self.request_idle();
        }
    }

    pub fn has_pending_tasks(&self) -> bool {
        !self.state.borrow().tasks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.state.borrow().tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every pending task now, including tasks pushed while flushing
    pub fn flush(&self) {
        let mut ran = 0usize;
        while let Some(task) = self.pop() {
            task();
            ran += 1;
        }
        trace!("idle queue flushed {} tasks", ran);
    }

    /// Hidden/unload signal from the page lifecycle
    pub fn on_page_teardown(&self) {
        if self.ensure_tasks_run {
            self.flush();
        }
    }

    /// Drain tasks while the idle window lasts, then ask for another window
    /// if anything is left
    pub fn run_idle(&self, deadline: &dyn IdleDeadline) {
        while deadline.time_remaining() > 0.0 || deadline.did_timeout() {
            match self.pop() {
                Some(task) => task(),
                None => break,
            }
        }

        let more = {
            let mut state = self.state.borrow_mut();
            state.idle_requested = !state.tasks.is_empty();
            state.idle_requested
        };
        if more {
            self.request_idle();
        }
    }

    // The borrow is released before the task runs so tasks may push.
    fn pop(&self) -> Option<Task> {
        self.state.borrow_mut().tasks.pop_front()
    }

    fn request_idle(&self) {
        let queue = self.clone();
        self.scheduler
            .request_idle(Box::new(move |deadline| queue.run_idle(deadline)));
    }
}

impl fmt::Debug for IdleQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdleQueue")
            .field("pending", &self.len())
            .field("ensure_tasks_run", &self.ensure_tasks_run)
            .finish()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    struct Unlimited;

    impl IdleDeadline for Unlimited {
        fn time_remaining(&self) -> f64 {
            50.0
        }
    }

    #[derive(Default)]
    struct Deferred {
        idle: RefCell<Vec<IdleCallback>>,
    }

    impl TaskScheduler for Deferred {
        fn request_idle(&self, callback: IdleCallback) {
            self.idle.borrow_mut().push(callback);
        }

        fn set_timeout(&self, task: Task) {
            task();
        }
    }

    proptest! {
        /// Property: draining preserves push order, whether idle or flushed
        #[test]
        fn drain_preserves_push_order(values in prop::collection::vec(any::<u16>(), 0..40), flush in any::<bool>()) {
            let scheduler = Rc::new(Deferred::default());
            let queue = IdleQueue::new(scheduler.clone(), true);
            let seen = Rc::new(RefCell::new(Vec::new()));

            for value in &values {
                let seen = seen.clone();
                let value = *value;
                queue.push_task(Box::new(move || seen.borrow_mut().push(value)));
            }

            if flush {
                queue.on_page_teardown();
            } else {
                let callbacks: Vec<IdleCallback> = scheduler.idle.borrow_mut().drain(..).collect();
                for callback in callbacks {
                    callback(&Unlimited);
                }
            }

            prop_assert_eq!(&*seen.borrow(), &values);
            prop_assert!(queue.is_empty());
        }
    }
}
