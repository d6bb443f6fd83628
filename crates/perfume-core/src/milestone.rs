//! One-shot platform milestones and their eventual values

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Milestone {
    FirstPaint,
    FirstContentfulPaint,
    FirstInputDelay,
    TimeToInteractive,
}

impl Milestone {
    /// Label used in console lines
    pub fn log_text(&self) -> &'static str {
        match self {
            Milestone::FirstPaint => "First Paint",
            Milestone::FirstContentfulPaint => "First Contentful Paint",
            Milestone::FirstInputDelay => "First Input Delay",
            Milestone::TimeToInteractive => "Time to Interactive",
        }
    }

    /// Metric name handed to analytics
    pub fn metric_name(&self) -> &'static str {
        match self {
            Milestone::FirstPaint => "firstPaint",
            Milestone::FirstContentfulPaint => "firstContentfulPaint",
            Milestone::FirstInputDelay => "firstInputDelay",
            Milestone::TimeToInteractive => "timeToInteractive",
        }
    }
}

/// Eventual value of a milestone. Cloneable; every clone sees the same value.
///
/// Resolves to `None` if the engine is dropped before the milestone fires.
#[derive(Clone)]
pub struct MilestoneObserver {
    inner: Shared<oneshot::Receiver<f64>>,
}

impl MilestoneObserver {
    /// A pending observer and the sender that fulfils it
    pub fn pending() -> (oneshot::Sender<f64>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { inner: rx.shared() })
    }

    /// The value, if already resolved
    pub fn peek(&self) -> Option<f64> {
        self.inner.peek().and_then(|result| result.as_ref().ok().copied())
    }
}

impl Future for MilestoneObserver {
    type Output = Option<f64>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.inner).poll(cx).map(Result::ok)
    }
}

impl std::fmt::Debug for MilestoneObserver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MilestoneObserver")
            .field("value", &self.peek())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn test_observer_resolves_for_every_clone() {
        let (tx, observer) = MilestoneObserver::pending();
        let other = observer.clone();
        assert_eq!(observer.peek(), None);

        tx.send(812.4).unwrap();
        assert_eq!(block_on(observer.clone()), Some(812.4));
        assert_eq!(block_on(other), Some(812.4));
        assert_eq!(observer.peek(), Some(812.4));
    }

    #[test]
    fn test_dropped_sender_resolves_none() {
        let (tx, observer) = MilestoneObserver::pending();
        drop(tx);
        assert_eq!(block_on(observer), None);
    }

    #[test]
    fn test_names() {
        assert_eq!(Milestone::FirstContentfulPaint.metric_name(), "firstContentfulPaint");
        assert_eq!(Milestone::FirstInputDelay.log_text(), "First Input Delay");
    }
}
