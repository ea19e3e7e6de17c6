//! Hooks for delivery outcomes and lifecycle events.

use crate::DeliveryFailure;
use delivery_transport::TransportError;
use std::time::Duration;
use uuid::Uuid;

/// A failed attempt that is about to be retried.
#[derive(Debug, Clone)]
pub struct RetryNotice {
    pub stream: String,
    /// Identifies the batch across its attempts.
    pub batch_id: Uuid,
    /// The attempt that just failed, starting at 1.
    pub attempt: u32,
    /// Wait before the next attempt.
    pub delay: Duration,
    pub error: TransportError,
}

/// Receives tracker notifications.
///
/// All methods default to no-ops. They are called from tracker tasks and
/// must not block.
pub trait TrackerObserver<E>: Send + Sync {
    /// A batch was dropped after a permanent error or exhausted retries.
    fn on_delivery_failed(&self, _failure: &DeliveryFailure<E>) {}

    /// A send attempt failed and will be retried.
    fn on_retry(&self, _notice: &RetryNotice) {}

    /// A take left the stream's queue empty.
    fn on_stream_emptied(&self, _stream: &str) {}

    /// `stop()` finished draining.
    fn on_stopped(&self) {}

    /// Whether this observer handles delivery failures.
    ///
    /// When no registered observer does, failures are logged instead.
    fn handles_failures(&self) -> bool {
        false
    }
}

/// Adapts a closure into a failure observer.
pub(crate) struct FailureFn<F>(pub(crate) F);

impl<E, F> TrackerObserver<E> for FailureFn<F>
where
    F: Fn(&DeliveryFailure<E>) + Send + Sync,
{
    fn on_delivery_failed(&self, failure: &DeliveryFailure<E>) {
        (self.0)(failure)
    }

    fn handles_failures(&self) -> bool {
        true
    }
}
