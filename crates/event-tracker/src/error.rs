//! Error types for the event tracker.

use crate::LifecycleState;
use delivery_transport::{Batch, TransportError};
use std::time::Duration;
use thiserror::Error;

/// Errors returned to callers of [`crate::Tracker`].
#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("tracker is not running (state: {0})")]
    NotRunning(LifecycleState),

    #[error("tracking timeout on stream {stream} after {waited:?}")]
    TrackingTimeout { stream: String, waited: Duration },
}

impl TrackerError {
    /// Whether the call was rejected before any admission attempt.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NotRunning(_))
    }
}

/// Terminal failure of a batch send.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// Collector rejected the batch (4xx or unexpected status).
    #[error("permanent delivery failure: {error}")]
    Permanent { attempts: u32, error: TransportError },

    /// Retryable failures persisted past the retry budget.
    #[error("retries exhausted after {attempts} attempts: {last_error}")]
    RetryExhausted {
        attempts: u32,
        last_error: TransportError,
    },
}

impl DeliveryError {
    /// The transport error that ended the send.
    pub fn transport_error(&self) -> &TransportError {
        match self {
            Self::Permanent { error, .. } => error,
            Self::RetryExhausted { last_error, .. } => last_error,
        }
    }

    /// Number of transport calls made for the batch.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Permanent { attempts, .. } | Self::RetryExhausted { attempts, .. } => *attempts,
        }
    }

    /// HTTP-style status of the final failure.
    pub fn status(&self) -> u16 {
        self.transport_error().status
    }
}

/// A dropped batch together with the reason it was dropped.
///
/// The tracker forgets the batch after reporting it; observers that want
/// to replay it must keep it themselves.
#[derive(Debug, Clone)]
pub struct DeliveryFailure<E> {
    pub error: DeliveryError,
    pub batch: Batch<E>,
}

/// Result type alias for tracker operations.
pub type TrackerResult<T> = Result<T, TrackerError>;
