//! Transport error types.
//!
//! Every delivery failure is reduced to an HTTP-style status plus a message
//! so the retry pipeline can classify it without knowing the transport.

use thiserror::Error;
use tracing::debug;

/// Message used when no HTTP response was received.
pub const CONNECTION_PROBLEM: &str = "Connection Problem";

/// How the retry pipeline should treat a failed send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Server-side or connection failure (5xx). Worth retrying.
    Retryable,
    /// Client-side failure (4xx or unexpected status). Retrying won't help.
    Permanent,
}

/// A failed send, classified by status code.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("transport error: {status} - {message}")]
pub struct TransportError {
    /// HTTP status code, or a synthetic one for non-HTTP failures.
    pub status: u16,
    /// Response body or failure description.
    pub message: String,
}

impl TransportError {
    /// Create an error with an explicit status.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// A request the caller got wrong; never retried.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    /// Connection-level failure, normalized to a retryable 500.
    pub fn connection_problem() -> Self {
        Self::new(500, CONNECTION_PROBLEM)
    }

    /// Classify the error for retry decisions.
    pub fn class(&self) -> ErrorClass {
        match self.status {
            500..=599 => ErrorClass::Retryable,
            _ => ErrorClass::Permanent,
        }
    }

    /// Shorthand for `class() == ErrorClass::Retryable`.
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }
}

/// A request that could not be built is the caller's fault. Anything that
/// fails on the wire (refused, reset, timed out, cut off mid-response) is a
/// connection problem and retryable.
impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            Self::bad_request(err.to_string())
        } else {
            debug!(error = %err, "Request failed before a response arrived");
            Self::connection_problem()
        }
    }
}

/// Result type alias using TransportError.
pub type TransportResult<T> = Result<T, TransportError>;
