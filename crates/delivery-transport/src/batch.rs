//! Batch and response types shared by every transport.

use serde::{Deserialize, Serialize};

/// An ordered group of events bound for one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch<E> {
    /// Destination stream name.
    pub stream: String,
    /// Events in the order they were tracked.
    pub data: Vec<E>,
}

impl<E> Batch<E> {
    pub fn new(stream: impl Into<String>, data: Vec<E>) -> Self {
        Self {
            stream: stream.into(),
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Result of a successful send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMeta {
    /// HTTP status code (2xx).
    pub status: u16,
    /// Response body.
    pub message: String,
}

impl ResponseMeta {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// A plain 200 response.
    pub fn ok(message: impl Into<String>) -> Self {
        Self::new(200, message)
    }
}
