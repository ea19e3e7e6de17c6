//! Byte-size estimation for backlog entries.

/// An event that can report its approximate serialized size.
///
/// The backlog keeps a running byte total per stream so that size-based
/// flush thresholds can be evaluated without re-serializing the queue.
pub trait SizedEvent {
    /// Estimated size of the event on the wire, in bytes.
    fn size_bytes(&self) -> usize;
}

impl SizedEvent for String {
    fn size_bytes(&self) -> usize {
        self.len()
    }
}

impl SizedEvent for Vec<u8> {
    fn size_bytes(&self) -> usize {
        self.len()
    }
}

impl SizedEvent for serde_json::Value {
    fn size_bytes(&self) -> usize {
        serde_json::to_vec(self).map(|bytes| bytes.len()).unwrap_or(0)
    }
}
