//! Per-stream bounded backlog for buffered event delivery.
//!
//! This crate provides:
//! - Backlog: map of stream name to a bounded FIFO queue of events
//! - SizedEvent: byte-size estimate used by size-based flush thresholds

mod queue;
mod sized;

pub use queue::Backlog;
pub use sized::SizedEvent;
