//! Scenario tests for the tracker.
//!
//! - `harness.rs`     - Recorder observer and scripted tracker setup
//! - `admission.rs`   - validation, lifecycle gate, backpressure on `track()`
//! - `scheduling.rs`  - count, size and interval flush triggers, forced flush
//! - `delivery.rs`    - retry, backoff and failure reporting
//! - `concurrency.rs` - in-flight limits under load
//! - `lifecycle.rs`   - start, stop, drain and shutdown trigger
//! - `ordering.rs`    - per-stream FIFO delivery

mod admission;
mod concurrency;
mod delivery;
