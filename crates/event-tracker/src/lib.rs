//! # Event Tracker
//!
//! Buffers events per stream and delivers them to a [`Transport`] in
//! batches, with bounded memory, bounded concurrency and retry.
//!
//! ## Architecture
//!
//! ```text
//! track() ──admission──▶ ┌──────────┐   scheduler pass    ┌───────────┐
//!   (waits when full)    │ Backlog  │ ──(count/size/age)─▶│  deliver  │──▶ Transport
//!                        │ per      │                     │  + retry  │
//! flush() ──────────────▶│ stream   │ ──(forced)─────────▶│           │
//!                        └──────────┘                     └─────┬─────┘
//!                                                               │ dropped
//!                                                               ▼
//!                                                        TrackerObserver
//! ```
//!
//! ## Guarantees
//!
//! - Per-stream FIFO: events reach the transport in the order they were
//!   tracked within a stream. No ordering across streams. A stream has at
//!   most one batch in flight, so a retried batch is never overtaken.
//! - Bounded memory: each stream holds at most `backlog_size` events;
//!   `track()` waits (or times out) instead of growing the queue.
//! - Bounded concurrency: at most `max_in_flight` sends are outstanding.
//! - Bounded retry: 5xx and connection failures are retried with capped
//!   exponential backoff; 4xx failures are not. A batch that fails for
//!   good is reported to observers and then forgotten.
//! - Graceful drain: `stop()` resolves only once the backlog is empty and
//!   nothing is in flight.
//!
//! ## Example
//!
//! ```ignore
//! use delivery_transport::{HttpTransport, TransportConfig};
//! use event_tracker::{Tracker, TrackerConfig};
//!
//! let transport = HttpTransport::new(TransportConfig::default())?;
//! let tracker = Tracker::builder(transport)
//!     .config(TrackerConfig::default())
//!     .on_error(|failure| eprintln!("dropped {} events", failure.batch.len()))
//!     .build();
//!
//! tracker.start();
//! tracker.track("clicks", serde_json::json!({"id": 1})).await?;
//! tracker.stop().await;
//! ```

mod config;
mod error;
mod lifecycle;
mod observer;
mod retry;
mod scheduler;
mod shutdown;
mod tracker;

#[cfg(test)]
mod tests;

pub use config::{
    RetryOptions, TrackerConfig, ADMISSION_POLL_INTERVAL, BULK_LEN_LIMIT, BULK_SIZE_LIMIT,
    BULK_SIZE_MIN, FLUSH_INTERVAL_MIN_MS, SCHEDULER_TICK,
};
pub use error::{DeliveryError, DeliveryFailure, TrackerError, TrackerResult};
pub use lifecycle::LifecycleState;
pub use observer::{RetryNotice, TrackerObserver};
pub use retry::{RetryDecision, RetryPolicy, RetryState};
pub use scheduler::should_flush;
pub use shutdown::ShutdownTrigger;
pub use tracker::{SendOutcome, Tracker, TrackerBuilder};

pub use delivery_transport::{Batch, ResponseMeta, Transport, TransportError};
