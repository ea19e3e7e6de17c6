//! Delivery transport for the stream tracker.
//!
//! A [`Transport`] sends one [`Batch`] per call and reports failures as a
//! [`TransportError`] carrying an HTTP-style status. The tracker classifies
//! those errors to decide whether to retry.
//!
//! Two implementations ship with the crate:
//! - [`HttpTransport`]: signed bulk POSTs to a collector, plus one-shot
//!   single-event sends and a health probe
//! - [`ScriptedTransport`]: in-memory replay of scripted outcomes

mod batch;
mod error;
mod http;
mod scripted;
mod signing;
mod transport;

pub use batch::{Batch, ResponseMeta};
pub use error::{ErrorClass, TransportError, TransportResult, CONNECTION_PROBLEM};
pub use http::{HttpTransport, Method, TransportConfig, DEFAULT_ENDPOINT};
pub use scripted::ScriptedTransport;
pub use signing::sign_payload;
pub use transport::Transport;
