//! In-memory transport with scripted outcomes.
//!
//! Used by tests and the CLI's dry-run mode. Every call is recorded and
//! concurrency is tracked so callers can assert on in-flight limits.

use crate::{Batch, ResponseMeta, Transport, TransportError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

type Outcome = Result<ResponseMeta, TransportError>;

/// Transport that replays a queue of outcomes, then a fallback outcome.
pub struct ScriptedTransport<E> {
    script: Mutex<VecDeque<Outcome>>,
    fallback: Outcome,
    received: Mutex<Vec<Batch<E>>>,
    accepted: Mutex<Vec<Batch<E>>>,
    hold: Duration,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl<E> ScriptedTransport<E> {
    fn with_fallback(fallback: Outcome) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback,
            received: Mutex::new(Vec::new()),
            accepted: Mutex::new(Vec::new()),
            hold: Duration::ZERO,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Accept every batch with a 200.
    pub fn succeeding() -> Self {
        Self::with_fallback(Ok(ResponseMeta::ok("ok")))
    }

    /// Reject every batch with the given status.
    pub fn failing(status: u16) -> Self {
        Self::with_fallback(Err(TransportError::new(status, "scripted failure")))
    }

    /// Queue `times` failures with `status` ahead of the fallback.
    pub fn then_fail(self, status: u16, times: usize) -> Self {
        {
            let mut script = self.script.lock();
            for _ in 0..times {
                script.push_back(Err(TransportError::new(status, "scripted failure")));
            }
        }
        self
    }

    /// Queue one explicit outcome ahead of the fallback.
    pub fn then(self, outcome: Outcome) -> Self {
        self.script.lock().push_back(outcome);
        self
    }

    /// Hold each call for `hold` before answering.
    pub fn with_hold(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    /// Number of `post` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls currently in progress.
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneous calls observed.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn next_outcome(&self) -> Outcome {
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

impl<E: Clone> ScriptedTransport<E> {
    /// Every batch received, in call order (retries included).
    pub fn batches(&self) -> Vec<Batch<E>> {
        self.received.lock().clone()
    }

    /// Batches answered with success, in completion order.
    pub fn accepted(&self) -> Vec<Batch<E>> {
        self.accepted.lock().clone()
    }
}

struct ActiveGuard<'a>(&'a AtomicUsize);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl<E> Transport<E> for ScriptedTransport<E>
where
    E: Clone + Send + Sync + 'static,
{
    async fn post(&self, batch: &Batch<E>) -> Result<ResponseMeta, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let _guard = ActiveGuard(&self.active);

        self.received.lock().push(batch.clone());

        if !self.hold.is_zero() {
            tokio::time::sleep(self.hold).await;
        }

        let outcome = self.next_outcome();
        if outcome.is_ok() {
            self.accepted.lock().push(batch.clone());
        }
        outcome
    }
}
