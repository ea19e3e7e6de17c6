//! The tracker: admission, dispatch, retry and drain.

use crate::config::{TrackerConfig, ADMISSION_POLL_INTERVAL};
use crate::observer::{FailureFn, RetryNotice, TrackerObserver};
use crate::retry::{RetryPolicy, RetryState};
use crate::{scheduler, DeliveryError, DeliveryFailure, LifecycleState, TrackerError, TrackerResult};
use delivery_transport::{Batch, ResponseMeta, Transport};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use stream_backlog::{Backlog, SizedEvent};
use tokio::sync::{
    oneshot, watch, Mutex as AsyncMutex, Notify, OwnedMutexGuard, OwnedSemaphorePermit, Semaphore,
};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Outcome of one dispatched batch.
pub type SendOutcome = Result<ResponseMeta, DeliveryError>;

/// Held by the one send a stream may have outstanding.
type Lane = Arc<AsyncMutex<()>>;

/// Backlog entry: the event plus its serialized size, computed once.
struct QueuedEvent<E> {
    event: E,
    size: usize,
}

impl<E> SizedEvent for QueuedEvent<E> {
    fn size_bytes(&self) -> usize {
        self.size
    }
}

struct SchedulerHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

pub(crate) struct TrackerInner<E> {
    config: TrackerConfig,
    backlog: Backlog<QueuedEvent<E>>,
    transport: Arc<dyn Transport<E>>,
    retry: RetryPolicy,
    /// One permit per outstanding send.
    permits: Arc<Semaphore>,
    /// Per-stream send lanes. A batch keeps its stream's lane until it is
    /// delivered or dropped, so later batches cannot overtake it.
    lanes: Mutex<HashMap<String, Lane>>,
    state: watch::Sender<LifecycleState>,
    /// Time of the last dispatched send, shared by all streams.
    last_flush: Mutex<Instant>,
    pub(crate) nudge: Arc<Notify>,
    scheduler: Mutex<Option<SchedulerHandle>>,
    observers: Vec<Arc<dyn TrackerObserver<E>>>,
    log_failures: bool,
}

/// Buffers events per stream and delivers them in batches.
///
/// Cloning is cheap; clones share the same backlog and lifecycle.
pub struct Tracker<E> {
    inner: Arc<TrackerInner<E>>,
}

impl<E> Clone for Tracker<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Builder for [`Tracker`].
pub struct TrackerBuilder<E> {
    transport: Arc<dyn Transport<E>>,
    config: TrackerConfig,
    observers: Vec<Arc<dyn TrackerObserver<E>>>,
}

impl<E> TrackerBuilder<E>
where
    E: Serialize + Send + Sync + 'static,
{
    pub fn config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn TrackerObserver<E>>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Register a closure called for every dropped batch.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&DeliveryFailure<E>) + Send + Sync + 'static,
    {
        self.observers.push(Arc::new(FailureFn(f)));
        self
    }

    /// Build a stopped tracker. Invalid config values are replaced with defaults.
    pub fn build(self) -> Tracker<E> {
        let config = self.config.validated();
        let log_failures = !self.observers.iter().any(|o| o.handles_failures());
        let (state, _) = watch::channel(LifecycleState::Stopped);

        Tracker {
            inner: Arc::new(TrackerInner {
                backlog: Backlog::new(config.backlog_size),
                retry: RetryPolicy::new(config.retry.clone()),
                permits: Arc::new(Semaphore::new(config.max_in_flight)),
                lanes: Mutex::new(HashMap::new()),
                transport: self.transport,
                state,
                last_flush: Mutex::new(Instant::now()),
                nudge: Arc::new(Notify::new()),
                scheduler: Mutex::new(None),
                observers: self.observers,
                log_failures,
                config,
            }),
        }
    }
}

impl<E> Tracker<E>
where
    E: Serialize + Send + Sync + 'static,
{
    pub fn builder<T>(transport: T) -> TrackerBuilder<E>
    where
        T: Transport<E> + 'static,
    {
        TrackerBuilder {
            transport: Arc::new(transport),
            config: TrackerConfig::default(),
            observers: Vec::new(),
        }
    }

    /// Create a stopped tracker with the given config and no observers.
    pub fn new<T>(transport: T, config: TrackerConfig) -> Self
    where
        T: Transport<E> + 'static,
    {
        Self::builder(transport).config(config).build()
    }

    /// Effective (validated) configuration.
    pub fn config(&self) -> &TrackerConfig {
        &self.inner.config
    }

    pub fn state(&self) -> LifecycleState {
        *self.inner.state.borrow()
    }

    /// Number of sends currently outstanding.
    pub fn in_flight(&self) -> usize {
        self.inner.config.max_in_flight - self.inner.permits.available_permits()
    }

    pub fn backlog_len(&self, stream: &str) -> usize {
        self.inner.backlog.len(stream)
    }

    /// Names of every stream seen so far.
    pub fn streams(&self) -> Vec<String> {
        self.inner.backlog.keys()
    }

    /// Start the scheduler. No-op unless stopped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut previous = LifecycleState::Stopped;
        let started = self.inner.state.send_if_modified(|state| {
            previous = *state;
            if *state == LifecycleState::Stopped {
                *state = LifecycleState::Running;
                true
            } else {
                false
            }
        });

        if !started {
            if previous == LifecycleState::Draining {
                warn!("start() called while draining, ignoring");
            } else {
                debug!("Tracker already running");
            }
            return;
        }

        *self.inner.last_flush.lock() = Instant::now();

        let (stop, stop_rx) = oneshot::channel();
        let task = tokio::spawn(scheduler::run(Arc::downgrade(&self.inner), stop_rx));
        *self.inner.scheduler.lock() = Some(SchedulerHandle { stop, task });

        info!(
            bulk_len = self.inner.config.bulk_len,
            flush_interval_ms = self.inner.config.flush_interval_ms,
            max_in_flight = self.inner.config.max_in_flight,
            "Tracker started"
        );
    }

    /// Queue an event for delivery.
    ///
    /// Waits while the stream's queue is full or every in-flight slot is
    /// taken. In non-blocking mode the wait is bounded by the tracking
    /// timeout.
    pub async fn track(&self, stream: &str, event: E) -> TrackerResult<()> {
        if stream.is_empty() {
            return Err(TrackerError::Validation("stream is required".into()));
        }
        let size = event_size(&event)?;
        self.ensure_running()?;

        let config = &self.inner.config;
        let started = Instant::now();
        let mut queued = QueuedEvent { event, size };

        loop {
            if self.inner.permits.available_permits() > 0 {
                match self.inner.backlog.add(stream, queued) {
                    Ok(()) => {
                        self.inner.nudge.notify_one();
                        return Ok(());
                    }
                    Err(rejected) => queued = rejected,
                }
            }

            let waited = started.elapsed();
            let wait = if config.is_blocking {
                ADMISSION_POLL_INTERVAL
            } else {
                let timeout = config.tracking_timeout();
                if waited >= timeout {
                    debug!(stream = %stream, ?waited, "Admission timed out");
                    return Err(TrackerError::TrackingTimeout {
                        stream: stream.to_string(),
                        waited,
                    });
                }
                ADMISSION_POLL_INTERVAL.min(timeout - waited)
            };

            sleep(wait).await;
            self.ensure_running()?;
        }
    }

    /// Force-flush one stream, or every stream when `stream` is `None`.
    ///
    /// Drains the events queued at call time in `bulk_len`-sized batches,
    /// waiting for in-flight slots as needed, and returns once every
    /// dispatched batch has succeeded or been dropped. Streams drain in
    /// parallel; batches of one stream go out one after another.
    pub async fn flush(&self, stream: Option<&str>) -> Vec<SendOutcome> {
        let streams = match stream {
            Some(stream) => vec![stream.to_string()],
            None => self.inner.backlog.keys(),
        };

        let handles: Vec<_> = streams
            .into_iter()
            .filter_map(|stream| {
                let remaining = self.inner.backlog.len(&stream);
                (remaining > 0).then(|| self.inner.drain_stream(stream, remaining))
            })
            .collect();

        let outcomes: Vec<SendOutcome> = join_all(handles).await.into_iter().flatten().collect();
        debug!(batches = outcomes.len(), "Flush finished");
        outcomes
    }

    /// Send a batch directly, bypassing the backlog.
    ///
    /// Takes an in-flight slot (waiting if none is free) and runs the full
    /// retry loop. Failures are reported to observers as well as returned.
    pub async fn send(&self, stream: &str, data: Vec<E>) -> SendOutcome {
        let permit = self.inner.acquire_permit().await;
        self.inner.deliver(Batch::new(stream, data), permit).await
    }

    /// Stop scheduling and drain.
    ///
    /// Flushes every stream and waits for all outstanding sends. Concurrent
    /// and repeated calls wait for the same drain to finish.
    pub async fn stop(&self) {
        let draining = self.inner.state.send_if_modified(|state| {
            if *state == LifecycleState::Running {
                *state = LifecycleState::Draining;
                true
            } else {
                false
            }
        });

        if !draining {
            self.wait_stopped().await;
            return;
        }

        info!(queued = self.inner.backlog.total_len(), "Draining tracker");
        self.stop_scheduler().await;

        let max = u32::try_from(self.inner.config.max_in_flight).unwrap_or(u32::MAX);
        loop {
            let outcomes = self.flush(None).await;
            let failed = outcomes.iter().filter(|o| o.is_err()).count();
            if !outcomes.is_empty() {
                debug!(batches = outcomes.len(), failed, "Drain flush finished");
            }

            // Holding every permit means nothing is in flight
            let all = self
                .inner
                .permits
                .acquire_many(max)
                .await
                .expect("in-flight semaphore is never closed");
            if self.inner.backlog.all_empty() {
                drop(all);
                break;
            }
            drop(all);
        }

        self.inner.state.send_replace(LifecycleState::Stopped);
        info!("Tracker stopped");

        for observer in &self.inner.observers {
            observer.on_stopped();
        }
    }

    /// Resolve once the tracker is stopped.
    pub async fn wait_stopped(&self) {
        let mut rx = self.inner.state.subscribe();
        // Sender lives in `inner`, which we hold, so this cannot fail
        let _ = rx.wait_for(|state| *state == LifecycleState::Stopped).await;
    }

    /// A handle the host can fire to stop this tracker.
    pub fn shutdown_trigger(&self) -> crate::ShutdownTrigger<E> {
        crate::ShutdownTrigger::new(self.clone())
    }

    fn ensure_running(&self) -> TrackerResult<()> {
        match self.state() {
            LifecycleState::Running => Ok(()),
            other => Err(TrackerError::NotRunning(other)),
        }
    }

    async fn stop_scheduler(&self) {
        let handle = self.inner.scheduler.lock().take();
        if let Some(handle) = handle {
            let _ = handle.stop.send(());
            if let Err(e) = handle.task.await {
                error!(error = %e, "Scheduler task failed");
            }
        }
    }
}

impl<E> TrackerInner<E>
where
    E: Serialize + Send + Sync + 'static,
{
    /// Evaluate every stream once and dispatch the ones due for a flush.
    ///
    /// Returns the number of sends launched.
    pub(crate) fn schedule_pass(self: &Arc<Self>) -> usize {
        let elapsed = self.last_flush.lock().elapsed();
        let mut launched = 0;

        for stream in self.backlog.keys() {
            if launched >= self.config.concurrency {
                break;
            }

            let (len, bytes) = self.backlog.stats(&stream);
            if !scheduler::should_flush(len, bytes, elapsed, &self.config) {
                continue;
            }

            // A send for this stream is still outstanding
            let Ok(lane) = self.lane(&stream).try_lock_owned() else {
                continue;
            };

            let Ok(permit) = self.permits.clone().try_acquire_owned() else {
                // Saturated; remaining streams wait for the next pass
                break;
            };

            let batch = self.take_batch(&stream);
            if batch.is_empty() {
                continue;
            }
            self.dispatch(batch, permit, lane);
            launched += 1;
        }

        launched
    }

    fn lane(&self, stream: &str) -> Lane {
        self.lanes
            .lock()
            .entry(stream.to_string())
            .or_default()
            .clone()
    }

    async fn acquire_permit(&self) -> OwnedSemaphorePermit {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .expect("in-flight semaphore is never closed")
    }

    fn take_batch(&self, stream: &str) -> Batch<E> {
        let events = self.backlog.take(stream, Some(self.config.bulk_len));
        if !events.is_empty() && self.backlog.is_empty(stream) {
            for observer in &self.observers {
                observer.on_stream_emptied(stream);
            }
        }
        Batch::new(stream, events.into_iter().map(|q| q.event).collect())
    }

    fn dispatch(
        self: &Arc<Self>,
        batch: Batch<E>,
        permit: OwnedSemaphorePermit,
        lane: OwnedMutexGuard<()>,
    ) {
        let inner = self.clone();
        tokio::spawn(async move {
            // Failures are reported to observers inside `deliver`
            let _ = inner.deliver(batch, permit).await;
            drop(lane);
        });
    }

    /// Send up to `remaining` queued events of one stream, one batch at a time.
    fn drain_stream(
        self: &Arc<Self>,
        stream: String,
        mut remaining: usize,
    ) -> JoinHandle<Vec<SendOutcome>> {
        let inner = self.clone();
        tokio::spawn(async move {
            let mut outcomes = Vec::new();
            while remaining > 0 {
                let lane = inner.lane(&stream).lock_owned().await;
                let permit = inner.acquire_permit().await;
                let batch = inner.take_batch(&stream);
                if batch.is_empty() {
                    break;
                }
                remaining = remaining.saturating_sub(batch.len());
                outcomes.push(inner.deliver(batch, permit).await);
                drop(lane);
            }
            outcomes
        })
    }

    /// Send a batch with retries, holding `permit` until the send terminates.
    async fn deliver(&self, batch: Batch<E>, permit: OwnedSemaphorePermit) -> SendOutcome {
        *self.last_flush.lock() = Instant::now();

        let batch_id = Uuid::new_v4();
        let mut state = RetryState::new();

        debug!(
            stream = %batch.stream,
            batch_id = %batch_id,
            events = batch.len(),
            "Sending batch"
        );

        let error = loop {
            let error = match self.transport.post(&batch).await {
                Ok(meta) => {
                    debug!(
                        stream = %batch.stream,
                        batch_id = %batch_id,
                        attempt = state.attempt,
                        status = meta.status,
                        "Batch delivered"
                    );
                    return Ok(meta);
                }
                Err(error) => error,
            };

            let attempt = state.attempt;
            match state.record_failure(&self.retry, error.clone()) {
                Ok(delay) => {
                    warn!(
                        stream = %batch.stream,
                        batch_id = %batch_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Send failed, retrying"
                    );
                    let notice = RetryNotice {
                        stream: batch.stream.clone(),
                        batch_id,
                        attempt,
                        delay,
                        error,
                    };
                    for observer in &self.observers {
                        observer.on_retry(&notice);
                    }
                    sleep(delay).await;
                }
                Err(terminal) => break terminal,
            }
        };

        drop(permit);
        self.report_failure(DeliveryFailure {
            error: error.clone(),
            batch,
        });
        Err(error)
    }

    fn report_failure(&self, failure: DeliveryFailure<E>) {
        if self.log_failures {
            error!(
                stream = %failure.batch.stream,
                events = failure.batch.len(),
                status = failure.error.status(),
                error = %failure.error,
                "Dropping batch after delivery failure"
            );
        } else {
            debug!(
                stream = %failure.batch.stream,
                error = %failure.error,
                "Batch dropped"
            );
        }

        for observer in &self.observers {
            observer.on_delivery_failed(&failure);
        }
    }
}

/// Serialized size of an event, rejecting events that carry no data.
fn event_size<E: Serialize>(event: &E) -> TrackerResult<usize> {
    let bytes = serde_json::to_vec(event)
        .map_err(|e| TrackerError::Validation(format!("event can't be serialized: {e}")))?;

    match bytes.as_slice() {
        b"null" | b"\"\"" | b"[]" => Err(TrackerError::Validation("event is empty".into())),
        _ => Ok(bytes.len()),
    }
}

async fn join_all<T>(handles: Vec<JoinHandle<T>>) -> Vec<T> {
    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(result) => results.push(result),
            Err(e) => error!(error = %e, "Send task failed"),
        }
    }
    results
}
