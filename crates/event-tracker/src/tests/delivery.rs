//! Retry, backoff and failure reporting.

use super::harness::{quiet_config, Harness};
use crate::{DeliveryError, RetryOptions, Tracker, TrackerConfig};
use delivery_transport::{ResponseMeta, ScriptedTransport, TransportError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn test_five_server_errors_then_success() {
    let h = Harness::new(ScriptedTransport::succeeding().then_fail(500, 5), quiet_config());

    let meta = h.tracker.send("s", vec![1, 2]).await.unwrap();

    assert_eq!(meta.status, 200);
    assert_eq!(h.transport.calls(), 6);
    assert!(h.recorder.failures().is_empty());
    assert_eq!(h.recorder.retries().len(), 5);
    assert_eq!(h.tracker.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_client_error_not_retried() {
    let h = Harness::new(ScriptedTransport::failing(401), quiet_config());

    let err = h.tracker.send("s", vec![7, 8]).await.unwrap_err();

    assert!(matches!(err, DeliveryError::Permanent { .. }));
    assert_eq!(err.status(), 401);
    assert_eq!(h.transport.calls(), 1);
    assert!(h.recorder.retries().is_empty());

    let failures = h.recorder.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].error, err);
    assert_eq!(failures[0].batch.stream, "s");
    assert_eq!(failures[0].batch.data, vec![7, 8]);
}

#[tokio::test(start_paused = true)]
async fn test_retries_exhausted() {
    let config = TrackerConfig {
        retry: RetryOptions {
            retries: 3,
            ..quiet_config().retry
        },
        ..quiet_config()
    };
    let h = Harness::new(ScriptedTransport::failing(503), config);

    let err = h.tracker.send("s", vec![1]).await.unwrap_err();

    match &err {
        DeliveryError::RetryExhausted {
            attempts,
            last_error,
        } => {
            assert_eq!(*attempts, 3);
            assert_eq!(last_error.status, 503);
        }
        other => panic!("expected exhaustion, got {other}"),
    }
    assert_eq!(h.transport.calls(), 3);
    assert_eq!(h.recorder.failures().len(), 1);
    assert_eq!(h.tracker.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_delays_follow_policy() {
    let h = Harness::new(
        ScriptedTransport::succeeding().then_fail(500, 5),
        quiet_config(),
    );

    let started = Instant::now();
    h.tracker.send("s", vec![1]).await.unwrap();
    let elapsed = started.elapsed();

    let retries = h.recorder.retries();
    let attempts: Vec<u32> = retries.iter().map(|n| n.attempt).collect();
    let delays: Vec<u64> = retries.iter().map(|n| n.delay.as_millis() as u64).collect();
    assert_eq!(attempts, vec![1, 2, 3, 4, 5]);
    assert_eq!(delays, vec![10, 20, 40, 50, 50]);
    assert!(elapsed >= Duration::from_millis(170), "{elapsed:?}");

    // Every notice refers to the same batch
    assert!(retries.iter().all(|n| n.batch_id == retries[0].batch_id));
}

#[tokio::test(start_paused = true)]
async fn test_connection_problem_is_retried() {
    let h = Harness::new(
        ScriptedTransport::succeeding().then(Err(TransportError::connection_problem())),
        quiet_config(),
    );

    h.tracker.send("s", vec![1]).await.unwrap();
    assert_eq!(h.transport.calls(), 2);
    assert_eq!(h.recorder.retries()[0].error.message, "Connection Problem");
}

#[tokio::test(start_paused = true)]
async fn test_failed_batch_does_not_block_others() {
    let h = Harness::started(
        ScriptedTransport::succeeding().then(Err(TransportError::new(400, "bad"))),
        TrackerConfig {
            max_in_flight: 1,
            ..quiet_config()
        },
    );

    h.tracker.track("a", 1).await.unwrap();
    h.tracker.track("b", 2).await.unwrap();
    let outcomes = h.tracker.flush(None).await;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
    assert_eq!(h.recorder.failures().len(), 1);

    // The dropped batch is not re-queued
    assert_eq!(h.tracker.backlog_len("a") + h.tracker.backlog_len("b"), 0);

    h.tracker.track("a", 3).await.unwrap();
    h.tracker.flush(None).await;
    assert_eq!(h.transport.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_on_error_closure_receives_failures() {
    let failures = Arc::new(AtomicUsize::new(0));
    let seen = failures.clone();

    let tracker = Tracker::builder(ScriptedTransport::<i32>::failing(404))
        .config(quiet_config())
        .on_error(move |failure| {
            assert_eq!(failure.batch.data, vec![5]);
            seen.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    tracker.send("s", vec![5]).await.unwrap_err();
    assert_eq!(failures.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_success_returns_transport_response() {
    let h = Harness::new(
        ScriptedTransport::succeeding().then(Ok(ResponseMeta::new(202, "accepted"))),
        quiet_config(),
    );

    let meta = h.tracker.send("s", vec![1]).await.unwrap();
    assert_eq!(meta, ResponseMeta::new(202, "accepted"));
}
