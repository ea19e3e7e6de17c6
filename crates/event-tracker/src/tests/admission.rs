//! Admission into the backlog.

use super::harness::{quiet_config, settle, Harness};
use crate::{LifecycleState, Tracker, TrackerConfig, TrackerError};
use delivery_transport::ScriptedTransport;
use serde_json::{json, Value};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_track_rejects_empty_stream() {
    let h = Harness::started(ScriptedTransport::succeeding(), quiet_config());

    let err = h.tracker.track("", 1).await.unwrap_err();
    assert!(matches!(err, TrackerError::Validation(_)));
    assert!(err.is_validation());
}

#[tokio::test(start_paused = true)]
async fn test_track_rejects_empty_events() {
    let tracker: Tracker<Value> =
        Tracker::new(ScriptedTransport::succeeding(), quiet_config());
    tracker.start();

    for event in [json!(null), json!(""), json!([])] {
        let err = tracker.track("s", event).await.unwrap_err();
        assert!(matches!(err, TrackerError::Validation(_)), "{err}");
    }
    assert_eq!(tracker.backlog_len("s"), 0);

    tracker.track("s", json!({"ok": true})).await.unwrap();
    assert_eq!(tracker.backlog_len("s"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_track_requires_running() {
    let h = Harness::new(ScriptedTransport::succeeding(), quiet_config());

    let err = h.tracker.track("s", 1).await.unwrap_err();
    assert!(matches!(err, TrackerError::NotRunning(LifecycleState::Stopped)));
    assert!(err.is_validation());

    h.tracker.start();
    h.tracker.track("s", 1).await.unwrap();
    h.tracker.stop().await;

    let err = h.tracker.track("s", 2).await.unwrap_err();
    assert!(matches!(err, TrackerError::NotRunning(LifecycleState::Stopped)));
    assert_eq!(h.delivered(), vec![1]);
}

#[tokio::test(start_paused = true)]
async fn test_non_blocking_times_out_when_backlog_full() {
    let config = TrackerConfig {
        backlog_size: 1,
        is_blocking: false,
        tracking_timeout_ms: 200,
        ..quiet_config()
    };
    let h = Harness::started(ScriptedTransport::succeeding(), config);

    h.tracker.track("s", 1).await.unwrap();
    let err = h.tracker.track("s", 2).await.unwrap_err();

    match err {
        TrackerError::TrackingTimeout { stream, waited } => {
            assert_eq!(stream, "s");
            assert!(waited >= Duration::from_millis(200), "{waited:?}");
        }
        other => panic!("expected timeout, got {other}"),
    }
    assert!(!TrackerError::TrackingTimeout {
        stream: "s".into(),
        waited: Duration::ZERO
    }
    .is_validation());

    // Other streams have their own capacity
    h.tracker.track("t", 3).await.unwrap();
    assert_eq!(h.tracker.backlog_len("s"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_blocking_waits_for_capacity() {
    let config = TrackerConfig {
        backlog_size: 1,
        ..quiet_config()
    };
    let h = Harness::started(ScriptedTransport::succeeding(), config);
    h.tracker.track("s", 1).await.unwrap();

    let tracker = h.tracker.clone();
    let blocked = tokio::spawn(async move { tracker.track("s", 2).await });

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(!blocked.is_finished());

    h.tracker.flush(Some("s")).await;
    blocked.await.unwrap().unwrap();

    assert_eq!(h.delivered(), vec![1]);
    assert_eq!(h.tracker.backlog_len("s"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_admission_waits_for_in_flight_slot() {
    let config = TrackerConfig {
        bulk_len: 1,
        max_in_flight: 1,
        is_blocking: false,
        tracking_timeout_ms: 200,
        ..quiet_config()
    };
    let h = Harness::started(
        ScriptedTransport::succeeding().with_hold(Duration::from_secs(1)),
        config,
    );

    h.tracker.track("s", 1).await.unwrap();
    settle().await;
    assert_eq!(h.tracker.in_flight(), 1);

    // Backlog has room but every in-flight slot is taken
    let err = h.tracker.track("other", 2).await.unwrap_err();
    assert!(matches!(err, TrackerError::TrackingTimeout { .. }));
    assert_eq!(h.tracker.backlog_len("other"), 0);

    tokio::time::sleep(Duration::from_secs(1)).await;
    h.tracker.track("other", 2).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_blocked_track_fails_when_stopped() {
    let config = TrackerConfig {
        backlog_size: 1,
        ..quiet_config()
    };
    let h = Harness::started(
        ScriptedTransport::succeeding().with_hold(Duration::from_millis(100)),
        config,
    );
    h.tracker.track("s", 1).await.unwrap();

    let tracker = h.tracker.clone();
    let blocked = tokio::spawn(async move { tracker.track("s", 2).await });
    settle().await;

    h.tracker.stop().await;
    let err = blocked.await.unwrap().unwrap_err();
    assert!(matches!(err, TrackerError::NotRunning(_)));
    assert_eq!(h.delivered(), vec![1]);
}
