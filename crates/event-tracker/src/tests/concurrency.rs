//! In-flight limits under load.

use super::harness::{quiet_config, Harness};
use crate::TrackerConfig;
use delivery_transport::ScriptedTransport;
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn test_max_in_flight_never_exceeded() {
    let config = TrackerConfig {
        bulk_len: 1,
        max_in_flight: 2,
        ..quiet_config()
    };
    let h = Harness::started(
        ScriptedTransport::succeeding().with_hold(Duration::from_millis(100)),
        config,
    );

    let producers: Vec<_> = (0..20)
        .map(|i| {
            let tracker = h.tracker.clone();
            tokio::spawn(async move { tracker.track(&format!("stream-{}", i % 5), i).await })
        })
        .collect();
    for producer in producers {
        producer.await.unwrap().unwrap();
    }

    h.tracker.stop().await;

    assert!(h.transport.peak_concurrency() <= 2);
    assert_eq!(h.transport.peak_concurrency(), 2);

    let mut delivered = h.delivered();
    delivered.sort();
    assert_eq!(delivered, (0..20).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn test_direct_sends_share_in_flight_limit() {
    let config = TrackerConfig {
        max_in_flight: 3,
        ..quiet_config()
    };
    let h = Harness::new(
        ScriptedTransport::succeeding().with_hold(Duration::from_millis(50)),
        config,
    );

    let sends: Vec<_> = (0..10)
        .map(|i| {
            let tracker = h.tracker.clone();
            tokio::spawn(async move { tracker.send("s", vec![i]).await })
        })
        .collect();
    for send in sends {
        send.await.unwrap().unwrap();
    }

    assert_eq!(h.transport.calls(), 10);
    assert_eq!(h.transport.peak_concurrency(), 3);
    assert_eq!(h.tracker.in_flight(), 0);
}
