//! Flush scheduling.

use crate::config::{TrackerConfig, SCHEDULER_TICK};
use crate::tracker::TrackerInner;
use serde::Serialize;
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, trace};

/// Whether a stream with `len` queued events totalling `bytes` should be
/// flushed, given `elapsed` time since the last send.
pub fn should_flush(len: usize, bytes: usize, elapsed: Duration, config: &TrackerConfig) -> bool {
    len > 0
        && (len >= config.bulk_len
            || bytes >= config.bulk_size_bytes
            || elapsed >= config.flush_interval())
}

/// Scheduler loop. Runs a pass every tick and whenever `track()` nudges it,
/// until `stop` fires or the tracker is dropped.
pub(crate) async fn run<E>(inner: Weak<TrackerInner<E>>, mut stop: oneshot::Receiver<()>)
where
    E: Serialize + Send + Sync + 'static,
{
    let mut ticker = interval(SCHEDULER_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!("Scheduler started");

    loop {
        let Some(strong) = inner.upgrade() else {
            break;
        };
        let nudge = strong.nudge.clone();
        drop(strong);

        tokio::select! {
            _ = &mut stop => break,
            _ = ticker.tick() => {}
            _ = nudge.notified() => {}
        }

        let Some(strong) = inner.upgrade() else {
            break;
        };
        let launched = strong.schedule_pass();
        if launched > 0 {
            trace!(launched, "Scheduler pass dispatched sends");
        }
    }

    debug!("Scheduler stopped");
}
