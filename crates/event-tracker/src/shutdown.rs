//! Host-driven shutdown hook.
//!
//! The tracker never installs signal handlers itself. Hosts obtain a
//! [`ShutdownTrigger`] and fire it from whatever termination source they
//! use (signals, a parent supervisor, an RPC).

use crate::Tracker;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::info;

/// Cloneable handle that stops and drains a tracker when fired.
pub struct ShutdownTrigger<E> {
    tracker: Tracker<E>,
}

impl<E> Clone for ShutdownTrigger<E> {
    fn clone(&self) -> Self {
        Self {
            tracker: self.tracker.clone(),
        }
    }
}

impl<E> ShutdownTrigger<E>
where
    E: Serialize + Send + Sync + 'static,
{
    pub(crate) fn new(tracker: Tracker<E>) -> Self {
        Self { tracker }
    }

    /// Stop the tracker and wait for the drain to finish.
    pub async fn fire(&self) {
        info!(state = %self.tracker.state(), "Shutdown triggered");
        self.tracker.stop().await;
    }

    /// Stop the tracker from a background task.
    pub fn fire_in_background(&self) -> JoinHandle<()> {
        let trigger = self.clone();
        tokio::spawn(async move { trigger.fire().await })
    }
}
