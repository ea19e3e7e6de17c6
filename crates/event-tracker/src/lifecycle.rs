//! Tracker lifecycle state.

use serde::Serialize;
use std::fmt;

/// Where the tracker is in its start/stop cycle.
///
/// `Stopped -> Running` on `start()`, `Running -> Draining -> Stopped` on
/// `stop()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Stopped,
    Running,
    Draining,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Stopped => "stopped",
            Self::Running => "running",
            Self::Draining => "draining",
        };
        f.write_str(name)
    }
}
