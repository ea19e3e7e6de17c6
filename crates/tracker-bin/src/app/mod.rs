//! Command implementations.

mod oneshot;
mod replay;
mod signals;
mod track;

pub use oneshot::{run_health, run_put};
pub use replay::run_replay;
pub use track::{run_track, TrackOptions};
