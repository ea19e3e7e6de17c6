//! Configuration, paths and logging for the stream tracker host.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{Config, DEFAULT_ENDPOINT, DEFAULT_LOG_LEVEL, DEFAULT_TIMEOUT_MS};
pub use error::{CoreError, CoreResult};
pub use logging::{init_logging, parse_level, LogConfig, LogFileWriter, LogFormat};
pub use paths::Paths;
