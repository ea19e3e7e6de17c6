//! Errors raised while setting up the stream tracker host.

use thiserror::Error;

/// Failures in config loading, path resolution and logging setup.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Collector endpoint must use http or https, got {0}")]
    UnsupportedScheme(String),

    #[error("Invalid collector endpoint: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Unknown log format {0:?}, expected pretty or json")]
    UnknownLogFormat(String),

    /// Raised when a global subscriber is already installed.
    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Could not determine home directory for the tracker state")]
    NoHomeDir,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file or dead-letter record that is not valid JSON.
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
