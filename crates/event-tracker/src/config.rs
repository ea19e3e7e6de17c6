//! Tracker configuration.
//!
//! Every field has a default and a valid range. [`TrackerConfig::validated`]
//! replaces out-of-range values with their defaults and logs a warning, so a
//! tracker can always be built from whatever the host supplies.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;
use tracing::warn;

/// Upper bound for `bulk_len`.
pub const BULK_LEN_LIMIT: usize = 2_000;
/// Upper bound for `bulk_size_bytes`.
pub const BULK_SIZE_LIMIT: usize = 512 * 1024;
/// Lower bound for `bulk_size_bytes`.
pub const BULK_SIZE_MIN: usize = 1024;
/// Lower bound for `flush_interval_ms`.
pub const FLUSH_INTERVAL_MIN_MS: u64 = 1_000;

/// Period of the scheduler tick.
pub const SCHEDULER_TICK: Duration = Duration::from_millis(500);
/// How often a blocked `track()` re-checks admission.
pub const ADMISSION_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Backoff settings for failed sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryOptions {
    /// Retry budget; a batch is sent at most `max(retries, 1)` times.
    pub retries: u32,
    /// Multiplier applied per attempt.
    pub factor: f64,
    /// Delay after the first failure, in milliseconds.
    pub min_timeout_ms: u64,
    /// Cap on any single delay, in milliseconds.
    pub max_timeout_ms: u64,
    /// Multiply each delay by a uniform factor in `[1, 2)`.
    pub randomize: bool,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            retries: 10,
            factor: 2.0,
            min_timeout_ms: 1_000,
            max_timeout_ms: 90_000,
            randomize: true,
        }
    }
}

impl RetryOptions {
    /// Return a copy with out-of-range fields reset to their defaults.
    pub fn validated(self) -> Self {
        let defaults = Self::default();
        let min_timeout_ms = checked("retry.min_timeout_ms", self.min_timeout_ms, defaults.min_timeout_ms, |v| *v >= 1);
        let max_timeout_ms = if self.max_timeout_ms >= min_timeout_ms {
            self.max_timeout_ms
        } else {
            warn!(
                field = "retry.max_timeout_ms",
                value = self.max_timeout_ms,
                min_timeout_ms,
                "Invalid tracker config value, using default"
            );
            defaults.max_timeout_ms.max(min_timeout_ms)
        };

        Self {
            retries: self.retries,
            factor: checked("retry.factor", self.factor, defaults.factor, |v| {
                v.is_finite() && *v >= 1.0
            }),
            min_timeout_ms,
            max_timeout_ms,
            randomize: self.randomize,
        }
    }
}

/// Tracker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Flush every non-empty stream once this long has passed since the last send.
    pub flush_interval_ms: u64,
    /// Flush a stream when it holds this many events; also the batch size.
    pub bulk_len: usize,
    /// Flush a stream when its queued events reach this many bytes.
    pub bulk_size_bytes: usize,
    /// Per-stream queue capacity.
    pub backlog_size: usize,
    /// Maximum sends outstanding across all streams.
    pub max_in_flight: usize,
    /// Maximum sends launched by one scheduler pass.
    pub concurrency: usize,
    /// Whether `track()` waits indefinitely for admission.
    pub is_blocking: bool,
    /// Admission wait limit when not blocking, in milliseconds.
    pub tracking_timeout_ms: u64,
    /// Backoff settings.
    pub retry: RetryOptions,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: 10_000,
            bulk_len: 1_000,
            bulk_size_bytes: 128 * 1024,
            backlog_size: 10_000,
            max_in_flight: 20,
            concurrency: 10,
            is_blocking: true,
            tracking_timeout_ms: 1_000,
            retry: RetryOptions::default(),
        }
    }
}

impl TrackerConfig {
    /// Return a copy with out-of-range fields reset to their defaults.
    ///
    /// Never fails; each replaced field is logged at `warn`.
    pub fn validated(self) -> Self {
        let d = Self::default();
        Self {
            flush_interval_ms: checked("flush_interval_ms", self.flush_interval_ms, d.flush_interval_ms, |v| {
                *v >= FLUSH_INTERVAL_MIN_MS
            }),
            bulk_len: checked("bulk_len", self.bulk_len, d.bulk_len, |v| {
                (1..=BULK_LEN_LIMIT).contains(v)
            }),
            bulk_size_bytes: checked("bulk_size_bytes", self.bulk_size_bytes, d.bulk_size_bytes, |v| {
                (BULK_SIZE_MIN..=BULK_SIZE_LIMIT).contains(v)
            }),
            backlog_size: checked("backlog_size", self.backlog_size, d.backlog_size, |v| *v >= 1),
            max_in_flight: checked("max_in_flight", self.max_in_flight, d.max_in_flight, |v| *v >= 1),
            concurrency: checked("concurrency", self.concurrency, d.concurrency, |v| *v >= 1),
            is_blocking: self.is_blocking,
            tracking_timeout_ms: checked("tracking_timeout_ms", self.tracking_timeout_ms, d.tracking_timeout_ms, |v| {
                *v >= 1
            }),
            retry: self.retry.validated(),
        }
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    pub fn tracking_timeout(&self) -> Duration {
        Duration::from_millis(self.tracking_timeout_ms)
    }
}

fn checked<T: Debug>(field: &'static str, value: T, default: T, valid: impl FnOnce(&T) -> bool) -> T {
    if valid(&value) {
        value
    } else {
        warn!(field, value = ?value, default = ?default, "Invalid tracker config value, using default");
        default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TrackerConfig::default();
        assert_eq!(config.clone().validated(), config);
        assert_eq!(config.flush_interval(), Duration::from_secs(10));
        assert_eq!(config.retry.max_timeout_ms, 90_000);
    }

    #[test]
    fn test_out_of_range_values_fall_back() {
        let config = TrackerConfig {
            flush_interval_ms: 10,
            bulk_len: BULK_LEN_LIMIT + 1,
            bulk_size_bytes: 10,
            backlog_size: 0,
            max_in_flight: 0,
            concurrency: 0,
            tracking_timeout_ms: 0,
            ..Default::default()
        }
        .validated();

        assert_eq!(config, TrackerConfig::default());
    }

    #[test]
    fn test_in_range_values_kept() {
        let config = TrackerConfig {
            flush_interval_ms: 1_000,
            bulk_len: BULK_LEN_LIMIT,
            bulk_size_bytes: BULK_SIZE_MIN,
            backlog_size: 1,
            max_in_flight: 2,
            concurrency: 1,
            is_blocking: false,
            tracking_timeout_ms: 5,
            retry: RetryOptions {
                retries: 0,
                factor: 1.0,
                min_timeout_ms: 10,
                max_timeout_ms: 10,
                randomize: false,
            },
        };
        assert_eq!(config.clone().validated(), config);
    }

    #[test]
    fn test_invalid_retry_options_fall_back() {
        let retry = RetryOptions {
            factor: f64::NAN,
            min_timeout_ms: 0,
            max_timeout_ms: 0,
            ..Default::default()
        }
        .validated();
        assert_eq!(retry, RetryOptions::default());

        let retry = RetryOptions {
            factor: 0.5,
            min_timeout_ms: 200_000,
            max_timeout_ms: 100,
            ..Default::default()
        }
        .validated();
        assert_eq!(retry.factor, 2.0);
        assert_eq!(retry.min_timeout_ms, 200_000);
        assert_eq!(retry.max_timeout_ms, 200_000);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TrackerConfig =
            serde_json::from_str(r#"{"bulk_len": 5, "retry": {"retries": 3}}"#).unwrap();
        assert_eq!(config.bulk_len, 5);
        assert_eq!(config.retry.retries, 3);
        assert_eq!(config.retry.factor, 2.0);
        assert_eq!(config.backlog_size, 10_000);
    }
}
