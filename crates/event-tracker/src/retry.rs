//! Backoff policy and per-send retry state.

use crate::config::RetryOptions;
use crate::DeliveryError;
use delivery_transport::{ErrorClass, TransportError};
use rand::Rng;
use std::time::Duration;

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Retry { delay: Duration },
    GiveUp,
}

/// Exponential backoff with a cap and optional jitter.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    options: RetryOptions,
}

impl RetryPolicy {
    pub fn new(options: RetryOptions) -> Self {
        Self { options }
    }

    /// Capped delay before retrying after `attempt` failed, without jitter.
    ///
    /// `min_timeout * factor^(attempt - 1)`, capped at `max_timeout`.
    /// Attempt 0 is treated as 1.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.max(1) - 1;
        let min = self.options.min_timeout_ms as f64;
        let max = self.options.max_timeout_ms as f64;
        let raw = min * self.options.factor.powi(exponent.min(i32::MAX as u32) as i32);
        // powi overflows to inf for large exponents, min() handles it
        Duration::from_millis(raw.min(max) as u64)
    }

    /// Delay before retrying after `attempt` failed, with jitter if enabled.
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.options.randomize {
            base.mul_f64(rand::thread_rng().gen_range(1.0..2.0))
        } else {
            base
        }
    }

    /// Decide whether the call numbered `attempt` (1-based) gets another try.
    pub fn decide(&self, class: ErrorClass, attempt: u32) -> RetryDecision {
        match class {
            ErrorClass::Permanent => RetryDecision::GiveUp,
            ErrorClass::Retryable if attempt < self.options.retries => RetryDecision::Retry {
                delay: self.delay(attempt),
            },
            ErrorClass::Retryable => RetryDecision::GiveUp,
        }
    }
}

/// State of one in-progress send.
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    /// Number of the call currently being made, starting at 1.
    pub attempt: u32,
    /// Delay chosen after the last failure.
    pub delay: Duration,
    /// Error from the most recent failed call.
    pub last_error: Option<TransportError>,
}

impl RetryState {
    pub fn new() -> Self {
        Self {
            attempt: 1,
            ..Default::default()
        }
    }

    /// Record a failed call.
    ///
    /// Returns the delay to wait before the next call, advancing `attempt`,
    /// or the terminal error when the policy gives up.
    pub fn record_failure(
        &mut self,
        policy: &RetryPolicy,
        error: TransportError,
    ) -> Result<Duration, DeliveryError> {
        match policy.decide(error.class(), self.attempt) {
            RetryDecision::Retry { delay } => {
                self.delay = delay;
                self.last_error = Some(error);
                self.attempt += 1;
                Ok(delay)
            }
            RetryDecision::GiveUp => Err(match error.class() {
                ErrorClass::Permanent => DeliveryError::Permanent {
                    attempts: self.attempt,
                    error,
                },
                ErrorClass::Retryable => DeliveryError::RetryExhausted {
                    attempts: self.attempt,
                    last_error: error,
                },
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(retries: u32, min: u64, max: u64, randomize: bool) -> RetryPolicy {
        RetryPolicy::new(RetryOptions {
            retries,
            factor: 2.0,
            min_timeout_ms: min,
            max_timeout_ms: max,
            randomize,
        })
    }

    #[test]
    fn test_backoff_sequence_is_capped() {
        let p = policy(10, 10, 50, false);
        let delays: Vec<u64> = (1..=6).map(|a| p.delay(a).as_millis() as u64).collect();
        assert_eq!(delays, vec![10, 20, 40, 50, 50, 50]);
    }

    #[test]
    fn test_attempt_zero_treated_as_one() {
        let p = policy(10, 10, 50, false);
        assert_eq!(p.base_delay(0), Duration::from_millis(10));
    }

    #[test]
    fn test_huge_attempt_stays_capped() {
        let p = policy(10, 1_000, 90_000, false);
        assert_eq!(p.base_delay(u32::MAX), Duration::from_millis(90_000));
    }

    #[test]
    fn test_randomized_delay_within_bounds() {
        let p = policy(10, 100, 10_000, true);
        for attempt in 1..=5 {
            let base = p.base_delay(attempt);
            for _ in 0..50 {
                let d = p.delay(attempt);
                assert!(d >= base, "{d:?} < {base:?}");
                assert!(d < base * 2, "{d:?} >= 2 * {base:?}");
            }
        }
    }

    #[test]
    fn test_permanent_never_retried() {
        let p = policy(10, 10, 50, false);
        assert_eq!(p.decide(ErrorClass::Permanent, 1), RetryDecision::GiveUp);
    }

    #[test]
    fn test_retryable_until_budget_spent() {
        let p = policy(3, 10, 50, false);
        assert_eq!(
            p.decide(ErrorClass::Retryable, 1),
            RetryDecision::Retry {
                delay: Duration::from_millis(10)
            }
        );
        assert!(matches!(p.decide(ErrorClass::Retryable, 2), RetryDecision::Retry { .. }));
        assert_eq!(p.decide(ErrorClass::Retryable, 3), RetryDecision::GiveUp);
    }

    #[test]
    fn test_retry_state_exhaustion() {
        let p = policy(3, 10, 50, false);
        let mut state = RetryState::new();

        assert_eq!(
            state.record_failure(&p, TransportError::new(500, "a")),
            Ok(Duration::from_millis(10))
        );
        assert_eq!(state.attempt, 2);
        assert_eq!(
            state.record_failure(&p, TransportError::new(502, "b")),
            Ok(Duration::from_millis(20))
        );
        assert_eq!(state.delay, Duration::from_millis(20));
        assert_eq!(state.last_error, Some(TransportError::new(502, "b")));

        assert_eq!(
            state.record_failure(&p, TransportError::new(503, "c")),
            Err(DeliveryError::RetryExhausted {
                attempts: 3,
                last_error: TransportError::new(503, "c"),
            })
        );
    }

    #[test]
    fn test_retry_state_permanent() {
        let p = policy(3, 10, 50, false);
        let mut state = RetryState::new();
        assert_eq!(
            state.record_failure(&p, TransportError::new(401, "denied")),
            Err(DeliveryError::Permanent {
                attempts: 1,
                error: TransportError::new(401, "denied")
            })
        );
        assert_eq!(state.attempt, 1);
    }

    #[test]
    fn test_zero_retries_gives_up_on_first_failure() {
        let p = policy(0, 10, 50, false);
        let mut state = RetryState::new();
        assert!(matches!(
            state.record_failure(&p, TransportError::new(500, "down")),
            Err(DeliveryError::RetryExhausted { attempts: 1, .. })
        ));
    }
}
