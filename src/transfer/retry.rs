//! Retry Policy
//!
//! Declarative retry rules handed to the [`ActivityStub`](super::activities::ActivityStub).
//! Swapping the policy never touches orchestration code.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{ActivityError, INVALID_ACCOUNT_ERROR};

/// Retry rules for ledger calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay before the second attempt
    pub initial_interval_ms: u64,
    /// Multiplier applied to the delay after each failed attempt
    pub backoff_coefficient: f64,
    /// Upper bound for the delay between attempts
    pub maximum_interval_ms: u64,
    /// `None` retries until success or a non-retryable error
    pub maximum_attempts: Option<u32>,
    /// Error types that stop retrying immediately
    pub non_retryable_error_types: Vec<String>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval_ms: 1_000,
            backoff_coefficient: 2.0,
            maximum_interval_ms: 100_000,
            maximum_attempts: None,
            non_retryable_error_types: vec![INVALID_ACCOUNT_ERROR.to_string()],
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retry
    pub fn no_retry() -> Self {
        Self {
            maximum_attempts: Some(1),
            ..Self::default()
        }
    }

    /// Check whether `error`, raised by attempt number `attempt` (1-based),
    /// may be retried
    pub fn should_retry(&self, error: &ActivityError, attempt: u32) -> bool {
        if error.non_retryable {
            return false;
        }
        if self
            .non_retryable_error_types
            .iter()
            .any(|excluded| *excluded == error.error_type)
        {
            return false;
        }
        self.maximum_attempts.is_none_or(|max| attempt < max)
    }

    /// Delay to wait after attempt number `attempt` (1-based) failed
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_ms = self.initial_interval_ms as f64 * self.backoff_coefficient.powi(exponent);
        let capped_ms = delay_ms.min(self.maximum_interval_ms as f64).max(0.0);
        Duration::from_millis(capped_ms as u64)
    }
}

/// Options applied to every ledger call made by one orchestration
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityOptions {
    /// Bound on a single attempt
    pub start_to_close_timeout: Duration,
    pub retry_policy: RetryPolicy,
}
