// src/core/retry.rs — Retry policy with exponential backoff
//
// Classifies step failures as transient or fatal and bounds transient
// retries. Retries: provider timeouts, connection resets, 5xx, rate limits.
// Does NOT retry: 4xx, malformed candidates, lease or version conflicts.

use std::time::Duration;

use crate::infra::errors::ModelForgeError;

/// Default retry configuration.
const MAX_RETRIES: u32 = 3;
const INITIAL_DELAY_MS: u64 = 1_000;
const BACKOFF_FACTOR: f64 = 2.0;
const MAX_DELAY_MS: u64 = 30_000;
const JITTER_FRACTION: f64 = 0.2;

/// Decides whether a failed step is retried, how many times, and with what
/// backoff. The delay never sleeps past the job's deadline.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: MAX_RETRIES,
            initial_delay: Duration::from_millis(INITIAL_DELAY_MS),
            backoff_factor: BACKOFF_FACTOR,
            max_delay: Duration::from_millis(MAX_DELAY_MS),
            jitter_fraction: JITTER_FRACTION,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

impl RetryPolicy {
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Decide what to do after a failed attempt (0-indexed).
    ///
    /// `time_left` is the remaining wall-clock budget before the job's
    /// deadline; a delay that would sleep to or past it gives up instead.
    pub fn decide(
        &self,
        attempt: u32,
        error: &ModelForgeError,
        time_left: Duration,
    ) -> RetryDecision {
        if !error.is_retriable() || attempt >= self.max_retries {
            return RetryDecision::GiveUp;
        }

        let delay = self.delay_for_attempt(attempt, rate_limit_delay(error));
        if delay >= time_left {
            return RetryDecision::GiveUp;
        }
        RetryDecision::RetryAfter(delay)
    }

    /// Calculate the delay for a given retry attempt (0-indexed).
    fn delay_for_attempt(&self, attempt: u32, rate_limit_delay: Option<Duration>) -> Duration {
        // If the provider told us how long to wait, use that (with a small buffer).
        if let Some(rl_delay) = rate_limit_delay {
            return rl_delay + Duration::from_millis(100);
        }

        let base_ms =
            self.initial_delay.as_millis() as f64 * self.backoff_factor.powi(attempt as i32);
        let capped_ms = base_ms.min(self.max_delay.as_millis() as f64);

        // Jitter: multiplier in [1 - fraction, 1 + fraction]
        let jitter = deterministic_jitter(attempt, self.jitter_fraction);
        Duration::from_millis((capped_ms * jitter) as u64)
    }
}

/// Extract the rate-limit retry hint from the error, if available.
fn rate_limit_delay(error: &ModelForgeError) -> Option<Duration> {
    match error {
        ModelForgeError::RateLimited { retry_after_ms, .. } if *retry_after_ms > 0 => {
            Some(Duration::from_millis(*retry_after_ms))
        }
        _ => None,
    }
}

/// Deterministic jitter for a given attempt to keep retries reproducible in
/// tests. Returns a multiplier in [1 - fraction, 1 + fraction].
fn deterministic_jitter(attempt: u32, fraction: f64) -> f64 {
    // Simple hash-based jitter — not cryptographic, just varied enough
    let hash = (attempt.wrapping_mul(2654435761)) as f64 / u32::MAX as f64; // 0.0..1.0
    1.0 + fraction * (2.0 * hash - 1.0)
}
