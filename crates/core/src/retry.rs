//! Exponential-backoff retry controller.
//!
//! Wraps any fallible async operation returning [`AppResult`]. Retryable
//! failures are decided by [`AppError::is_retryable`], so the controller never
//! looks at error text.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Maximum jitter added to a delay, as a fraction of the pre-jitter delay.
pub const MAX_JITTER_FRACTION: f64 = 0.10;

/// Backoff configuration for one category of external call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Total number of invocations, including the first one
    pub max_attempts: u32,

    /// Delay before the second attempt
    pub initial_delay_ms: u64,

    /// Upper bound for any delay, jitter included
    pub max_delay_ms: u64,

    /// Growth factor applied per attempt
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 4_000,
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(
        max_attempts: u32,
        initial_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f64,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay_ms: initial_delay.as_millis() as u64,
            max_delay_ms: max_delay.as_millis() as u64,
            backoff_multiplier,
        }
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Delay after failed attempt `attempt` (1-based), before jitter:
    /// `initial * multiplier^(attempt-1)`, capped at `max_delay`.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let raw_ms = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped_ms = raw_ms.min(self.max_delay_ms as f64);
        Duration::from_millis(capped_ms as u64)
    }

    /// Base delay plus `jitter_fraction` (clamped to `[0, 0.1]`) of itself,
    /// capped at `max_delay`.
    pub fn delay_with_jitter(&self, attempt: u32, jitter_fraction: f64) -> Duration {
        let base = self.base_delay(attempt);
        let fraction = jitter_fraction.clamp(0.0, MAX_JITTER_FRACTION);
        let jittered = base.as_millis() as f64 * (1.0 + fraction);
        Duration::from_millis(jittered.min(self.max_delay_ms as f64) as u64)
    }

    /// Delay actually slept after failed attempt `attempt`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let fraction = rand::thread_rng().gen_range(0.0..=MAX_JITTER_FRACTION);
        self.delay_with_jitter(attempt, fraction)
    }

    /// Run `operation` until it succeeds, fails fatally, or the attempts are
    /// exhausted. `on_retry(attempt, &error)` runs before each backoff sleep.
    /// The last error is returned unchanged.
    pub async fn execute<T, F, Fut, R>(&self, mut operation: F, mut on_retry: R) -> AppResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<T>>,
        R: FnMut(u32, &AppError),
    {
        self.execute_with_state(
            &mut (),
            move |_: &()| operation(),
            move |_: &mut (), attempt, err: &AppError| on_retry(attempt, err),
        )
        .await
    }

    /// Same as [`RetryPolicy::execute`], threading caller-owned state through
    /// the loop. `operation` reads the state to build each attempt and
    /// `on_retry` may update it between attempts.
    pub async fn execute_with_state<S, T, F, Fut, R>(
        &self,
        state: &mut S,
        mut operation: F,
        mut on_retry: R,
    ) -> AppResult<T>
    where
        F: FnMut(&S) -> Fut,
        Fut: Future<Output = AppResult<T>>,
        R: FnMut(&mut S, u32, &AppError),
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation(&*state).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    if !err.is_retryable() || attempt >= max_attempts {
                        if attempt > 1 {
                            tracing::warn!(attempt, max_attempts, error = %err, "Giving up");
                        }
                        return Err(err);
                    }

                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Retrying after error"
                    );

                    on_retry(state, attempt, &err);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
