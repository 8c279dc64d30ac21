//! Bounded retry with pluggable backoff.

use crate::config::{BackoffStrategy, RetryConfig};
use crate::error::{Error, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// `base * attempt` after the n-th failed attempt.
    Linear {
        /// Delay unit.
        base: Duration,
    },
    /// `min(base * 2^(attempt-1), max)` plus up to `jitter * delay` of noise.
    Exponential {
        /// Delay after the first failure.
        base: Duration,
        /// Upper bound before jitter.
        max: Duration,
        /// Fraction of the delay added at random, in `[0, 1]`.
        jitter: f64,
    },
}

impl Backoff {
    /// Delay to wait after the given failed attempt (1-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match *self {
            Self::Linear { base } => base.saturating_mul(attempt),
            Self::Exponential { base, max, jitter } => {
                let factor = 2u32.saturating_pow(attempt - 1);
                let delay = base.saturating_mul(factor).min(max);
                let jitter = jitter.clamp(0.0, 1.0);
                if jitter > 0.0 {
                    let extra = rand::thread_rng().gen_range(0.0..=jitter);
                    delay + delay.mul_f64(extra)
                } else {
                    delay
                }
            }
        }
    }
}

/// Maximum attempts plus the delay schedule between them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Backoff,
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` is raised to at least one.
    #[must_use]
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Linear backoff: `base * attempt`.
    #[must_use]
    pub fn linear(max_attempts: u32, base: Duration) -> Self {
        Self::new(max_attempts, Backoff::Linear { base })
    }

    /// Build the policy described by the configuration.
    #[must_use]
    pub fn from_config(config: &RetryConfig) -> Self {
        let base = Duration::from_millis(config.base_delay_ms);
        let backoff = match config.strategy {
            BackoffStrategy::Linear => Backoff::Linear { base },
            BackoffStrategy::Exponential => Backoff::Exponential {
                base,
                max: Duration::from_millis(config.max_delay_ms),
                jitter: config.jitter,
            },
        };
        Self::new(config.max_attempts, backoff)
    }

    /// Attempt bound.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay schedule.
    #[must_use]
    pub fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Run `op` until it succeeds or the attempt bound is reached.
    ///
    /// `op` receives the 1-based attempt number and must start a fresh
    /// call each time. No sleep follows the final attempt.
    ///
    /// # Errors
    ///
    /// Returns the error of the last attempt.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if attempt >= self.max_attempts => {
                    warn!(operation, attempt, "Giving up: {e}");
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.backoff.delay(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = self.max_attempts,
                        "Attempt failed, retrying in {delay:?}: {e}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Bound an external call by `timeout`.
///
/// # Errors
///
/// Returns [`Error::Timeout`] if the call does not finish in time, otherwise
/// the call's own result.
pub async fn with_timeout<T, Fut>(operation: &'static str, timeout: Duration, fut: Fut) -> Result<T>
where
    Fut: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout {
            operation,
            millis: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}
