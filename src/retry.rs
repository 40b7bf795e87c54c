use crate::api::Error;
use crate::model::ActionClass;
use rand::Rng;
use std::convert::TryFrom;
use std::future::Future;
use std::time::Duration;

/// Exponential backoff with jitter.
///
/// The wait before retry `n` (0-based) is `initial * multiplier^n` plus a random share of the
/// gap to the next step, capped at `max`. Because jitter never reaches the next step, waits are
/// strictly increasing until the cap is hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
    /// Growth factor, at least 1.
    pub multiplier: f64,
    /// Fraction (0..=1) of the gap between two steps used as random spread.
    pub jitter: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.5,
        }
    }
}

impl Backoff {
    pub fn delay(&self, retry: u32) -> Duration {
        let multiplier = if self.multiplier.is_finite() && self.multiplier >= 1.0 {
            self.multiplier
        } else {
            1.0
        };
        let jitter = if self.jitter.is_finite() {
            self.jitter.clamp(0.0, 1.0)
        } else {
            0.0
        };
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let max = self.max.as_secs_f64();

        let base = (self.initial.as_secs_f64() * multiplier.powi(exponent)).min(max);
        let spread = base * (multiplier - 1.0) * jitter;
        let extra = if spread.is_finite() && spread > 0.0 {
            rand::thread_rng().gen_range(0.0..spread)
        } else {
            0.0
        };

        // `max` itself may be larger than any float-converted Duration.
        Duration::try_from_secs_f64(base + extra)
            .map(|delay| delay.min(self.max))
            .unwrap_or(self.max)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Zero is treated as one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff,
        }
    }

    /// Single attempt, no waiting.
    pub fn once() -> RetryPolicy {
        RetryPolicy::new(1, Backoff::default())
    }

    /// Wait before the next attempt after `attempt` (1-based) failed with `error`, or `None` when
    /// the error is not retryable or the budget is spent.
    pub fn retry_delay(&self, attempt: u32, error: &Error) -> Option<Duration> {
        if !error.is_retryable() || attempt >= self.max_attempts.max(1) {
            None
        } else {
            Some(self.backoff.delay(attempt.saturating_sub(1)))
        }
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the attempt budget is
    /// spent. Non-retryable errors are returned as they are; a spent budget is reported as
    /// [`Error::RetriesExhausted`] wrapping the last error.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, Error>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut waited = Vec::new();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        log::info!("{} succeeded on attempt {}/{}", what, attempt, max_attempts);
                    }
                    return Ok(value);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => match self.retry_delay(attempt, &e) {
                    Some(delay) => {
                        log::warn!(
                            "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                            what,
                            attempt,
                            max_attempts,
                            e,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        waited.push(delay);
                    }
                    None => {
                        log::error!(
                            "{} failed after {} attempt(s), giving up: {}",
                            what,
                            attempt,
                            e
                        );
                        return Err(Error::RetriesExhausted {
                            attempts: attempt,
                            waited,
                            last: Box::new(e),
                        });
                    }
                },
            }
        }
    }
}

/// Policies per action class, plus the one used for the login exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub read: RetryPolicy,
    pub write: RetryPolicy,
    pub login: RetryPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        RetryConfig {
            read: RetryPolicy::once(),
            write: RetryPolicy::new(5, Backoff::default()),
            login: RetryPolicy::once(),
        }
    }
}

impl RetryConfig {
    pub fn for_class(&self, class: ActionClass) -> &RetryPolicy {
        match class {
            ActionClass::Read => &self.read,
            ActionClass::Write => &self.write,
        }
    }
}
