//! Composable retry policies.
//!
//! A `RetryPolicy` is a predicate, an attempt ceiling and an exponential
//! backoff. Nesting is done by calling one policy's `run` from inside
//! another's attempt function; the command executor builds its two scopes
//! that way.

use std::thread;
use std::time::Duration;

use tracing::warn;

/// Suspends the caller between attempts.
pub trait Sleep: Send + Sync {
    /// Only called with non-zero delays. Returning `Err` aborts the retry
    /// loop (e.g. on cancellation); the error that triggered the wait is
    /// surfaced unchanged.
    fn sleep(&self, delay: Duration) -> Result<(), Cancelled>;
}

/// The wait before a retry was interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

/// Blocks the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl Sleep for ThreadSleep {
    fn sleep(&self, delay: Duration) -> Result<(), Cancelled> {
        thread::sleep(delay);
        Ok(())
    }
}

pub struct RetryPolicy<E> {
    max_attempts: u32,
    base_interval: Duration,
    multiplier: u32,
    retry_on: fn(&E) -> bool,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for RetryPolicy<E> {}

impl<E> std::fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("base_interval", &self.base_interval)
            .field("multiplier", &self.multiplier)
            .finish()
    }
}

impl<E> RetryPolicy<E> {
    /// Retries errors matching `retry_on` with no delay in between.
    pub fn new(max_attempts: u32, retry_on: fn(&E) -> bool) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_interval: Duration::ZERO,
            multiplier: 1,
            retry_on,
        }
    }

    pub fn backoff(mut self, base_interval: Duration, multiplier: u32) -> Self {
        self.base_interval = base_interval;
        self.multiplier = multiplier.max(1);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `retry` (1-based): base * multiplier^(retry-1).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        let factor = self.multiplier.saturating_pow(exponent);
        self.base_interval.saturating_mul(factor)
    }

    /// Drive `attempt` until it succeeds, fails with an error the predicate
    /// rejects, or the attempt ceiling is reached. `before_retry` runs after
    /// the backoff and before the next attempt.
    pub fn run<S, T>(
        &self,
        state: &mut S,
        sleeper: &dyn Sleep,
        mut attempt: impl FnMut(&mut S, u32) -> Result<T, E>,
        mut before_retry: impl FnMut(&mut S, &E, u32),
    ) -> Result<T, E> {
        let mut number = 1;
        loop {
            let err = match attempt(state, number) {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };
            if number >= self.max_attempts || !(self.retry_on)(&err) {
                return Err(err);
            }
            let delay = self.delay_for(number);
            if !delay.is_zero() && sleeper.sleep(delay).is_err() {
                warn!(attempt = number, "retry wait cancelled");
                return Err(err);
            }
            before_retry(state, &err, number);
            number += 1;
        }
    }
}
