//! The blocking attempt loop shared by every strategy.

use std::hash::Hash;
use std::time::Instant;

use super::classify::Classify;
use super::error::{RetryError, Termination};
use super::policy::{RetryEvent, RetryPolicy};

impl<K: Eq + Hash> RetryPolicy<K> {
    /// Run `work` until it succeeds, retrying failures per this policy.
    ///
    /// Blocks the calling thread during the waits between attempts.
    ///
    /// # Errors
    ///
    /// Returns a [`RetryError`] holding every failure when the attempt budget
    /// runs out or a failure of a non-retryable kind occurs.
    pub fn perform<E, F>(&self, work: F) -> Result<(), RetryError<E>>
    where
        F: FnMut() -> Result<(), E>,
        E: Classify<Kind = K>,
    {
        self.perform_and_get(work)
    }

    /// Run `work` until it produces a value, retrying failures per this policy.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use retrier::{Classify, RetryPolicy};
    /// use std::time::Duration;
    ///
    /// #[derive(Debug)]
    /// struct Busy;
    ///
    /// impl Classify for Busy {
    ///     type Kind = ();
    ///     fn kind(&self) -> Self::Kind {}
    /// }
    ///
    /// let policy = RetryPolicy::fibonacci_with(Duration::from_millis(1), 5).unwrap();
    /// let mut calls = 0;
    /// let value = policy.perform_and_get(|| {
    ///     calls += 1;
    ///     if calls < 3 { Err(Busy) } else { Ok("ready") }
    /// });
    ///
    /// assert_eq!(value.unwrap(), "ready");
    /// assert_eq!(calls, 3);
    /// ```
    ///
    /// # Errors
    ///
    /// Same as [`perform`](RetryPolicy::perform). A failed loop never turns
    /// into an absent value.
    pub fn perform_and_get<T, E, F>(&self, mut work: F) -> Result<T, RetryError<E>>
    where
        F: FnMut() -> Result<T, E>,
        E: Classify<Kind = K>,
    {
        let span = tracing::debug_span!("retry", strategy = self.backoff.name());
        let _entered = span.enter();

        let start = Instant::now();
        let max_attempts = self.backoff.max_attempts();
        let mut failures = Vec::new();
        let mut attempts = 0u32;

        loop {
            tracing::trace!(attempt = attempts + 1, max_attempts, "running attempt");
            let error = match work() {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };
            attempts += 1;

            let kind = error.kind();
            failures.push(error);

            if !self.is_retryable(&kind) {
                tracing::debug!(attempts, "non-retryable failure, giving up");
                return Err(RetryError::new(
                    Termination::NonRetryable,
                    failures,
                    attempts,
                    start.elapsed(),
                ));
            }

            let Some(delay) = self.backoff.delay_for_attempt(attempts) else {
                tracing::debug!(attempts, "retry attempts exhausted");
                return Err(RetryError::new(
                    Termination::Exhausted,
                    failures,
                    attempts,
                    start.elapsed(),
                ));
            };

            tracing::warn!(
                attempt = attempts,
                max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "attempt failed, retrying"
            );

            if let Some(hook) = &self.on_retry {
                hook(&RetryEvent {
                    attempt: attempts,
                    kind: &kind,
                    next_delay: delay,
                    elapsed: start.elapsed(),
                });
            }

            self.sleeper.sleep(delay);
        }
    }
}
