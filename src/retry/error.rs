//! Error types for retry operations.

use std::fmt;
use std::time::Duration;

/// Why a retry loop stopped without producing a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Termination {
    /// Every allowed attempt failed.
    Exhausted,
    /// An attempt failed with a kind registered as non-retryable.
    NonRetryable,
    /// The loop never ran because it was spawned on a runtime that had
    /// already shut down.
    ///
    /// Only produced by the async handles; no failure is recorded.
    Cancelled,
}

/// Terminal failure of a retry loop.
///
/// The first failure is the primary error. Every later failure is kept as a
/// suppressed error in the order it happened, so nothing the work reported
/// is lost.
///
/// # Examples
///
/// ```rust
/// use retrier::{Classify, RetryPolicy, Termination};
/// use std::time::Duration;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// struct Flaky(u32);
///
/// impl Classify for Flaky {
///     type Kind = ();
///     fn kind(&self) -> Self::Kind {}
/// }
///
/// let policy = RetryPolicy::fixed_with(Duration::from_millis(1), 3).unwrap();
/// let mut calls = 0;
/// let err = policy
///     .perform(|| {
///         calls += 1;
///         Err(Flaky(calls))
///     })
///     .unwrap_err();
///
/// assert_eq!(err.termination(), Termination::Exhausted);
/// assert_eq!(err.attempts(), 3);
/// assert_eq!(err.first(), Some(&Flaky(1)));
/// assert_eq!(err.suppressed(), &[Flaky(2), Flaky(3)]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryError<E> {
    termination: Termination,
    failures: Vec<E>,
    attempts: u32,
    elapsed: Duration,
}

impl<E> RetryError<E> {
    pub(crate) fn new(
        termination: Termination,
        failures: Vec<E>,
        attempts: u32,
        elapsed: Duration,
    ) -> Self {
        Self {
            termination,
            failures,
            attempts,
            elapsed,
        }
    }

    pub(crate) fn cancelled() -> Self {
        Self::new(Termination::Cancelled, Vec::new(), 0, Duration::ZERO)
    }

    /// Why the loop stopped.
    pub fn termination(&self) -> Termination {
        self.termination
    }

    /// Returns true if every allowed attempt failed.
    pub fn is_exhausted(&self) -> bool {
        self.termination == Termination::Exhausted
    }

    /// Returns true if the loop stopped on a non-retryable failure.
    pub fn is_non_retryable(&self) -> bool {
        self.termination == Termination::NonRetryable
    }

    /// Returns true if the async task was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.termination == Termination::Cancelled
    }

    /// The primary (first) failure. `None` only for [`Termination::Cancelled`].
    pub fn first(&self) -> Option<&E> {
        self.failures.first()
    }

    /// The failure of the final attempt.
    pub fn last(&self) -> Option<&E> {
        self.failures.last()
    }

    /// Failures after the first one, oldest first.
    pub fn suppressed(&self) -> &[E] {
        self.failures.get(1..).unwrap_or(&[])
    }

    /// Every recorded failure, oldest first.
    pub fn failures(&self) -> &[E] {
        &self.failures
    }

    /// Number of times the work was invoked.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Wall time from the first invocation to giving up.
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Extract the primary failure, discarding the rest.
    pub fn into_first(self) -> Option<E> {
        self.failures.into_iter().next()
    }

    /// Extract every recorded failure, oldest first.
    pub fn into_failures(self) -> Vec<E> {
        self.failures
    }

    /// Transform each recorded failure.
    pub fn map<F, E2>(self, f: F) -> RetryError<E2>
    where
        F: FnMut(E) -> E2,
    {
        RetryError {
            termination: self.termination,
            failures: self.failures.into_iter().map(f).collect(),
            attempts: self.attempts,
            elapsed: self.elapsed,
        }
    }
}

impl<E: fmt::Display> fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.termination, self.first()) {
            (Termination::Cancelled, _) | (_, None) => {
                return write!(f, "retry task cancelled before completion");
            }
            (Termination::Exhausted, Some(first)) => write!(
                f,
                "retry exhausted after {} attempts ({:?}): {}",
                self.attempts, self.elapsed, first
            )?,
            (Termination::NonRetryable, Some(first)) => write!(
                f,
                "non-retryable failure after {} attempts ({:?}): {}",
                self.attempts, self.elapsed, first
            )?,
        }

        let suppressed = self.suppressed().len();
        if suppressed > 0 {
            write!(f, " ({} suppressed)", suppressed)?;
        }
        Ok(())
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RetryError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.first().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Error returned when a policy is built from invalid arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A wait duration was required but not provided.
    MissingDuration {
        /// Name of the missing parameter.
        parameter: &'static str,
    },
    /// A limit or duration that must be strictly positive was zero.
    NonPositive {
        /// Name of the offending parameter.
        parameter: &'static str,
    },
    /// The exponential base is not a finite number greater than zero.
    InvalidBase {
        /// The rejected base.
        base: f64,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingDuration { parameter } => {
                write!(f, "`{}` must be provided", parameter)
            }
            ConfigError::NonPositive { parameter } => {
                write!(f, "`{}` must be greater than zero", parameter)
            }
            ConfigError::InvalidBase { base } => {
                write!(f, "exponential base must be finite and positive, got {}", base)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod error_tests {
    use super::*;
    use std::error::Error as _;
    use std::io;

    #[test]
    fn test_retry_error_display_exhausted() {
        let err = RetryError::new(
            Termination::Exhausted,
            vec!["connection failed", "timeout", "timeout"],
            3,
            Duration::from_millis(500),
        );
        let display = format!("{}", err);
        assert!(display.contains("retry exhausted"));
        assert!(display.contains("3 attempts"));
        assert!(display.contains("connection failed"));
        assert!(display.contains("2 suppressed"));
    }

    #[test]
    fn test_retry_error_display_non_retryable() {
        let err = RetryError::new(
            Termination::NonRetryable,
            vec!["forbidden"],
            1,
            Duration::ZERO,
        );
        let display = format!("{}", err);
        assert!(display.starts_with("non-retryable failure"));
        assert!(!display.contains("suppressed"));
    }

    #[test]
    fn test_cancelled_has_no_failures() {
        let err = RetryError::<String>::cancelled();
        assert!(err.is_cancelled());
        assert!(err.first().is_none());
        assert!(err.suppressed().is_empty());
        assert!(format!("{}", err).contains("cancelled"));
    }

    #[test]
    fn test_first_and_suppressed_split() {
        let err = RetryError::new(Termination::Exhausted, vec![1, 2, 3], 3, Duration::ZERO);
        assert_eq!(err.first(), Some(&1));
        assert_eq!(err.last(), Some(&3));
        assert_eq!(err.suppressed(), &[2, 3]);
        assert_eq!(err.into_first(), Some(1));
    }

    #[test]
    fn test_map_keeps_metadata() {
        let err = RetryError::new(
            Termination::NonRetryable,
            vec![1, 2],
            2,
            Duration::from_millis(7),
        );
        let mapped = err.map(|n| n * 10);
        assert_eq!(mapped.failures(), &[10, 20]);
        assert_eq!(mapped.attempts(), 2);
        assert_eq!(mapped.elapsed(), Duration::from_millis(7));
        assert!(mapped.is_non_retryable());
    }

    #[test]
    fn test_source_is_first_failure() {
        let err = RetryError::new(
            Termination::Exhausted,
            vec![
                io::Error::new(io::ErrorKind::TimedOut, "first"),
                io::Error::new(io::ErrorKind::TimedOut, "second"),
            ],
            2,
            Duration::ZERO,
        );
        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "first");
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::NonPositive {
            parameter: "max_attempts",
        };
        assert_eq!(err.to_string(), "`max_attempts` must be greater than zero");

        let err = ConfigError::MissingDuration { parameter: "delay" };
        assert_eq!(err.to_string(), "`delay` must be provided");

        let err = ConfigError::InvalidBase { base: -1.0 };
        assert!(err.to_string().contains("-1"));
    }
}
