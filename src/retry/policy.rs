//! Retry policy types and configuration.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use super::classify::NonRetryable;
use super::error::ConfigError;
use super::sleep::{Sleeper, ThreadSleeper};

/// The wait schedule of a retry strategy.
///
/// A backoff is pure data: given the index of the next attempt it says how
/// long to wait first, or that no further attempt is allowed. Attempt `0` is
/// the initial invocation and never waits.
///
/// # Examples
///
/// ```rust
/// use retrier::Backoff;
/// use std::time::Duration;
///
/// let backoff = Backoff::Fibonacci {
///     offset: Duration::from_millis(100),
///     max_fib: 5,
/// };
///
/// let delays: Vec<_> = backoff.delays().collect();
/// assert_eq!(
///     delays,
///     vec![
///         Duration::from_millis(100),
///         Duration::from_millis(100),
///         Duration::from_millis(200),
///         Duration::from_millis(300),
///     ]
/// );
/// assert_eq!(backoff.max_attempts(), 5);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Constant wait between at most `max_attempts` invocations.
    Fixed {
        /// Wait between attempts.
        delay: Duration,
        /// Total invocations allowed.
        max_attempts: u32,
    },
    /// Waits `base^n` milliseconds before attempt `n`, for `n` up to `max_exponent`.
    Exponential {
        /// Base of the power, in milliseconds.
        base: f64,
        /// Largest exponent used; allows `max_exponent + 1` invocations.
        max_exponent: u32,
    },
    /// Waits follow the Fibonacci sequence scaled by `offset`.
    Fibonacci {
        /// The first two waits.
        offset: Duration,
        /// Total invocations allowed.
        max_fib: u32,
    },
    /// A single retry after `delay`.
    OneShot {
        /// Wait before the retry.
        delay: Duration,
    },
}

impl Backoff {
    /// Default wait for [`Backoff::Fixed`].
    pub const DEFAULT_FIXED_DELAY: Duration = Duration::from_secs(5);
    /// Default attempt limit for [`Backoff::Fixed`].
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;
    /// Default base for [`Backoff::Exponential`].
    pub const DEFAULT_BASE: f64 = 10.0;
    /// Default exponent limit for [`Backoff::Exponential`].
    pub const DEFAULT_MAX_EXPONENT: u32 = 4;
    /// Default offset for [`Backoff::Fibonacci`].
    pub const DEFAULT_OFFSET: Duration = Duration::from_millis(100);
    /// Default attempt limit for [`Backoff::Fibonacci`].
    pub const DEFAULT_MAX_FIB: u32 = 10;
    /// Default wait for [`Backoff::OneShot`].
    pub const DEFAULT_ONE_SHOT_DELAY: Duration = Duration::ZERO;

    /// Short name of the strategy, used in log spans.
    pub fn name(&self) -> &'static str {
        match self {
            Backoff::Fixed { .. } => "fixed",
            Backoff::Exponential { .. } => "exponential",
            Backoff::Fibonacci { .. } => "fibonacci",
            Backoff::OneShot { .. } => "one_shot",
        }
    }

    /// Check the parameters.
    ///
    /// Limits must be greater than zero, the Fibonacci offset must be
    /// non-zero and the exponential base must be a finite positive number.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Backoff::Fixed { max_attempts, .. } => positive(max_attempts, "max_attempts"),
            Backoff::Exponential { base, max_exponent } => {
                if !base.is_finite() || base <= 0.0 {
                    return Err(ConfigError::InvalidBase { base });
                }
                positive(max_exponent, "max_exponent")
            }
            Backoff::Fibonacci { offset, max_fib } => {
                if offset.is_zero() {
                    return Err(ConfigError::NonPositive { parameter: "offset" });
                }
                positive(max_fib, "max_fib")
            }
            Backoff::OneShot { .. } => Ok(()),
        }
    }

    /// Total invocations of the work for a work that never succeeds.
    pub fn max_attempts(&self) -> u32 {
        match *self {
            Backoff::Fixed { max_attempts, .. } => max_attempts,
            Backoff::Exponential { max_exponent, .. } => max_exponent.saturating_add(1),
            Backoff::Fibonacci { max_fib, .. } => max_fib,
            Backoff::OneShot { .. } => 2,
        }
    }

    /// The wait before attempt `attempt` (0-indexed).
    ///
    /// Returns `None` for the initial attempt and for any attempt past the
    /// limit.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use retrier::Backoff;
    /// use std::time::Duration;
    ///
    /// let backoff = Backoff::Exponential { base: 10.0, max_exponent: 3 };
    ///
    /// assert_eq!(backoff.delay_for_attempt(0), None);
    /// assert_eq!(backoff.delay_for_attempt(1), Some(Duration::from_millis(10)));
    /// assert_eq!(backoff.delay_for_attempt(2), Some(Duration::from_millis(100)));
    /// assert_eq!(backoff.delay_for_attempt(3), Some(Duration::from_millis(1000)));
    /// assert_eq!(backoff.delay_for_attempt(4), None);
    /// ```
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt >= self.max_attempts() {
            return None;
        }

        let delay = match *self {
            Backoff::Fixed { delay, .. } | Backoff::OneShot { delay } => delay,
            Backoff::Exponential { base, .. } => power_millis(base, attempt),
            Backoff::Fibonacci { offset, .. } => scale(offset, fibonacci(attempt)),
        };
        Some(delay)
    }

    /// Every wait of the schedule, in order.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let backoff = *self;
        (1..backoff.max_attempts()).filter_map(move |attempt| backoff.delay_for_attempt(attempt))
    }

    /// Sum of every wait of the schedule.
    pub fn total_delay(&self) -> Duration {
        self.delays()
            .fold(Duration::ZERO, |total, delay| total.saturating_add(delay))
    }
}

fn positive(value: u32, parameter: &'static str) -> Result<(), ConfigError> {
    if value == 0 {
        Err(ConfigError::NonPositive { parameter })
    } else {
        Ok(())
    }
}

/// `base^exponent` milliseconds, saturating at [`Duration::MAX`].
fn power_millis(base: f64, exponent: u32) -> Duration {
    let millis = base.powi(exponent.min(i32::MAX as u32) as i32);
    let nanos = (millis * 1_000_000.0).round();
    if nanos < u64::MAX as f64 {
        Duration::from_nanos(nanos as u64)
    } else {
        Duration::try_from_secs_f64(millis / 1000.0).unwrap_or(Duration::MAX)
    }
}

/// Calculate the nth Fibonacci number.
fn fibonacci(n: u32) -> u128 {
    if n == 0 {
        return 0;
    }
    let mut a = 0u128;
    let mut b = 1u128;
    for _ in 1..n {
        let temp = a.saturating_add(b);
        a = b;
        b = temp;
    }
    b
}

/// `duration * factor`, saturating at [`Duration::MAX`].
fn scale(duration: Duration, factor: u128) -> Duration {
    let nanos = duration.as_nanos().saturating_mul(factor);
    match u64::try_from(nanos / 1_000_000_000) {
        Ok(secs) => Duration::new(secs, (nanos % 1_000_000_000) as u32),
        Err(_) => Duration::MAX,
    }
}

/// Information about a failed attempt, passed to [`RetryPolicy::on_retry`] hooks.
#[derive(Debug, Clone)]
pub struct RetryEvent<'a, K> {
    /// Which attempt just failed (1-indexed).
    pub attempt: u32,
    /// Kind of the failure.
    pub kind: &'a K,
    /// Wait before the next attempt.
    pub next_delay: Duration,
    /// Total elapsed time since the first attempt.
    pub elapsed: Duration,
}

type RetryHook<K> = Arc<dyn Fn(&RetryEvent<'_, K>) + Send + Sync>;

/// A retry strategy: a [`Backoff`] schedule plus the failure kinds that must
/// not be retried.
///
/// A policy is immutable once built. Every `perform` call starts with a
/// fresh attempt budget, and one policy can drive many loops at the same
/// time. Reconfiguring methods consume the policy and return a new one.
///
/// `K` is the failure kind produced by [`Classify`](super::Classify) on the
/// work's error type.
///
/// # Examples
///
/// ```rust
/// use retrier::RetryPolicy;
/// use std::io;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::fixed_with(Duration::from_millis(1), 5)
///     .unwrap()
///     .non_retryable([io::ErrorKind::NotFound]);
///
/// let mut calls = 0;
/// let err = policy
///     .perform(|| {
///         calls += 1;
///         Err(io::Error::new(io::ErrorKind::NotFound, "missing"))
///     })
///     .unwrap_err();
///
/// assert!(err.is_non_retryable());
/// assert_eq!(calls, 1);
/// ```
pub struct RetryPolicy<K> {
    pub(crate) backoff: Backoff,
    pub(crate) non_retryable: NonRetryable<K>,
    pub(crate) sleeper: Arc<dyn Sleeper>,
    pub(crate) on_retry: Option<RetryHook<K>>,
}

impl<K: Eq + Hash> RetryPolicy<K> {
    /// Build a policy from a backoff schedule, validating its parameters.
    pub fn from_backoff(backoff: Backoff) -> Result<Self, ConfigError> {
        backoff.validate()?;
        Ok(Self::from_valid(backoff))
    }

    fn from_valid(backoff: Backoff) -> Self {
        Self {
            backoff,
            non_retryable: NonRetryable::empty(),
            sleeper: Arc::new(ThreadSleeper),
            on_retry: None,
        }
    }

    /// Constant 5 second wait, at most 10 attempts.
    pub fn fixed() -> Self {
        Self::from_valid(Backoff::Fixed {
            delay: Backoff::DEFAULT_FIXED_DELAY,
            max_attempts: Backoff::DEFAULT_MAX_ATTEMPTS,
        })
    }

    /// Constant `delay` between at most `max_attempts` invocations.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use retrier::{ConfigError, RetryPolicy};
    /// use std::io;
    /// use std::time::Duration;
    ///
    /// let policy = RetryPolicy::<io::ErrorKind>::fixed_with(Duration::from_millis(500), 3).unwrap();
    /// assert_eq!(policy.delay_for_attempt(1), Some(Duration::from_millis(500)));
    /// assert_eq!(policy.delay_for_attempt(2), Some(Duration::from_millis(500)));
    /// assert_eq!(policy.delay_for_attempt(3), None);
    ///
    /// let err = RetryPolicy::<io::ErrorKind>::fixed_with(Duration::from_secs(1), 0).unwrap_err();
    /// assert_eq!(err, ConfigError::NonPositive { parameter: "max_attempts" });
    /// ```
    pub fn fixed_with(delay: Duration, max_attempts: u32) -> Result<Self, ConfigError> {
        Self::from_backoff(Backoff::Fixed {
            delay,
            max_attempts,
        })
    }

    /// Exponential backoff with base 10ms and max exponent 4.
    pub fn exponential() -> Self {
        Self::from_valid(Backoff::Exponential {
            base: Backoff::DEFAULT_BASE,
            max_exponent: Backoff::DEFAULT_MAX_EXPONENT,
        })
    }

    /// Waits `base^n` milliseconds before attempt `n`, for `n` in `1..=max_exponent`.
    pub fn exponential_with(base: f64, max_exponent: u32) -> Result<Self, ConfigError> {
        Self::from_backoff(Backoff::Exponential { base, max_exponent })
    }

    /// Fibonacci backoff starting at 100ms, at most 10 attempts.
    pub fn fibonacci() -> Self {
        Self::from_valid(Backoff::Fibonacci {
            offset: Backoff::DEFAULT_OFFSET,
            max_fib: Backoff::DEFAULT_MAX_FIB,
        })
    }

    /// Fibonacci waits scaled by `offset`, at most `max_fib` invocations.
    ///
    /// With an offset of 100ms the waits are 100ms, 100ms, 200ms, 300ms, 500ms...
    pub fn fibonacci_with(offset: Duration, max_fib: u32) -> Result<Self, ConfigError> {
        Self::from_backoff(Backoff::Fibonacci { offset, max_fib })
    }

    /// One immediate retry.
    pub fn one_shot() -> Self {
        Self::one_shot_with(Backoff::DEFAULT_ONE_SHOT_DELAY)
    }

    /// One retry after `delay`.
    pub fn one_shot_with(delay: Duration) -> Self {
        Self::from_valid(Backoff::OneShot { delay })
    }

    /// Replace the set of failure kinds that are never retried.
    ///
    /// The previous set is discarded, not merged.
    pub fn non_retryable<I>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = K>,
    {
        self.non_retryable = kinds.into_iter().collect();
        self
    }

    /// Wait between attempts through `sleeper` instead of blocking the thread.
    pub fn with_sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Call `hook` after each retryable failure, before waiting.
    ///
    /// The hook only observes; it cannot change what the loop does next.
    /// Installing a hook replaces any previous one.
    pub fn on_retry<H>(mut self, hook: H) -> Self
    where
        H: Fn(&RetryEvent<'_, K>) + Send + Sync + 'static,
    {
        self.on_retry = Some(Arc::new(hook));
        self
    }

    /// Returns true unless `kind` is registered as non-retryable.
    pub fn is_retryable(&self, kind: &K) -> bool {
        !self.non_retryable.contains(kind)
    }
}

impl<K> RetryPolicy<K> {
    /// The wait schedule.
    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    /// The failure kinds that are never retried.
    pub fn non_retryable_kinds(&self) -> &NonRetryable<K> {
        &self.non_retryable
    }

    /// See [`Backoff::delay_for_attempt`].
    pub fn delay_for_attempt(&self, attempt: u32) -> Option<Duration> {
        self.backoff.delay_for_attempt(attempt)
    }

    /// See [`Backoff::max_attempts`].
    pub fn max_attempts(&self) -> u32 {
        self.backoff.max_attempts()
    }

    /// See [`Backoff::delays`].
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        self.backoff.delays()
    }
}

impl<K> Clone for RetryPolicy<K> {
    fn clone(&self) -> Self {
        Self {
            backoff: self.backoff,
            non_retryable: self.non_retryable.clone(),
            sleeper: Arc::clone(&self.sleeper),
            on_retry: self.on_retry.clone(),
        }
    }
}

impl<K: fmt::Debug> fmt::Debug for RetryPolicy<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("backoff", &self.backoff)
            .field("non_retryable", &self.non_retryable)
            .field("sleeper", &"<sleeper>")
            .field("on_retry", &self.on_retry.as_ref().map(|_| "<hook>"))
            .finish()
    }
}

#[cfg(feature = "proptest")]
use proptest::prelude::*;

#[cfg(feature = "proptest")]
impl Arbitrary for Backoff {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    /// Valid schedules with small limits and millisecond waits.
    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        let millis = (0u64..1_000).prop_map(Duration::from_millis);
        prop_oneof![
            (millis.clone(), 1u32..20).prop_map(|(delay, max_attempts)| Backoff::Fixed {
                delay,
                max_attempts
            }),
            (1.0f64..20.0, 1u32..8).prop_map(|(base, max_exponent)| Backoff::Exponential {
                base,
                max_exponent
            }),
            (1u64..1_000, 1u32..20).prop_map(|(offset, max_fib)| Backoff::Fibonacci {
                offset: Duration::from_millis(offset),
                max_fib
            }),
            millis.prop_map(|delay| Backoff::OneShot { delay }),
        ]
        .boxed()
    }
}
