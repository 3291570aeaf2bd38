//! Testing utilities for code that retries
//!
//! Real waits make tests slow and timing-sensitive. This module provides a
//! sleeper that only records what it was asked to wait, a work factory that
//! fails a set number of times, and assertion macros for retry outcomes.
//!
//! # Examples
//!
//! ```rust
//! use retrier::testing::{Flaky, RecordingSleeper};
//! use retrier::{assert_exhausted, RetryPolicy};
//! use std::io;
//! use std::time::Duration;
//!
//! let sleeper = RecordingSleeper::new();
//! let policy = RetryPolicy::fixed_with(Duration::from_secs(30), 3)
//!     .unwrap()
//!     .with_sleeper(sleeper.clone());
//!
//! let flaky = Flaky::always();
//! let result = policy.perform(flaky.work((), |_| io::Error::from(io::ErrorKind::TimedOut)));
//!
//! assert_exhausted!(result, 3);
//! assert_eq!(flaky.calls(), 3);
//! assert_eq!(sleeper.recorded(), vec![Duration::from_secs(30); 2]);
//! ```

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::retry::Sleeper;

/// A [`Sleeper`] that returns immediately and remembers every requested wait.
///
/// Clones share the same record, so keep one clone and hand the other to a
/// policy.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    waits: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    /// Create a sleeper with an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every requested wait, in order.
    pub fn recorded(&self) -> Vec<Duration> {
        match self.waits.lock() {
            Ok(waits) => waits.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Sum of every requested wait.
    pub fn total(&self) -> Duration {
        self.recorded().into_iter().sum()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        match self.waits.lock() {
            Ok(mut waits) => waits.push(duration),
            Err(poisoned) => poisoned.into_inner().push(duration),
        }
    }
}

/// Builds work closures that fail a fixed number of times before succeeding.
///
/// Invocations are counted across every closure built from the same `Flaky`
/// (and its clones).
///
/// # Example
///
/// ```rust
/// use retrier::testing::Flaky;
///
/// let flaky = Flaky::new(2);
/// let mut work = flaky.work("done", |call| format!("failure #{}", call));
///
/// assert_eq!(work(), Err("failure #1".to_string()));
/// assert_eq!(work(), Err("failure #2".to_string()));
/// assert_eq!(work(), Ok("done"));
/// assert_eq!(flaky.calls(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct Flaky {
    calls: Arc<AtomicU32>,
    failures: u32,
}

impl Flaky {
    /// Fail the first `failures` invocations, then succeed.
    pub fn new(failures: u32) -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
            failures,
        }
    }

    /// Never succeed.
    pub fn always() -> Self {
        Self::new(u32::MAX)
    }

    /// Number of invocations so far.
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// A work closure returning `value` on success and `error(call)` on
    /// failure, where `call` is the 1-based invocation number.
    pub fn work<T, E, F>(&self, value: T, error: F) -> impl FnMut() -> Result<T, E> + Send + 'static
    where
        T: Clone + Send + 'static,
        F: Fn(u32) -> E + Send + 'static,
    {
        let calls = Arc::clone(&self.calls);
        let failures = self.failures;
        move || {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= failures {
                Err(error(call))
            } else {
                Ok(value.clone())
            }
        }
    }
}

/// Assert that a retry loop gave up after exhausting its attempts.
///
/// With a second argument, also checks the number of attempts.
///
/// # Example
///
/// ```rust
/// use retrier::{assert_exhausted, RetryPolicy};
/// use std::io;
///
/// let policy = RetryPolicy::one_shot();
/// let result = policy.perform(|| Err(io::Error::from(io::ErrorKind::TimedOut)));
/// assert_exhausted!(result, 2);
/// ```
#[macro_export]
macro_rules! assert_exhausted {
    ($result:expr) => {
        match $result {
            Err(err) if err.is_exhausted() => {}
            Err(err) => {
                panic!("Expected Exhausted, got {:?}", err.termination());
            }
            Ok(v) => {
                panic!("Expected Exhausted, got Ok: {:?}", v);
            }
        }
    };
    ($result:expr, $attempts:expr) => {
        match $result {
            Err(err) if err.is_exhausted() => {
                assert_eq!(err.attempts(), $attempts, "unexpected number of attempts");
            }
            Err(err) => {
                panic!("Expected Exhausted, got {:?}", err.termination());
            }
            Ok(v) => {
                panic!("Expected Exhausted, got Ok: {:?}", v);
            }
        }
    };
}

/// Assert that a retry loop stopped on a non-retryable failure.
///
/// # Example
///
/// ```rust
/// use retrier::{assert_non_retryable, RetryPolicy};
/// use std::io;
///
/// let policy = RetryPolicy::fixed().non_retryable([io::ErrorKind::NotFound]);
/// let result = policy.perform(|| Err(io::Error::from(io::ErrorKind::NotFound)));
/// assert_non_retryable!(result);
/// ```
#[macro_export]
macro_rules! assert_non_retryable {
    ($result:expr) => {
        match $result {
            Err(err) if err.is_non_retryable() => {}
            Err(err) => {
                panic!("Expected NonRetryable, got {:?}", err.termination());
            }
            Ok(v) => {
                panic!("Expected NonRetryable, got Ok: {:?}", v);
            }
        }
    };
}
