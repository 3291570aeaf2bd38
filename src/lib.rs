//! # Retrier
//!
//! Blocking retry strategies with a pure, inspectable wait schedule.
//!
//! Wrap a unit of work in a [`RetryPolicy`] and it is re-invoked on failure
//! with a fixed, exponential, Fibonacci or one-shot backoff. Failures whose
//! kind is registered as non-retryable stop the loop immediately.
//!
//! ## Quick Example
//!
//! ```rust
//! use retrier::{Classify, RetryPolicy};
//! use std::time::Duration;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum FetchError {
//!     Unavailable,
//!     Forbidden,
//! }
//!
//! impl Classify for FetchError {
//!     type Kind = Self;
//!     fn kind(&self) -> Self {
//!         *self
//!     }
//! }
//!
//! let policy = RetryPolicy::fibonacci_with(Duration::from_millis(1), 4)
//!     .unwrap()
//!     .non_retryable([FetchError::Forbidden]);
//!
//! // Retried until the attempt budget runs out
//! let err = policy.perform(|| Err(FetchError::Unavailable)).unwrap_err();
//! assert!(err.is_exhausted());
//! assert_eq!(err.attempts(), 4);
//!
//! // Stops on the first non-retryable failure
//! let err = policy.perform(|| Err(FetchError::Forbidden)).unwrap_err();
//! assert!(err.is_non_retryable());
//! assert_eq!(err.attempts(), 1);
//! ```
//!
//! ## Features
//!
//! - `async` (default): [`RetryHandle`] and the `perform_*_async` methods,
//!   running loops on Tokio's blocking pool
//! - `serde`: [`PolicyConfig`] for reading policies from configuration
//! - `proptest`: `Arbitrary` for [`Backoff`]

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod retry;
pub mod testing;

// Re-exports
pub use retry::{
    Backoff, Classify, ConfigError, Interruptible, NonRetryable, RetryError, RetryEvent,
    RetryPolicy, Sleeper, Termination, ThreadSleeper,
};
#[cfg(feature = "async")]
pub use retry::RetryHandle;
#[cfg(feature = "serde")]
pub use retry::{PolicyConfig, StrategyConfig};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::retry::{Backoff, Classify, RetryError, RetryPolicy, Termination};
    #[cfg(feature = "async")]
    pub use crate::retry::RetryHandle;
}
