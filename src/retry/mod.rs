//! Retry strategies for blocking work.
//!
//! A [`RetryPolicy`] is built once and then drives any number of attempt
//! loops:
//!
//! - **Pure schedule**: [`Backoff`] is just data, so delays can be inspected
//!   and tested without running anything
//! - **Fresh budget per call**: attempt counters live in the call, never on
//!   the policy
//! - **Nothing lost**: the first failure is reported with every later one
//!   kept as suppressed
//!
//! # Quick Start
//!
//! ```rust
//! use retrier::RetryPolicy;
//! use std::io;
//! use std::time::Duration;
//!
//! let policy = RetryPolicy::exponential_with(2.0, 3)
//!     .unwrap()
//!     .non_retryable([io::ErrorKind::PermissionDenied]);
//!
//! let mut calls = 0;
//! let value = policy.perform_and_get(|| {
//!     calls += 1;
//!     if calls == 1 {
//!         Err(io::Error::from(io::ErrorKind::TimedOut))
//!     } else {
//!         Ok(42)
//!     }
//! });
//!
//! assert_eq!(value.unwrap(), 42);
//! ```
//!
//! # Retry Strategies
//!
//! - **Fixed**: Constant delay between attempts (default 5s, 10 attempts)
//! - **Exponential**: `base^n` milliseconds before attempt `n` (default base 10, max exponent 4)
//! - **Fibonacci**: Delays follow the Fibonacci sequence from an offset (default 100ms, 10 attempts)
//! - **One-shot**: A single retry after a fixed delay (default 0)
//!
//! # Error Types
//!
//! - [`RetryError`]: The terminal failure of a loop, with every recorded error
//! - [`ConfigError`]: Returned when a policy is built from invalid arguments

mod classify;
#[cfg(feature = "serde")]
mod config;
mod error;
mod executor;
mod policy;
mod sleep;
#[cfg(feature = "async")]
mod spawn;

pub use classify::{Classify, NonRetryable};
#[cfg(feature = "serde")]
pub use config::{PolicyConfig, StrategyConfig};
pub use error::{ConfigError, RetryError, Termination};
pub use policy::{Backoff, RetryEvent, RetryPolicy};
pub use sleep::{Interruptible, Sleeper, ThreadSleeper};
#[cfg(feature = "async")]
pub use spawn::RetryHandle;

#[cfg(test)]
mod tests;
