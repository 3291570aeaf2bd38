//! Declarative policy configuration (feature-gated)
//!
//! [`PolicyConfig`] lets a policy be read from any serde format. Fields left
//! out fall back to the strategy defaults; a duration written as an explicit
//! `null` is rejected when the policy is built. Unknown fields, and fields
//! that belong to another strategy, fail deserialization.
//!
//! # Example
//!
//! ```rust,ignore
//! use retrier::PolicyConfig;
//!
//! let json = r#"{ "strategy": "fibonacci", "offset_ms": 50, "max_fib": 4 }"#;
//! let config: PolicyConfig<String> = serde_json::from_str(json).unwrap();
//! let policy = config.build().unwrap();
//! assert_eq!(policy.max_attempts(), 4);
//! ```

use std::hash::Hash;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use super::error::ConfigError;
use super::policy::{Backoff, RetryPolicy};

/// Serializable description of a [`RetryPolicy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPolicyConfig<K>")]
pub struct PolicyConfig<K> {
    /// The wait schedule.
    #[serde(flatten)]
    pub strategy: StrategyConfig,
    /// Failure kinds that must not be retried.
    #[serde(default = "Vec::new")]
    pub non_retryable: Vec<K>,
}

// `deny_unknown_fields` has no effect through `flatten`, so the flat form is
// read into one struct holding every strategy's fields and checked here.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPolicyConfig<K> {
    strategy: StrategyName,
    #[serde(default, deserialize_with = "present")]
    delay_ms: Option<Option<u64>>,
    #[serde(default)]
    max_attempts: Option<u32>,
    #[serde(default)]
    base: Option<f64>,
    #[serde(default)]
    max_exponent: Option<u32>,
    #[serde(default, deserialize_with = "present")]
    offset_ms: Option<Option<u64>>,
    #[serde(default)]
    max_fib: Option<u32>,
    #[serde(default = "Vec::new")]
    non_retryable: Vec<K>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "snake_case")]
enum StrategyName {
    Fixed,
    Exponential,
    Fibonacci,
    OneShot,
}

impl<K> TryFrom<RawPolicyConfig<K>> for PolicyConfig<K> {
    type Error = String;

    fn try_from(raw: RawPolicyConfig<K>) -> Result<Self, Self::Error> {
        let given = [
            ("delay_ms", raw.delay_ms.is_some()),
            ("max_attempts", raw.max_attempts.is_some()),
            ("base", raw.base.is_some()),
            ("max_exponent", raw.max_exponent.is_some()),
            ("offset_ms", raw.offset_ms.is_some()),
            ("max_fib", raw.max_fib.is_some()),
        ];

        let (name, allowed, strategy): (&str, &[&str], _) = match raw.strategy {
            StrategyName::Fixed => (
                "fixed",
                &["delay_ms", "max_attempts"][..],
                StrategyConfig::Fixed {
                    delay_ms: raw.delay_ms,
                    max_attempts: raw.max_attempts,
                },
            ),
            StrategyName::Exponential => (
                "exponential",
                &["base", "max_exponent"][..],
                StrategyConfig::Exponential {
                    base: raw.base,
                    max_exponent: raw.max_exponent,
                },
            ),
            StrategyName::Fibonacci => (
                "fibonacci",
                &["offset_ms", "max_fib"][..],
                StrategyConfig::Fibonacci {
                    offset_ms: raw.offset_ms,
                    max_fib: raw.max_fib,
                },
            ),
            StrategyName::OneShot => (
                "one_shot",
                &["delay_ms"][..],
                StrategyConfig::OneShot {
                    delay_ms: raw.delay_ms,
                },
            ),
        };

        if let Some((field, _)) = given
            .iter()
            .find(|(field, set)| *set && !allowed.contains(field))
        {
            return Err(format!(
                "field `{}` does not apply to the `{}` strategy",
                field, name
            ));
        }

        Ok(PolicyConfig {
            strategy,
            non_retryable: raw.non_retryable,
        })
    }
}

/// Serializable description of a [`Backoff`].
///
/// `Some(None)` marks a duration written as `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// See [`Backoff::Fixed`].
    Fixed {
        /// Wait between attempts in milliseconds.
        #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
        delay_ms: Option<Option<u64>>,
        /// Total invocations allowed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_attempts: Option<u32>,
    },
    /// See [`Backoff::Exponential`].
    Exponential {
        /// Base of the power, in milliseconds.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        base: Option<f64>,
        /// Largest exponent used.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_exponent: Option<u32>,
    },
    /// See [`Backoff::Fibonacci`].
    Fibonacci {
        /// The first two waits in milliseconds.
        #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
        offset_ms: Option<Option<u64>>,
        /// Total invocations allowed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_fib: Option<u32>,
    },
    /// See [`Backoff::OneShot`].
    OneShot {
        /// Wait before the retry in milliseconds.
        #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
        delay_ms: Option<Option<u64>>,
    },
}

/// Wraps whatever was written, including `null`, in `Some`.
fn present<'de, D>(deserializer: D) -> Result<Option<Option<u64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<u64>::deserialize(deserializer).map(Some)
}

fn millis(
    value: Option<Option<u64>>,
    default: Duration,
    parameter: &'static str,
) -> Result<Duration, ConfigError> {
    match value {
        None => Ok(default),
        Some(None) => Err(ConfigError::MissingDuration { parameter }),
        Some(Some(ms)) => Ok(Duration::from_millis(ms)),
    }
}

impl StrategyConfig {
    /// Resolve defaults and validate.
    pub fn to_backoff(&self) -> Result<Backoff, ConfigError> {
        let backoff = match *self {
            StrategyConfig::Fixed {
                delay_ms,
                max_attempts,
            } => Backoff::Fixed {
                delay: millis(delay_ms, Backoff::DEFAULT_FIXED_DELAY, "delay_ms")?,
                max_attempts: max_attempts.unwrap_or(Backoff::DEFAULT_MAX_ATTEMPTS),
            },
            StrategyConfig::Exponential { base, max_exponent } => Backoff::Exponential {
                base: base.unwrap_or(Backoff::DEFAULT_BASE),
                max_exponent: max_exponent.unwrap_or(Backoff::DEFAULT_MAX_EXPONENT),
            },
            StrategyConfig::Fibonacci { offset_ms, max_fib } => Backoff::Fibonacci {
                offset: millis(offset_ms, Backoff::DEFAULT_OFFSET, "offset_ms")?,
                max_fib: max_fib.unwrap_or(Backoff::DEFAULT_MAX_FIB),
            },
            StrategyConfig::OneShot { delay_ms } => Backoff::OneShot {
                delay: millis(delay_ms, Backoff::DEFAULT_ONE_SHOT_DELAY, "delay_ms")?,
            },
        };
        backoff.validate()?;
        Ok(backoff)
    }
}

impl<K: Eq + Hash + Clone> PolicyConfig<K> {
    /// Build the policy this configuration describes.
    pub fn build(&self) -> Result<RetryPolicy<K>, ConfigError> {
        let backoff = self.strategy.to_backoff()?;
        Ok(RetryPolicy::from_backoff(backoff)?.non_retryable(self.non_retryable.iter().cloned()))
    }
}
