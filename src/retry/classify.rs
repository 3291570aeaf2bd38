//! Failure classification.
//!
//! A retry loop decides whether to keep going by looking at the *kind* of a
//! failure rather than its concrete value. Error types opt in by implementing
//! [`Classify`]; a policy keeps a [`NonRetryable`] set of kinds that stop the
//! loop on first sight.

use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// Maps a failure onto a kind used for retry decisions.
///
/// Fieldless enums usually serve as their own kind:
///
/// ```rust
/// use retrier::Classify;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum FetchError {
///     Timeout,
///     NotFound,
/// }
///
/// impl Classify for FetchError {
///     type Kind = Self;
///
///     fn kind(&self) -> Self::Kind {
///         *self
///     }
/// }
///
/// assert_eq!(FetchError::NotFound.kind(), FetchError::NotFound);
/// ```
pub trait Classify {
    /// The kind identifier stored in a [`NonRetryable`] set.
    type Kind: Eq + Hash;

    /// The kind of this failure.
    fn kind(&self) -> Self::Kind;
}

impl Classify for std::io::Error {
    type Kind = std::io::ErrorKind;

    fn kind(&self) -> Self::Kind {
        std::io::Error::kind(self)
    }
}

/// An immutable set of failure kinds that must not be retried.
///
/// Cloning is cheap: clones share the same underlying set. There is no way to
/// add to a set in place; a policy is reconfigured by building a new set.
///
/// # Examples
///
/// ```rust
/// use retrier::NonRetryable;
/// use std::io::ErrorKind;
///
/// let set: NonRetryable<ErrorKind> = [ErrorKind::NotFound, ErrorKind::PermissionDenied]
///     .into_iter()
///     .collect();
///
/// assert!(set.contains(&ErrorKind::NotFound));
/// assert!(!set.contains(&ErrorKind::TimedOut));
/// assert_eq!(set.len(), 2);
/// ```
pub struct NonRetryable<K> {
    kinds: Arc<HashSet<K>>,
}

impl<K: Eq + Hash> NonRetryable<K> {
    /// An empty set: every failure is retried.
    pub fn empty() -> Self {
        Self {
            kinds: Arc::new(HashSet::new()),
        }
    }

    /// Returns true if `kind` is registered as non-retryable.
    pub fn contains(&self, kind: &K) -> bool {
        self.kinds.contains(kind)
    }

    /// Number of registered kinds.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Returns true if no kind is registered.
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Iterate over the registered kinds in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.kinds.iter()
    }
}

impl<K: Eq + Hash> Default for NonRetryable<K> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<K> Clone for NonRetryable<K> {
    fn clone(&self) -> Self {
        Self {
            kinds: Arc::clone(&self.kinds),
        }
    }
}

impl<K: Eq + Hash> FromIterator<K> for NonRetryable<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self {
            kinds: Arc::new(iter.into_iter().collect()),
        }
    }
}

impl<K: Eq + Hash> PartialEq for NonRetryable<K> {
    fn eq(&self, other: &Self) -> bool {
        self.kinds == other.kinds
    }
}

impl<K: Eq + Hash> Eq for NonRetryable<K> {}

impl<K: fmt::Debug> fmt::Debug for NonRetryable<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.kinds.iter()).finish()
    }
}
