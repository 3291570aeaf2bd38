//! Running retry loops off the calling task.
//!
//! The blocking loop is moved onto Tokio's blocking thread pool, which is
//! bounded by the runtime's `max_blocking_threads` setting. The caller gets
//! a [`RetryHandle`] to await.

use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::FusedFuture;
use futures::ready;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use super::classify::Classify;
use super::error::RetryError;
use super::policy::RetryPolicy;

/// A retry loop running on the blocking pool.
///
/// Resolves to the value produced by the work or to the terminal
/// [`RetryError`]. Dropping the handle detaches the loop; it keeps running
/// to completion.
///
/// If the work panics, the panic is resumed on the task awaiting the handle.
/// A loop spawned on a runtime that has already shut down never runs; its
/// handle resolves to [`Termination::Cancelled`](super::Termination::Cancelled).
pub struct RetryHandle<T, E> {
    inner: JoinHandle<Result<T, RetryError<E>>>,
    terminated: bool,
}

impl<T, E> RetryHandle<T, E> {
    fn new(inner: JoinHandle<Result<T, RetryError<E>>>) -> Self {
        Self {
            inner,
            terminated: false,
        }
    }

    /// Returns true once the loop has finished, without waiting.
    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }
}

impl<T, E> Future for RetryHandle<T, E> {
    type Output = Result<T, RetryError<E>>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let joined = ready!(Pin::new(&mut this.inner).poll(cx));
        this.terminated = true;

        match joined {
            Ok(outcome) => Poll::Ready(outcome),
            Err(err) => match err.try_into_panic() {
                Ok(payload) => std::panic::resume_unwind(payload),
                Err(_) => Poll::Ready(Err(RetryError::cancelled())),
            },
        }
    }
}

impl<T, E> FusedFuture for RetryHandle<T, E> {
    fn is_terminated(&self) -> bool {
        self.terminated
    }
}

impl<T, E> fmt::Debug for RetryHandle<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryHandle")
            .field("finished", &self.is_finished())
            .field("terminated", &self.terminated)
            .finish()
    }
}

impl<K> RetryPolicy<K>
where
    K: Eq + Hash + Send + Sync + 'static,
{
    /// Run [`perform`](RetryPolicy::perform) on the blocking pool of the
    /// current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime, like `tokio::spawn`.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use retrier::RetryPolicy;
    /// use std::io;
    /// use std::time::Duration;
    ///
    /// # tokio_test::block_on(async {
    /// let policy = RetryPolicy::fixed_with(Duration::from_millis(1), 3).unwrap();
    ///
    /// let handle = policy.perform_async(|| {
    ///     Err(io::Error::new(io::ErrorKind::TimedOut, "slow"))
    /// });
    ///
    /// let err = handle.await.unwrap_err();
    /// assert!(err.is_exhausted());
    /// assert_eq!(err.attempts(), 3);
    /// # });
    /// ```
    pub fn perform_async<E, F>(&self, work: F) -> RetryHandle<(), E>
    where
        F: FnMut() -> Result<(), E> + Send + 'static,
        E: Classify<Kind = K> + Send + 'static,
    {
        self.perform_and_get_async(work)
    }

    /// Run [`perform_and_get`](RetryPolicy::perform_and_get) on the blocking
    /// pool of the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn perform_and_get_async<T, E, F>(&self, work: F) -> RetryHandle<T, E>
    where
        F: FnMut() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Classify<Kind = K> + Send + 'static,
    {
        self.perform_and_get_async_on(&Handle::current(), work)
    }

    /// Run [`perform`](RetryPolicy::perform) on the blocking pool of `runtime`.
    ///
    /// Usable from threads that are not inside a runtime.
    pub fn perform_async_on<E, F>(&self, runtime: &Handle, work: F) -> RetryHandle<(), E>
    where
        F: FnMut() -> Result<(), E> + Send + 'static,
        E: Classify<Kind = K> + Send + 'static,
    {
        self.perform_and_get_async_on(runtime, work)
    }

    /// Run [`perform_and_get`](RetryPolicy::perform_and_get) on the blocking
    /// pool of `runtime`.
    pub fn perform_and_get_async_on<T, E, F>(&self, runtime: &Handle, work: F) -> RetryHandle<T, E>
    where
        F: FnMut() -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: Classify<Kind = K> + Send + 'static,
    {
        let policy = self.clone();
        let span = tracing::Span::current();
        let inner = runtime.spawn_blocking(move || span.in_scope(|| policy.perform_and_get(work)));
        RetryHandle::new(inner)
    }
}
