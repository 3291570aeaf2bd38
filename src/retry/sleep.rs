//! The clock collaborator used between attempts.
//!
//! Every retry loop waits through a [`Sleeper`]. The default,
//! [`ThreadSleeper`], blocks the calling thread. [`Interruptible`] can be
//! woken early from another thread; an early wake-up just shortens the wait.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

/// Blocks the calling thread for a duration.
///
/// Implementations must be safe to share between threads because a policy
/// may be driving several retry loops at once.
pub trait Sleeper: Send + Sync {
    /// Wait for `duration` to pass. Returning early is allowed.
    fn sleep(&self, duration: Duration);
}

/// Sleeps with [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

impl<S: Sleeper + ?Sized> Sleeper for Arc<S> {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// A sleeper whose waits can be cut short.
///
/// Clones share the same wake-up signal, so a clone kept by another thread
/// can call [`interrupt`](Interruptible::interrupt) while a retry loop waits.
/// An interrupt wakes every wait in progress and is then consumed.
///
/// # Examples
///
/// ```rust
/// use retrier::Interruptible;
/// use retrier::Sleeper;
/// use std::time::{Duration, Instant};
///
/// let sleeper = Interruptible::new();
/// let remote = sleeper.clone();
///
/// let waker = std::thread::spawn(move || {
///     std::thread::sleep(Duration::from_millis(20));
///     remote.interrupt();
/// });
///
/// let start = Instant::now();
/// sleeper.sleep(Duration::from_secs(10));
/// assert!(start.elapsed() < Duration::from_secs(10));
/// waker.join().unwrap();
/// ```
#[derive(Clone, Default)]
pub struct Interruptible {
    signal: Arc<Signal>,
}

#[derive(Default)]
struct Signal {
    generation: Mutex<u64>,
    wake: Condvar,
}

impl Interruptible {
    /// Create a sleeper with no pending interrupt.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wake every thread currently waiting on this sleeper (or a clone).
    pub fn interrupt(&self) {
        let mut generation = match self.signal.generation.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *generation = generation.wrapping_add(1);
        self.signal.wake.notify_all();
    }
}

impl Sleeper for Interruptible {
    fn sleep(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }

        let guard = match self.signal.generation.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let started_at = *guard;

        let result = self
            .signal
            .wake
            .wait_timeout_while(guard, duration, |generation| *generation == started_at);

        // A poisoned lock ends the wait early, same as an interrupt.
        if let Ok((_, timeout)) = result {
            if !timeout.timed_out() {
                tracing::trace!("retry wait interrupted");
            }
        }
    }
}

impl fmt::Debug for Interruptible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interruptible").finish_non_exhaustive()
    }
}
