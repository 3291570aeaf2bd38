//! Tests for the attempt loop.

use super::*;
use crate::testing::{Flaky, RecordingSleeper};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_test::traced_test;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum TestError {
    Transient,
    Permanent,
}

impl Classify for TestError {
    type Kind = Self;

    fn kind(&self) -> Self {
        *self
    }
}

#[derive(Debug, PartialEq)]
struct Numbered(u32);

impl Classify for Numbered {
    type Kind = ();

    fn kind(&self) {}
}

fn recorded<K: Eq + std::hash::Hash>(policy: RetryPolicy<K>) -> (RetryPolicy<K>, RecordingSleeper) {
    let sleeper = RecordingSleeper::new();
    (policy.with_sleeper(sleeper.clone()), sleeper)
}

#[test]
fn test_fixed_makes_exactly_max_attempts() {
    let (policy, sleeper) = recorded(RetryPolicy::fixed_with(Duration::from_secs(1), 5).unwrap());
    let flaky = Flaky::always();

    let err = policy
        .perform(flaky.work((), |_| TestError::Transient))
        .unwrap_err();

    assert!(err.is_exhausted());
    assert_eq!(err.attempts(), 5);
    assert_eq!(flaky.calls(), 5);
    // Waits happen between attempts, not after the last one
    assert_eq!(sleeper.recorded(), vec![Duration::from_secs(1); 4]);
    assert_eq!(sleeper.total(), Duration::from_secs(4));
}

#[test]
fn test_succeeds_on_third_of_five_attempts() {
    let (policy, sleeper) = recorded(RetryPolicy::fixed_with(Duration::from_millis(10), 5).unwrap());
    let flaky = Flaky::new(2);

    let value = policy
        .perform_and_get(flaky.work("success", |_| TestError::Transient))
        .unwrap();

    assert_eq!(value, "success");
    assert_eq!(flaky.calls(), 3);
    assert_eq!(sleeper.recorded().len(), 2);
}

#[test]
fn test_non_retryable_stops_immediately() {
    let (policy, sleeper) = recorded(
        RetryPolicy::fixed_with(Duration::from_secs(1), 5)
            .unwrap()
            .non_retryable([TestError::Permanent]),
    );
    let flaky = Flaky::always();

    let err = policy
        .perform(flaky.work((), |_| TestError::Permanent))
        .unwrap_err();

    assert!(err.is_non_retryable());
    assert_eq!(err.attempts(), 1);
    assert_eq!(flaky.calls(), 1);
    assert!(sleeper.recorded().is_empty());
}

#[test]
fn test_non_retryable_after_transient_keeps_first_as_primary() {
    let (policy, _) = recorded(
        RetryPolicy::fixed_with(Duration::from_millis(1), 10)
            .unwrap()
            .non_retryable([TestError::Permanent]),
    );
    let mut calls = 0;

    let err = policy
        .perform(|| {
            calls += 1;
            if calls < 3 {
                Err(TestError::Transient)
            } else {
                Err(TestError::Permanent)
            }
        })
        .unwrap_err();

    assert!(err.is_non_retryable());
    assert_eq!(err.attempts(), 3);
    assert_eq!(err.first(), Some(&TestError::Transient));
    assert_eq!(
        err.suppressed(),
        &[TestError::Transient, TestError::Permanent]
    );
}

#[test]
fn test_exhaustion_keeps_every_failure() {
    let (policy, _) = recorded(RetryPolicy::fibonacci_with(Duration::from_millis(1), 4).unwrap());
    let flaky = Flaky::always();

    let err = policy.perform(flaky.work((), Numbered)).unwrap_err();

    assert_eq!(err.first(), Some(&Numbered(1)));
    assert_eq!(err.suppressed(), &[Numbered(2), Numbered(3), Numbered(4)]);
    assert_eq!(
        err.into_failures(),
        vec![Numbered(1), Numbered(2), Numbered(3), Numbered(4)]
    );
}

#[test]
fn test_registered_kind_only_blocks_that_kind() {
    let (policy, _) = recorded(
        RetryPolicy::fixed_with(Duration::from_millis(1), 3)
            .unwrap()
            .non_retryable([TestError::Permanent]),
    );
    let flaky = Flaky::always();

    let err = policy
        .perform(flaky.work((), |_| TestError::Transient))
        .unwrap_err();

    assert!(err.is_exhausted());
    assert_eq!(flaky.calls(), 3);
}

#[test]
fn test_each_call_gets_a_fresh_budget() {
    let (policy, sleeper) = recorded(RetryPolicy::fixed_with(Duration::from_millis(1), 3).unwrap());

    for _ in 0..3 {
        let flaky = Flaky::always();
        let err = policy
            .perform(flaky.work((), |_| TestError::Transient))
            .unwrap_err();
        assert_eq!(err.attempts(), 3);
        assert_eq!(flaky.calls(), 3);
    }

    assert_eq!(sleeper.recorded().len(), 6);
}

#[test]
fn test_fibonacci_waits_follow_sequence() {
    let (policy, sleeper) =
        recorded(RetryPolicy::fibonacci_with(Duration::from_millis(100), 6).unwrap());

    let _ = policy.perform(Flaky::always().work((), |_| TestError::Transient));

    let waits = sleeper.recorded();
    assert_eq!(waits[0], Duration::from_millis(100));
    assert_eq!(waits[1], Duration::from_millis(100));
    for i in 2..waits.len() {
        assert_eq!(waits[i], waits[i - 1] + waits[i - 2]);
    }
    assert_eq!(waits.len(), 5);
}

#[test]
fn test_exponential_waits_are_powers_of_base() {
    let (policy, sleeper) = recorded(RetryPolicy::exponential());

    let err = policy
        .perform(Flaky::always().work((), |_| TestError::Transient))
        .unwrap_err();

    assert_eq!(err.attempts(), 5);
    assert_eq!(
        sleeper.recorded(),
        vec![
            Duration::from_millis(10),
            Duration::from_millis(100),
            Duration::from_millis(1_000),
            Duration::from_millis(10_000),
        ]
    );
    assert!(sleeper.total() >= Duration::from_millis(10_000));
}

#[test]
fn test_one_shot_invokes_twice() {
    let (policy, sleeper) = recorded(RetryPolicy::one_shot_with(Duration::from_millis(250)));
    let flaky = Flaky::always();

    let err = policy
        .perform(flaky.work((), |_| TestError::Transient))
        .unwrap_err();

    assert_eq!(flaky.calls(), 2);
    assert_eq!(err.attempts(), 2);
    assert_eq!(err.suppressed(), &[TestError::Transient]);
    assert_eq!(sleeper.recorded(), vec![Duration::from_millis(250)]);
}

#[test]
fn test_one_shot_honours_non_retryable() {
    let policy = RetryPolicy::one_shot().non_retryable([TestError::Permanent]);
    let flaky = Flaky::always();

    let err = policy
        .perform(flaky.work((), |_| TestError::Permanent))
        .unwrap_err();

    assert!(err.is_non_retryable());
    assert_eq!(flaky.calls(), 1);
}

#[test]
fn test_success_on_first_attempt_never_waits() {
    let (policy, sleeper) = recorded(RetryPolicy::<TestError>::fixed());

    let value = policy.perform_and_get(|| Ok::<_, TestError>(7)).unwrap();

    assert_eq!(value, 7);
    assert!(sleeper.recorded().is_empty());
}

#[test]
fn test_absent_value_is_not_a_failure() {
    let policy = RetryPolicy::<TestError>::one_shot();

    let value = policy
        .perform_and_get(|| Ok::<Option<u8>, TestError>(None))
        .unwrap();

    assert_eq!(value, None);
}

#[test]
fn test_on_retry_hook_sees_each_retry() {
    let events = Arc::new(Mutex::new(Vec::new()));
    let (policy, _) = recorded(
        RetryPolicy::fibonacci_with(Duration::from_millis(5), 4)
            .unwrap()
            .on_retry({
                let events = events.clone();
                move |event: &RetryEvent<'_, TestError>| {
                    events
                        .lock()
                        .unwrap()
                        .push((event.attempt, *event.kind, event.next_delay));
                }
            }),
    );

    let _ = policy.perform(Flaky::always().work((), |_| TestError::Transient));

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            (1, TestError::Transient, Duration::from_millis(5)),
            (2, TestError::Transient, Duration::from_millis(5)),
            (3, TestError::Transient, Duration::from_millis(10)),
        ]
    );
}

#[test]
fn test_on_retry_hook_not_called_for_non_retryable() {
    let hook_calls = Arc::new(AtomicU32::new(0));
    let policy = RetryPolicy::fixed_with(Duration::from_millis(1), 3)
        .unwrap()
        .non_retryable([TestError::Permanent])
        .on_retry({
            let hook_calls = hook_calls.clone();
            move |_: &RetryEvent<'_, TestError>| {
                hook_calls.fetch_add(1, Ordering::SeqCst);
            }
        });

    let _ = policy.perform(|| Err(TestError::Permanent));

    assert_eq!(hook_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_fixed_timing_with_real_sleeps() {
    let policy = RetryPolicy::fixed_with(Duration::from_millis(50), 5).unwrap();

    let start = Instant::now();
    let err = policy
        .perform(Flaky::always().work((), |_| TestError::Transient))
        .unwrap_err();

    assert!(start.elapsed() >= Duration::from_millis(200));
    assert!(err.elapsed() >= Duration::from_millis(200));
}

#[test]
fn test_non_retryable_has_no_wait() {
    let policy = RetryPolicy::fixed_with(Duration::from_secs(10), 5)
        .unwrap()
        .non_retryable([TestError::Permanent]);

    let start = Instant::now();
    let _ = policy.perform(|| Err(TestError::Permanent));

    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn test_interruptible_sleeper_shortens_wait() {
    let sleeper = Interruptible::new();
    let policy = RetryPolicy::fixed_with(Duration::from_secs(30), 2)
        .unwrap()
        .with_sleeper(sleeper.clone());

    let waker = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        sleeper.interrupt();
    });

    let start = Instant::now();
    let err = policy
        .perform(Flaky::always().work((), |_| TestError::Transient))
        .unwrap_err();

    assert!(err.is_exhausted());
    assert_eq!(err.attempts(), 2);
    assert!(start.elapsed() < Duration::from_secs(30));
    waker.join().unwrap();
}

#[test]
fn test_policy_shared_across_threads() {
    let (policy, sleeper) = recorded(RetryPolicy::fixed_with(Duration::from_millis(1), 4).unwrap());
    let policy = Arc::new(policy);

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let policy = Arc::clone(&policy);
            std::thread::spawn(move || {
                let flaky = Flaky::always();
                let err = policy
                    .perform(flaky.work((), |_| TestError::Transient))
                    .unwrap_err();
                (err.attempts(), flaky.calls())
            })
        })
        .collect();

    for worker in workers {
        assert_eq!(worker.join().unwrap(), (4, 4));
    }
    assert_eq!(sleeper.recorded().len(), 12);
}

#[traced_test]
#[test]
fn test_retries_are_logged_as_warnings() {
    let (policy, _) = recorded(RetryPolicy::fixed_with(Duration::from_millis(1), 3).unwrap());

    let _ = policy.perform(Flaky::always().work((), |_| TestError::Transient));

    assert!(logs_contain("attempt failed, retrying"));
    assert!(logs_contain("retry attempts exhausted"));
}

#[traced_test]
#[test]
fn test_non_retryable_is_logged() {
    let policy = RetryPolicy::one_shot().non_retryable([TestError::Permanent]);

    let _ = policy.perform(|| Err(TestError::Permanent));

    assert!(logs_contain("non-retryable failure, giving up"));
    assert!(!logs_contain("attempt failed, retrying"));
}

#[traced_test]
#[test]
fn test_saturated_delay_logged_as_max_millis() {
    let (policy, sleeper) = recorded(RetryPolicy::exponential_with(1e300, 1).unwrap());
    let flaky = Flaky::new(1);

    let value = policy
        .perform_and_get(flaky.work("late", |_| TestError::Transient))
        .unwrap();

    assert_eq!(value, "late");
    assert_eq!(sleeper.recorded(), vec![Duration::MAX]);
    assert!(logs_contain("delay_ms=18446744073709551615"));
}
