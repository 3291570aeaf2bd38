//! Retry Patterns Example
//!
//! Demonstrates the retry strategies and how to use them:
//! - Fixed, exponential, Fibonacci and one-shot schedules
//! - Stopping early on non-retryable failures
//! - Observing retries with a hook
//! - Reading every recorded failure
//! - Running a loop off the async runtime

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use retrier::{Classify, RetryEvent, RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum FetchError {
    Unavailable,
    Forbidden,
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchError::Unavailable => write!(f, "service unavailable"),
            FetchError::Forbidden => write!(f, "forbidden"),
        }
    }
}

impl std::error::Error for FetchError {}

impl Classify for FetchError {
    type Kind = Self;

    fn kind(&self) -> Self {
        *self
    }
}

/// Work that fails `failures` times before returning `value`.
fn flaky<T: Clone>(failures: u32, value: T) -> impl FnMut() -> Result<T, FetchError> {
    let mut calls = 0;
    move || {
        calls += 1;
        println!("  Attempt {}", calls);
        if calls <= failures {
            Err(FetchError::Unavailable)
        } else {
            Ok(value.clone())
        }
    }
}

// ==================== Schedules ====================

/// Example 1: Inspecting each schedule without running anything
fn example_schedules() {
    println!("\n=== Example 1: Schedules ===");

    let policies: [(&str, RetryPolicy<FetchError>); 4] = [
        ("fixed", RetryPolicy::fixed()),
        ("exponential", RetryPolicy::exponential()),
        ("fibonacci", RetryPolicy::fibonacci()),
        ("one_shot", RetryPolicy::one_shot()),
    ];

    for (name, policy) in &policies {
        let waits: Vec<_> = policy.delays().collect();
        println!(
            "{:>12}: {} attempts, waits {:?}",
            name,
            policy.max_attempts(),
            waits
        );
    }
}

// ==================== Basic Retry ====================

/// Example 2: Fibonacci backoff until the work succeeds
fn example_basic_retry() {
    println!("\n=== Example 2: Basic Retry ===");

    let policy = RetryPolicy::fibonacci_with(Duration::from_millis(20), 5).unwrap();

    match policy.perform_and_get(flaky(2, "payload")) {
        Ok(value) => println!("Success: {}", value),
        Err(err) => println!("Failed: {}", err),
    }
}

/// Example 3: Exhausting a fixed schedule
fn example_exhausted() {
    println!("\n=== Example 3: Exhausted ===");

    let policy = RetryPolicy::fixed_with(Duration::from_millis(10), 3).unwrap();

    let err = policy.perform(flaky(u32::MAX, ())).unwrap_err();
    println!("Gave up: {}", err);
    println!("Primary failure: {:?}", err.first());
    println!("Suppressed: {:?}", err.suppressed());
}

// ==================== Conditional Retry ====================

/// Example 4: Non-retryable failures stop the loop at once
fn example_non_retryable() {
    println!("\n=== Example 4: Non-Retryable ===");

    let policy = RetryPolicy::exponential_with(2.0, 5)
        .unwrap()
        .non_retryable([FetchError::Forbidden]);

    let result = policy.perform(|| {
        println!("  Attempt");
        Err(FetchError::Forbidden)
    });

    if let Err(err) = result {
        println!(
            "Stopped after {} attempt(s): non-retryable = {}",
            err.attempts(),
            err.is_non_retryable()
        );
    }
}

// ==================== Observability ====================

/// Example 5: Watching retries through a hook
fn example_hooks() {
    println!("\n=== Example 5: Retry Hooks ===");

    let retries = Arc::new(AtomicU32::new(0));
    let policy = RetryPolicy::one_shot_with(Duration::from_millis(50)).on_retry({
        let retries = retries.clone();
        move |event: &RetryEvent<'_, FetchError>| {
            retries.fetch_add(1, Ordering::SeqCst);
            println!(
                "  Retry after attempt {} ({:?}), waiting {:?}",
                event.attempt, event.kind, event.next_delay
            );
        }
    });

    let value = policy.perform_and_get(flaky(1, 42)).unwrap();
    println!(
        "Got {} after {} retry",
        value,
        retries.load(Ordering::SeqCst)
    );
}

// ==================== Async ====================

/// Example 6: Running the loop on the blocking pool
async fn example_async() {
    println!("\n=== Example 6: Async Handle ===");

    let policy = RetryPolicy::fixed_with(Duration::from_millis(100), 4).unwrap();

    let handle = policy.perform_and_get_async(flaky(2, "from the pool"));
    println!("Loop spawned, runtime is free");

    match handle.await {
        Ok(value) => println!("Success: {}", value),
        Err(err) => println!("Failed: {}", err),
    }
}

#[tokio::main]
async fn main() {
    println!("======================================");
    println!("  Retrier - Retry Patterns");
    println!("======================================");

    example_schedules();
    example_basic_retry();
    example_exhausted();
    example_non_retryable();
    example_hooks();
    example_async().await;

    println!("\n======================================");
    println!("  All examples completed");
    println!("======================================");
}
