//! Shared helpers for sunward tests.
//!
//! Placement happens on a background task, so most assertions have to wait
//! for the control loop to catch up. [`eventually`] polls a condition until it
//! holds or a deadline passes.

use std::time::Duration;

/// Default time to wait for a condition.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default delay between checks.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Poll `check` until it returns true. Panics with `what` after `timeout`.
pub async fn eventually<F>(timeout: Duration, what: &str, mut check: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("condition not met within {timeout:?}: {what}");
        }
        tokio::time::sleep(DEFAULT_POLL_INTERVAL).await;
    }
}

/// Assert that `check` keeps holding for the whole of `duration`.
pub async fn consistently<F>(duration: Duration, what: &str, mut check: F)
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + duration;
    while tokio::time::Instant::now() < deadline {
        assert!(check(), "condition stopped holding: {what}");
        tokio::time::sleep(DEFAULT_POLL_INTERVAL).await;
    }
    assert!(check(), "condition stopped holding: {what}");
}

/// Install a test log subscriber once. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}
