//! Static bulk-wait helpers over collections of in-flight handles.
//!
//! These are free functions independent of any pool: callers accumulate
//! [`TaskHandle`]s from one or several services and pick the wait policy
//! that matches their intent. The "safe" variants swallow and log
//! per-handle failures; [`wait_all`] raises on the first one; the
//! deadline-bound variants treat a breach as an operational event and log
//! rather than raise.

use std::time::{Duration, Instant};

use crate::{error::ExecResult, handle::TaskHandle};

/// Waits on every handle in order, logging and continuing past any
/// individual failure. Never raises.
pub fn wait_all_safe<T>(handles: Vec<TaskHandle<T>>) {
    for handle in handles {
        if let Err(error) = handle.join() {
            tracing::error!(%error, "error while waiting for task");
        }
    }
}

/// Waits on every handle in order; the first failure is raised immediately
/// and the remaining handles are not waited on.
pub fn wait_all<T>(handles: Vec<TaskHandle<T>>) -> ExecResult<()> {
    for handle in handles {
        handle.join()?;
    }
    Ok(())
}

/// Waits on each handle for at most the time remaining until a shared
/// deadline `max_wait` from now. Handles still live once the deadline has
/// passed are cancelled instead of waited on. Per-handle failures are
/// logged, not raised.
pub fn wait_and_cancel_remaining<T>(handles: Vec<TaskHandle<T>>, max_wait: Duration) {
    let deadline = Instant::now() + max_wait;
    let mut remaining = handles.len();
    for handle in handles {
        let now = Instant::now();
        if now >= deadline {
            tracing::error!(
                remaining,
                "timed out waiting for tasks, cancelling the remainder"
            );
            handle.cancel();
            continue;
        }
        match handle.join_deadline(deadline - now) {
            Ok(_) => remaining -= 1,
            Err(error) => tracing::error!(remaining, %error, "error while waiting for task"),
        }
    }
}

/// Like [`wait_all_safe`] with a soft deadline: once `max_wait` has
/// elapsed, the remaining handles are abandoned without being cancelled
/// and left to finish on their own.
pub fn wait_all_safe_deadline<T>(handles: Vec<TaskHandle<T>>, max_wait: Duration) {
    let deadline = Instant::now() + max_wait;
    for handle in handles {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        if let Err(error) = handle.join_deadline(deadline - now) {
            tracing::debug!(%error, "error while waiting for task");
        }
    }
}
