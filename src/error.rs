use std::time::Duration;

/// The single failure kind surfaced by blocking `execute*` calls and by
/// waiting on a [`TaskHandle`].
///
/// Whatever goes wrong underneath (a task panics, the wait times out, the
/// task is discarded before it ever runs) is wrapped into one of these
/// variants with the original cause preserved in the message.
///
/// [`TaskHandle`]: crate::TaskHandle
#[derive(Debug, Clone, thiserror::Error)]
pub enum ExecError {
    /// The task raised (panicked); the payload text is kept for diagnosis.
    #[error("task execution failed: {0}")]
    Failed(String),

    /// The wait on a result exceeded its deadline.
    #[error("timed out after {0:?} waiting for task result")]
    Timeout(Duration),

    /// The task was cancelled before it produced a result.
    #[error("task was cancelled")]
    Cancelled,

    /// The task was dropped before it ever ran (discard backpressure
    /// policy, or pool teardown with the task still queued).
    #[error("task was dropped before execution")]
    Dropped,

    /// The pool no longer accepts work.
    #[error("the thread pool is closed")]
    Closed,

    /// Raised by [`ExecService::shutdown`]: pools are process-lifetime
    /// singletons and no caller may tear one down.
    ///
    /// [`ExecService::shutdown`]: crate::ExecService::shutdown
    #[error("shutdown is not supported; the pool is a process-lifetime singleton")]
    ShutdownUnsupported,
}

pub type ExecResult<T> = Result<T, ExecError>;
