use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Condvar, Mutex,
    },
    time::{Duration, Instant},
};

use crate::error::{ExecError, ExecResult};

/// The lifecycle of an in-flight task. Transitions are monotonic:
/// `Pending -> Running -> Done`, or `-> Cancelled` from either live state.
/// A completed or cancelled handle never reverts.
enum State<T> {
    Pending,
    Running,
    /// The slot is `None` once the value has been taken by a consuming join.
    Done(Option<ExecResult<T>>),
    Cancelled,
}

struct Inner<T> {
    state: Mutex<State<T>>,
    done: Condvar,
    cancel: Arc<AtomicBool>,
}

/// A caller-visible reference to an in-flight or completed task.
///
/// `wait_done` blocks without consuming the result, which is what bulk
/// submission needs; `join`/`join_deadline` consume the handle and yield
/// the task's value or the wrapped failure.
pub struct TaskHandle<T> {
    inner: Arc<Inner<T>>,
}

/// The producer side of a [`TaskHandle`], held by the wrapped task while it
/// travels through the pool. Dropping a completer without completing it
/// (discarded or never-run task) finishes the handle with
/// [`ExecError::Dropped`] so waiters cannot hang forever.
pub(crate) struct Completer<T> {
    inner: Arc<Inner<T>>,
    completed: bool,
}

/// A detached cancellation request for one task, usable after the handle
/// itself has been consumed by a join.
#[derive(Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Requests cancellation. Queued tasks are skipped by their worker;
    /// running tasks may observe the request via
    /// [`cancellation_requested`](crate::cancellation_requested) and stop
    /// cooperatively.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

impl<T> TaskHandle<T> {
    /// Creates a fresh pending handle and its completer.
    pub(crate) fn bind() -> (TaskHandle<T>, Completer<T>) {
        let inner = Arc::new(Inner {
            state: Mutex::new(State::Pending),
            done: Condvar::new(),
            cancel: Arc::new(AtomicBool::new(false)),
        });
        (
            TaskHandle {
                inner: inner.clone(),
            },
            Completer {
                inner,
                completed: false,
            },
        )
    }

    /// Requests cancellation of the task.
    ///
    /// A still-pending task is moved to *cancelled* immediately and will be
    /// skipped by its worker; a running task only has the cooperative flag
    /// raised. Cancelling an already-completed handle is a no-op.
    pub fn cancel(&self) {
        self.inner.cancel.store(true, Ordering::SeqCst);
        let mut state = self.inner.state.lock().unwrap();
        if matches!(*state, State::Pending) {
            *state = State::Cancelled;
            self.inner.done.notify_all();
        }
    }

    /// A cancellation token that outlives this handle.
    #[must_use]
    pub fn canceller(&self) -> CancelToken {
        CancelToken {
            flag: self.inner.cancel.clone(),
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.load(Ordering::SeqCst)
    }

    /// `true` once the task has completed, failed, or been cancelled.
    #[must_use]
    pub fn is_done(&self) -> bool {
        let state = self.inner.state.lock().unwrap();
        matches!(*state, State::Done(_) | State::Cancelled)
    }

    /// Blocks until the task has reached a terminal state, without
    /// consuming the result.
    pub fn wait_done(&self) {
        let mut state = self.inner.state.lock().unwrap();
        while matches!(*state, State::Pending | State::Running) {
            state = self.inner.done.wait(state).unwrap();
        }
    }

    /// Blocks until the task finishes and yields its value.
    pub fn join(self) -> ExecResult<T> {
        let mut state = self.inner.state.lock().unwrap();
        loop {
            match &mut *state {
                State::Done(slot) => return Self::take(slot),
                State::Cancelled => return Err(ExecError::Cancelled),
                State::Pending | State::Running => {
                    state = self.inner.done.wait(state).unwrap();
                }
            }
        }
    }

    /// Blocks for at most `timeout`; yields [`ExecError::Timeout`] if the
    /// task is still live when the deadline passes.
    pub fn join_deadline(self, timeout: Duration) -> ExecResult<T> {
        let deadline = Instant::now() + timeout;
        let mut state = self.inner.state.lock().unwrap();
        loop {
            match &mut *state {
                State::Done(slot) => return Self::take(slot),
                State::Cancelled => return Err(ExecError::Cancelled),
                State::Pending | State::Running => {}
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(ExecError::Timeout(timeout));
            }
            let (guard, _) = self
                .inner
                .done
                .wait_timeout(state, deadline - now)
                .unwrap();
            state = guard;
        }
    }

    fn take(slot: &mut Option<ExecResult<T>>) -> ExecResult<T> {
        slot.take()
            .unwrap_or_else(|| Err(ExecError::Failed("task result already consumed".into())))
    }
}

impl<T> Completer<T> {
    /// Marks the task running, unless cancellation was requested while it
    /// was queued, in which case the handle is moved to *cancelled* and the
    /// task body must not run.
    pub(crate) fn start(&self) -> bool {
        let mut state = self.inner.state.lock().unwrap();
        match *state {
            State::Pending => {
                if self.inner.cancel.load(Ordering::SeqCst) {
                    *state = State::Cancelled;
                    self.inner.done.notify_all();
                    false
                } else {
                    *state = State::Running;
                    true
                }
            }
            State::Cancelled => false,
            // A completer only starts once; live states other than Pending
            // are unreachable here.
            State::Running | State::Done(_) => false,
        }
    }

    pub(crate) fn complete(mut self, result: ExecResult<T>) {
        let mut state = self.inner.state.lock().unwrap();
        if matches!(*state, State::Pending | State::Running) {
            *state = State::Done(Some(result));
            self.inner.done.notify_all();
        }
        drop(state);
        self.completed = true;
    }

    pub(crate) fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.inner.cancel.clone()
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        let mut state = self.inner.state.lock().unwrap();
        if matches!(*state, State::Pending | State::Running) {
            *state = State::Done(Some(Err(ExecError::Dropped)));
            self.inner.done.notify_all();
        }
    }
}
