use std::{
    cell::RefCell,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use crate::{
    context::{ContextScope, ExecutionContext},
    error::ExecError,
    handle::TaskHandle,
};

/// The erased unit of work the pool channel carries.
pub(crate) type TaskFn = Box<dyn FnOnce() + Send + 'static>;

/// A boxed task for collection-based submission APIs.
pub type Callable<T> = Box<dyn FnOnce() -> T + Send + 'static>;

thread_local! {
    static CANCEL_FLAG: RefCell<Option<Arc<AtomicBool>>> = const { RefCell::new(None) };
}

/// Whether cancellation has been requested for the task currently running
/// on this thread. Cancellation is cooperative: long-running task bodies
/// should poll this and stop early when it turns `true`.
#[must_use]
pub fn cancellation_requested() -> bool {
    CANCEL_FLAG.with(|f| {
        f.borrow()
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    })
}

struct CancelScope;

impl CancelScope {
    fn enter(flag: Arc<AtomicBool>) -> Self {
        CANCEL_FLAG.with(|f| *f.borrow_mut() = Some(flag));
        CancelScope
    }
}

impl Drop for CancelScope {
    fn drop(&mut self) {
        CANCEL_FLAG.with(|f| *f.borrow_mut() = None);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

/// Binds a typed closure to a fresh handle and erases it for the pool.
///
/// The submitting thread's [`ExecutionContext`] is captured here and
/// installed on the worker for the duration of the task body. Panics are
/// contained and surface through the handle as [`ExecError::Failed`]; a
/// cancel request that lands while the task is still queued makes the
/// worker skip the body entirely.
pub(crate) fn bind<T, F>(f: F) -> (TaskHandle<T>, TaskFn)
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let (handle, completer) = TaskHandle::bind();
    let ctx = ExecutionContext::current();
    let job = Box::new(move || {
        if !completer.start() {
            return;
        }
        let _cancel_scope = CancelScope::enter(completer.cancel_flag());
        let _ctx_scope = ContextScope::enter(ctx);
        match catch_unwind(AssertUnwindSafe(f)) {
            Ok(value) => completer.complete(Ok(value)),
            Err(payload) => {
                completer.complete(Err(ExecError::Failed(panic_message(payload.as_ref()))))
            }
        }
    });
    (handle, job)
}
