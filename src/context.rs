//! Caller-context propagation into pool threads.
//!
//! A submitter may carry ambient context (tenant, request id, trace tags)
//! that tasks expect to see. The facade captures the submitting thread's
//! context when a task is bound and installs it on the worker thread for
//! the duration of the task body, clearing it afterwards.

use std::{cell::RefCell, collections::HashMap, sync::Arc};

thread_local! {
    static CURRENT: RefCell<Option<ExecutionContext>> = const { RefCell::new(None) };
}

/// An immutable string map shared between the submitter and the worker
/// thread running its tasks. Cloning is cheap (`Arc`).
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    entries: Arc<HashMap<String, String>>,
}

impl ExecutionContext {
    #[must_use]
    pub fn new(entries: HashMap<String, String>) -> Self {
        Self {
            entries: Arc::new(entries),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// The context of the calling thread, if one is installed.
    #[must_use]
    pub fn current() -> Option<ExecutionContext> {
        CURRENT.with(|c| c.borrow().clone())
    }

    /// Installs `self` as the calling thread's context.
    pub fn install(self) {
        CURRENT.with(|c| *c.borrow_mut() = Some(self));
    }

    /// Clears the calling thread's context.
    pub fn clear() {
        CURRENT.with(|c| *c.borrow_mut() = None);
    }
}

/// Installs a context for the lifetime of the guard, restoring the thread
/// to a clean slate on drop. Used by workers around each task body.
pub(crate) struct ContextScope;

impl ContextScope {
    pub(crate) fn enter(ctx: Option<ExecutionContext>) -> Self {
        if let Some(ctx) = ctx {
            ctx.install();
        }
        ContextScope
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        ExecutionContext::clear();
    }
}
