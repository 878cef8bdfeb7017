use std::{
    sync::atomic::{AtomicUsize, Ordering},
    thread,
};

/// Type name used when the service is constructed without one.
pub const DEFAULT_TYPE_NAME: &str = "app";

/// Produces pool threads named `"<type>-pool-<sequence>"`.
///
/// The structured name serves two purposes: operators get readable thread
/// dumps per pool type, and the deadlock-risk guard can tell from the
/// calling thread's name alone whether it is already inside this pool.
pub struct NamedThreadFactory {
    prefix: String,
    next: AtomicUsize,
}

impl NamedThreadFactory {
    #[must_use]
    pub fn new(type_name: &str) -> Self {
        Self {
            prefix: Self::pool_prefix(type_name),
            next: AtomicUsize::new(0),
        }
    }

    /// The name prefix shared by every thread of a pool of `type_name`.
    #[must_use]
    pub fn pool_prefix(type_name: &str) -> String {
        let type_name = if type_name.trim().is_empty() {
            DEFAULT_TYPE_NAME
        } else {
            type_name
        };
        format!("{type_name}-pool-")
    }

    /// A `thread::Builder` carrying the next sequenced name.
    #[must_use]
    pub fn builder(&self) -> thread::Builder {
        let seq = self.next.fetch_add(1, Ordering::SeqCst);
        thread::Builder::new().name(format!("{}{seq}", self.prefix))
    }
}
