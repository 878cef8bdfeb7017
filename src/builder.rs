use std::{sync::Arc, thread, time::Duration};

use crate::{
    config::PoolConfig, factory::NamedThreadFactory, RejectionPolicy, ThreadFactory, ThreadPool,
};

/// A builder of the [`ThreadPool`], which can be used to configure the
/// properties of a new pool.
///
/// # Examples
///
/// ```
/// use taskpool::{RejectionPolicy, ThreadPoolBuilder};
/// use std::time::Duration;
///
/// let thread_pool = ThreadPoolBuilder::default()
///     .core_pool_size(4)
///     .max_pool_size(7)
///     .keep_alive_time(Duration::from_secs(2))
///     .rejection_policy(RejectionPolicy::Discard)
///     .named_threads("billing")
///     .build();
/// ```
pub struct ThreadPoolBuilder {
    pub(crate) queue_capacity: usize,
    pub(crate) max_pool_size: usize,
    pub(crate) core_pool_size: usize,
    pub(crate) keep_alive_time: Duration,
    pub(crate) allow_core_thread_timeout: bool,
    pub(crate) rejection_policy: RejectionPolicy,
    pub(crate) thread_factory: Arc<ThreadFactory>,
}

impl Default for ThreadPoolBuilder {
    /// Creates a new builder with the default configuration.
    ///
    /// # Default Configuration
    /// - `queue_capacity`: 1000
    /// - `max_pool_size`: the number of physical cores of the current
    ///   system
    /// - `core_pool_size`: the half of the `max_pool_size`, at least 1
    /// - `keep_alive_time`: 1 second
    /// - `allow_core_thread_timeout`: `false`
    /// - `rejection_policy`: [`RejectionPolicy::BlockingPut`]
    /// - `thread_factory`: `|| thread::Builder::new()`
    fn default() -> Self {
        Self {
            queue_capacity: 1000,
            max_pool_size: num_cpus::get_physical(),
            core_pool_size: usize::max(1, num_cpus::get_physical() / 2),
            keep_alive_time: Duration::from_secs(1),
            allow_core_thread_timeout: false,
            rejection_policy: RejectionPolicy::BlockingPut,
            thread_factory: Arc::new(thread::Builder::new),
        }
    }
}

impl ThreadPoolBuilder {
    /// Creates the base configuration for the new thread pool.
    ///
    /// See: [`ThreadPoolBuilder::default`]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder pre-filled from a resolved [`PoolConfig`]: configured sizing,
    /// `"<type>-pool-<n>"` thread names, blocking-put backpressure.
    #[must_use]
    pub fn from_config(config: &PoolConfig) -> Self {
        Self::default()
            .core_pool_size(config.core_pool_size)
            .max_pool_size(config.max_pool_size)
            .queue_capacity(config.work_queue_capacity)
            .keep_alive_time(config.keep_alive)
            .allow_core_thread_timeout(config.allow_core_thread_timeout)
            .rejection_policy(RejectionPolicy::BlockingPut)
            .named_threads(&config.type_name)
    }

    /// Sets the capacity of the bounded task queue.
    #[must_use]
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Sets the maximum allowed number of threads.
    #[must_use]
    pub fn max_pool_size(mut self, size: usize) -> Self {
        self.max_pool_size = size;
        self
    }

    /// Sets the number of core threads.
    #[must_use]
    pub fn core_pool_size(mut self, size: usize) -> Self {
        self.core_pool_size = size;
        self
    }

    /// Sets the time that non-core threads may remain idle.
    #[must_use]
    pub fn keep_alive_time(mut self, time: Duration) -> Self {
        self.keep_alive_time = time;
        self
    }

    /// When enabled (and `keep_alive_time` is non-zero), core threads also
    /// idle out instead of staying resident.
    #[must_use]
    pub fn allow_core_thread_timeout(mut self, allow: bool) -> Self {
        self.allow_core_thread_timeout = allow;
        self
    }

    /// Sets the backpressure policy applied when the queue is full and the
    /// pool has no thread to spare.
    #[must_use]
    pub fn rejection_policy(mut self, policy: RejectionPolicy) -> Self {
        self.rejection_policy = policy;
        self
    }

    /// Names pool threads `"<type>-pool-<sequence>"`.
    #[must_use]
    pub fn named_threads(self, type_name: &str) -> Self {
        let factory = NamedThreadFactory::new(type_name);
        self.thread_factory_fn(move || factory.builder())
    }

    /// Sets the factory function that is used to create a new custom
    /// thread.
    #[must_use]
    pub fn thread_factory_fn<F>(mut self, f: F) -> Self
    where
        F: Fn() -> thread::Builder + Send + Sync + 'static,
    {
        self.thread_factory = Arc::new(f);
        self
    }

    /// Creates a thread pool with the arguments.
    ///
    /// A `max_pool_size` below `core_pool_size` is raised to
    /// `core_pool_size`; a zero `max_pool_size` is raised to 1.
    pub fn build(mut self) -> ThreadPool {
        if self.max_pool_size == 0 {
            self.max_pool_size = 1;
        }
        if self.max_pool_size < self.core_pool_size {
            self.max_pool_size = self.core_pool_size;
        }
        ThreadPool::from_builder(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MapProperties, KEY_CORE_POOL_SIZE, KEY_MAX_POOL_SIZE};

    #[test]
    fn build_raises_max_below_core() {
        let pool = ThreadPoolBuilder::default()
            .core_pool_size(7)
            .max_pool_size(6)
            .build();
        assert_eq!(7, pool.max_pool_size());
    }

    #[test]
    fn from_config_applies_the_clamped_sizing() {
        let props = MapProperties::new()
            .with(KEY_CORE_POOL_SIZE, 200)
            .with(KEY_MAX_POOL_SIZE, 50);
        let config = PoolConfig::resolve("cfg", &props);
        let builder = ThreadPoolBuilder::from_config(&config);
        assert_eq!(200, builder.core_pool_size);
        assert_eq!(200, builder.max_pool_size);
        assert_eq!(5, builder.queue_capacity);
    }

    #[test]
    fn zero_max_is_raised_to_one() {
        let pool = ThreadPoolBuilder::default()
            .core_pool_size(0)
            .max_pool_size(0)
            .build();
        assert_eq!(1, pool.max_pool_size());
    }
}
