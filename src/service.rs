use std::{backtrace::Backtrace, sync::Arc, thread, time::Duration};

use crate::{
    config::{is_production_env, EnvProperties, Properties},
    error::{ExecError, ExecResult},
    factory::NamedThreadFactory,
    handle::TaskHandle,
    provider::PoolProvider,
    task::{self, Callable},
};

/// The public task-execution facade.
///
/// One `ExecService` owns one lazily-built bounded pool. Application code
/// submits work through it and never touches pool primitives directly; in
/// return it gets consistent backpressure, thread naming, deadlock-risk
/// diagnostics, and uniform failure wrapping.
///
/// Services are long-lived components owned by process-wide wiring; wrap
/// one in an `Arc` and inject it wherever tasks are submitted.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
/// use taskpool::ExecService;
///
/// let service = Arc::new(ExecService::with_env("reports"));
/// let total: u64 = service.execute(|| (1..=100).sum()).unwrap();
/// assert_eq!(5050, total);
/// ```
pub struct ExecService {
    provider: PoolProvider,
    pool_prefix: String,
    guard_enabled: bool,
}

impl ExecService {
    /// A service of `type_name`, sized from the given properties source.
    pub fn new(type_name: &str, props: Arc<dyn Properties>) -> Self {
        Self {
            pool_prefix: NamedThreadFactory::pool_prefix(type_name),
            provider: PoolProvider::new(type_name, props),
            guard_enabled: !is_production_env(),
        }
    }

    /// A service sized from environment variables. See [`EnvProperties`].
    #[must_use]
    pub fn with_env(type_name: &str) -> Self {
        Self::new(type_name, Arc::new(EnvProperties))
    }

    /// Submits a task and returns its handle without waiting.
    ///
    /// Under the blocking-put backpressure policy the call may suspend
    /// until the work queue has room; it never silently drops work.
    pub fn submit<T, F>(&self, f: F) -> ExecResult<TaskHandle<T>>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.warn_if_recursive();
        let (handle, job) = task::bind(f);
        self.provider.pool().execute_boxed(job)?;
        Ok(handle)
    }

    /// Submits a whole batch and blocks until every task has completed or
    /// failed (invoke-all semantics). The returned handles mirror the
    /// input order 1:1 and are all terminal when the call returns.
    ///
    /// This is a blocking call despite returning handles.
    pub fn submit_all<T>(&self, tasks: Vec<Callable<T>>) -> ExecResult<Vec<TaskHandle<T>>>
    where
        T: Send + 'static,
    {
        self.warn_if_recursive();
        let mut handles = Vec::with_capacity(tasks.len());
        for f in tasks {
            let (handle, job) = task::bind(f);
            self.provider.pool().execute_boxed(job)?;
            handles.push(handle);
        }
        for handle in &handles {
            handle.wait_done();
        }
        Ok(handles)
    }

    /// Submits a task and blocks the caller until its value is available.
    ///
    /// Every failure mode (task panic, dropped task, pool closed) surfaces
    /// as an [`ExecError`]; nothing is swallowed.
    pub fn execute<T, F>(&self, f: F) -> ExecResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let handle = self.submit(f)?;
        handle.join().map_err(|error| {
            tracing::error!(%error, "task execution failed");
            error
        })
    }

    /// Like [`ExecService::execute`], bounded by a deadline.
    pub fn execute_timeout<T, F>(&self, f: F, timeout: Duration) -> ExecResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.execute_timeout_cancel(f, timeout, false)
    }

    /// Like [`ExecService::execute_timeout`]; when `cancel_on_timeout` is
    /// set, a wait failure additionally requests cancellation of the task
    /// (queued tasks are skipped, running tasks see the cooperative flag).
    pub fn execute_timeout_cancel<T, F>(
        &self,
        f: F,
        timeout: Duration,
        cancel_on_timeout: bool,
    ) -> ExecResult<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let handle = self.submit(f)?;
        let token = handle.canceller();
        handle.join_deadline(timeout).map_err(|error| {
            tracing::error!(%error, ?timeout, "bounded task execution failed");
            if cancel_on_timeout {
                token.cancel();
            }
            error
        })
    }

    /// Runs a batch and aggregates the non-`None` values.
    ///
    /// An empty batch returns an empty vec without constructing or
    /// touching the pool. Tasks returning `None` contribute nothing to the
    /// aggregate; callers that must tell absence from failure should use
    /// per-task handles instead. Any task failure aborts the whole call.
    pub fn execute_all<T>(&self, tasks: Vec<Callable<Option<T>>>) -> ExecResult<Vec<T>>
    where
        T: Send + 'static,
    {
        if tasks.is_empty() {
            return Ok(Vec::new());
        }

        let handles = self.submit_all(tasks)?;
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.join() {
                Ok(Some(value)) => results.push(value),
                Ok(None) => {}
                Err(error) => {
                    tracing::error!(%error, "batch task failed, aborting aggregation");
                    return Err(error);
                }
            }
        }
        Ok(results)
    }

    /// Submits a runnable and returns its value-less handle.
    pub fn submit_runnable<F>(&self, f: F) -> ExecResult<TaskHandle<()>>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(f)
    }

    /// Fire-and-forget: submits a runnable and retains no handle.
    pub fn spawn<F>(&self, f: F) -> ExecResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit(f).map(drop)
    }

    /// Runs `action` once per item, waiting only on the items for which
    /// `should_wait` holds. Submission and per-item failures are logged,
    /// never raised; the call returns once every waited-on item is done.
    pub fn safe_execute<I, A, P>(&self, items: Vec<I>, action: A, should_wait: P)
    where
        I: Send + 'static,
        A: Fn(I) + Send + Sync + 'static,
        P: Fn(&I) -> bool,
    {
        let action = Arc::new(action);
        let mut wait_set = Vec::new();
        for item in items {
            let wait = should_wait(&item);
            let action = action.clone();
            match self.submit(move || action(item)) {
                Ok(handle) => {
                    if wait {
                        wait_set.push(handle);
                    }
                }
                Err(error) => tracing::error!(%error, "failed to submit item task"),
            }
        }
        for handle in wait_set {
            if let Err(error) = handle.join() {
                tracing::error!(%error, "error while executing item task");
            }
        }
    }

    /// [`ExecService::safe_execute`] waiting on every item.
    pub fn safe_execute_all<I, A>(&self, items: Vec<I>, action: A)
    where
        I: Send + 'static,
        A: Fn(I) + Send + Sync + 'static,
    {
        self.safe_execute(items, action, |_| true);
    }

    /// Threads currently live in the pool, or `-1` while the lazy pool has
    /// not been constructed yet.
    #[must_use]
    pub fn active_count(&self) -> i64 {
        self.provider
            .existing()
            .map_or(-1, |pool| pool.active_count() as i64)
    }

    /// Tasks waiting in the work queue, or `-1` before first use.
    #[must_use]
    pub fn queue_depth(&self) -> i64 {
        self.provider
            .existing()
            .map_or(-1, |pool| pool.queue_len() as i64)
    }

    /// Workers the pool holds, or `-1` before first use.
    #[must_use]
    pub fn pool_size(&self) -> i64 {
        self.provider
            .existing()
            .map_or(-1, |pool| pool.pool_size() as i64)
    }

    /// Always fails: the pool is a shared, process-lifetime singleton and
    /// no caller holding a service reference may tear it down.
    pub fn shutdown(&self) -> ExecResult<()> {
        Err(ExecError::ShutdownUnsupported)
    }

    /// Warns (log-only, never denies) when the calling thread is itself a
    /// worker of this pool: an execute-and-wait from inside the pool can
    /// starve it of free threads and deadlock once in-flight work exceeds
    /// the thread budget. Active outside production environments only.
    /// Name matching can false-positive on a coincidentally named thread,
    /// which is another reason this stays advisory.
    fn warn_if_recursive(&self) {
        if !self.guard_enabled {
            return;
        }
        if let Some(name) = thread::current().name() {
            if name.starts_with(&self.pool_prefix) {
                tracing::warn!(
                    thread = name,
                    backtrace = %Backtrace::capture(),
                    "submission from inside the same pool; waiting here risks deadlock"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        MapProperties, KEY_CORE_POOL_SIZE, KEY_MAX_POOL_SIZE, KEY_WORK_QUEUE_SIZE,
    };
    use crate::task::cancellation_requested;
    use std::{
        sync::atomic::{AtomicBool, AtomicUsize, Ordering},
        time::Instant,
    };

    fn init_tracing() {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .with_test_writer()
            .try_init()
            .ok();
    }

    fn small_service(type_name: &str) -> ExecService {
        init_tracing();
        let props = MapProperties::new()
            .with(KEY_CORE_POOL_SIZE, 4)
            .with(KEY_MAX_POOL_SIZE, 8)
            .with(KEY_WORK_QUEUE_SIZE, 16);
        ExecService::new(type_name, Arc::new(props))
    }

    #[test]
    fn execute_returns_the_task_value() {
        let service = small_service("exec");
        assert_eq!(42, service.execute(|| 42).unwrap());
    }

    #[test]
    fn execute_surfaces_a_panicking_task() {
        let service = small_service("panic");
        let result: ExecResult<u32> = service.execute(|| panic!("kaput"));
        match result {
            Err(ExecError::Failed(msg)) => assert!(msg.contains("kaput")),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn batch_aggregation_drops_none_values() {
        let service = small_service("batch");
        let tasks: Vec<Callable<Option<String>>> = vec![
            Box::new(|| Some("a".to_string())),
            Box::new(|| None),
            Box::new(|| Some("b".to_string())),
        ];
        let mut results = service.execute_all(tasks).unwrap();
        results.sort();
        assert_eq!(vec!["a".to_string(), "b".to_string()], results);
    }

    #[test]
    fn empty_batch_never_touches_the_pool() {
        let service = small_service("empty");
        let results: Vec<u32> = service.execute_all(Vec::new()).unwrap();
        assert!(results.is_empty());
        assert_eq!(-1, service.pool_size());
        assert_eq!(-1, service.active_count());
        assert_eq!(-1, service.queue_depth());
    }

    #[test]
    fn submit_all_returns_terminal_handles_in_input_order() {
        let service = small_service("invoke-all");
        let tasks: Vec<Callable<usize>> = (0..6_usize)
            .map(|i| -> Callable<usize> { Box::new(move || i * 10) })
            .collect();
        let handles = service.submit_all(tasks).unwrap();
        for (i, handle) in handles.into_iter().enumerate() {
            assert!(handle.is_done());
            assert_eq!(i * 10, handle.join().unwrap());
        }
    }

    #[test]
    fn execute_timeout_fails_within_the_deadline() {
        let service = small_service("deadline");
        let start = Instant::now();
        let result: ExecResult<u32> = service.execute_timeout(
            || {
                thread::sleep(Duration::from_millis(500));
                1
            },
            Duration::from_millis(60),
        );
        assert!(matches!(result, Err(ExecError::Timeout(_))));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(60));
        assert!(elapsed < Duration::from_millis(400), "waited {elapsed:?}");
    }

    #[test]
    fn cancel_on_timeout_raises_the_cooperative_flag() {
        let service = small_service("cancel");
        let observed = Arc::new(AtomicBool::new(false));
        let observed_by_task = observed.clone();

        let result: ExecResult<()> = service.execute_timeout_cancel(
            move || {
                let start = Instant::now();
                while start.elapsed() < Duration::from_secs(2) {
                    if cancellation_requested() {
                        observed_by_task.store(true, Ordering::SeqCst);
                        return;
                    }
                    thread::sleep(Duration::from_millis(5));
                }
            },
            Duration::from_millis(50),
            true,
        );
        assert!(result.is_err());

        let waited = Instant::now();
        while !observed.load(Ordering::SeqCst) && waited.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(observed.load(Ordering::SeqCst));
    }

    #[test]
    fn safe_execute_runs_every_item_even_when_some_panic() {
        let service = small_service("safe");
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_for_action = counter.clone();

        service.safe_execute_all(
            (0..10_usize).collect(),
            move |i| {
                counter_for_action.fetch_add(1, Ordering::SeqCst);
                if i % 3 == 0 {
                    panic!("item {i} failed");
                }
            },
        );
        assert_eq!(10, counter.load(Ordering::SeqCst));
    }

    #[test]
    fn safe_execute_waits_only_on_selected_items() {
        let service = small_service("selective");
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_for_action = counter.clone();

        service.safe_execute(
            (0..8_usize).collect(),
            move |i| {
                if i % 2 == 1 {
                    thread::sleep(Duration::from_millis(30));
                }
                counter_for_action.fetch_add(1, Ordering::SeqCst);
            },
            |i| i % 2 == 1,
        );
        // The waited-on (odd) items are done; the rest finish eventually.
        assert!(counter.load(Ordering::SeqCst) >= 4);
        let start = Instant::now();
        while counter.load(Ordering::SeqCst) < 8 && start.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(8, counter.load(Ordering::SeqCst));
    }

    #[test]
    fn submission_from_inside_the_pool_warns_but_completes() {
        let service = Arc::new(small_service("nested"));
        let inner = service.clone();
        // The guard fires (the worker thread name starts with
        // "nested-pool-") but must not deny or fail the nested call.
        let value = service
            .execute(move || inner.execute(|| 7).unwrap())
            .unwrap();
        assert_eq!(7, value);
    }

    #[test]
    fn introspection_reports_after_first_use() {
        let service = small_service("stats");
        service.execute(|| ()).unwrap();
        assert!(service.pool_size() >= 1);
        assert!(service.active_count() >= 0);
        assert!(service.queue_depth() >= 0);
    }

    #[test]
    fn shutdown_is_unsupported() {
        let service = small_service("teardown");
        assert!(matches!(
            service.shutdown(),
            Err(ExecError::ShutdownUnsupported)
        ));
    }

    #[test]
    fn fire_and_forget_runs() {
        let service = small_service("spawn");
        let ran = Arc::new(AtomicBool::new(false));
        let ran_by_task = ran.clone();
        service
            .spawn(move || ran_by_task.store(true, Ordering::SeqCst))
            .unwrap();
        let start = Instant::now();
        while !ran.load(Ordering::SeqCst) && start.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(ran.load(Ordering::SeqCst));
    }
}
