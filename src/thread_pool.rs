use crate::{
    error::{ExecError, ExecResult},
    task::TaskFn,
    worker::Worker,
    ThreadPoolBuilder,
};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use std::{
    backtrace::Backtrace,
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

/// A function that used to create a custom thread.
pub type ThreadFactory = dyn Fn() -> thread::Builder + Send + Sync + 'static;

/// The strategy applied when the bounded task queue is full and the pool
/// has no thread to spare.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectionPolicy {
    /// Block the submitting thread until a queue slot frees up. Bursts are
    /// absorbed without dropping work; backpressure propagates to the
    /// caller.
    BlockingPut,

    /// Drop the task and log an error with a captured backtrace. The
    /// task's handle completes with [`ExecError::Dropped`].
    Discard,
}

struct SharedData {
    sender: Mutex<Option<Sender<TaskFn>>>,
    core_workers: Mutex<Option<Vec<Worker>>>,
    workers: Mutex<Option<Vec<Worker>>>,
}

impl SharedData {
    fn num_of_live_workers(&self) -> usize {
        let live = |workers: &Mutex<Option<Vec<Worker>>>| {
            workers.lock().unwrap().as_ref().map_or(0, |x| {
                x.iter().filter(|worker| !worker.is_finished()).count()
            })
        };
        live(&self.core_workers) + live(&self.workers)
    }
}

/// A bounded-queue pool of worker threads.
///
/// Submitted tasks first fill the core worker set, then the bounded task
/// channel, then restart-or-spawn non-core workers up to `max_pool_size`;
/// past that the [`RejectionPolicy`] decides. Non-core workers idle out
/// after `keep_alive_time`; core workers do too when core-thread timeout is
/// enabled.
///
/// The pool is treated as a process-lifetime resource: the facade never
/// tears it down, and close/join exist only as crate-internal test
/// plumbing.
#[derive(Clone)]
pub struct ThreadPool {
    receiver: Receiver<TaskFn>,
    share: Arc<SharedData>,

    core_pool_size: usize,
    max_pool_size: usize,
    keep_alive_time: Duration,
    allow_core_thread_timeout: bool,
    rejection_policy: RejectionPolicy,
    thread_factory: Arc<ThreadFactory>,
}

impl ThreadPool {
    /// Builds a thread pool from a configuration(builder).
    ///
    /// This assumes arguments of the builder are valid.
    pub(crate) fn from_builder(builder: ThreadPoolBuilder) -> Self {
        let (sender, receiver) = bounded(builder.queue_capacity);
        Self {
            receiver,
            share: Arc::new(SharedData {
                sender: Mutex::new(Some(sender)),
                core_workers: Mutex::new(Some(Vec::default())),
                workers: Mutex::new(Some(Vec::default())),
            }),
            core_pool_size: builder.core_pool_size,
            max_pool_size: builder.max_pool_size,
            keep_alive_time: builder.keep_alive_time,
            allow_core_thread_timeout: builder.allow_core_thread_timeout,
            rejection_policy: builder.rejection_policy,
            thread_factory: builder.thread_factory,
        }
    }

    /// Accepts a task for execution in the future.
    ///
    /// If the task queue is full and no worker thread can be allocated,
    /// the configured [`RejectionPolicy`] decides: block until a slot
    /// frees, or drop the task.
    ///
    /// # Errors
    ///
    /// [`ExecError::Closed`] if the pool no longer accepts work.
    pub fn execute<F>(&self, f: F) -> ExecResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.execute_boxed(Box::new(f))
    }

    pub(crate) fn execute_boxed(&self, task: TaskFn) -> ExecResult<()> {
        if self.is_closed() {
            return Err(ExecError::Closed);
        }

        let mut core_workers = self.share.core_workers.lock().unwrap();
        if let Some(core_workers) = core_workers.as_mut() {
            if core_workers.len() < self.core_pool_size {
                let worker = self.create_worker(task, true);
                core_workers.push(worker);
                return Ok(());
            }
            // With core-thread timeout, a core slot may hold an expired
            // thread that can be relaunched instead of queueing.
            if self.core_threads_expire() {
                if let Some(idle) = core_workers.iter_mut().find(|w| w.is_finished()) {
                    idle.restart(task);
                    return Ok(());
                }
            }
        }
        drop(core_workers);
        self.send_task(task)
    }

    /// Counts all live worker threads.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.share.num_of_live_workers()
    }

    /// The number of workers the pool currently holds, live or expired.
    #[must_use]
    pub fn pool_size(&self) -> usize {
        let len = |workers: &Mutex<Option<Vec<Worker>>>| {
            workers.lock().unwrap().as_ref().map_or(0, Vec::len)
        };
        len(&self.share.core_workers) + len(&self.share.workers)
    }

    /// The number of tasks waiting in the bounded queue.
    #[must_use]
    pub fn queue_len(&self) -> usize {
        self.receiver.len()
    }

    #[must_use]
    pub fn max_pool_size(&self) -> usize {
        self.max_pool_size
    }

    /// Stops accepting tasks. Tasks already queued are still processed.
    ///
    /// The facade never calls this; pools are process-lifetime singletons.
    /// Tests use it to wind a pool down deterministically.
    pub(crate) fn close(&self) {
        self.share.sender.lock().unwrap().take();
    }

    /// Returns `true` if the pool no longer accepts tasks.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.share.sender.lock().unwrap().is_none()
    }

    /// Closes the pool and joins every worker thread. Test plumbing, as
    /// with [`ThreadPool::close`].
    pub(crate) fn wait(&self) -> std::thread::Result<()> {
        self.close();
        Self::wait_workers(self.share.core_workers.lock().unwrap().take())?;
        Self::wait_workers(self.share.workers.lock().unwrap().take())
    }

    fn wait_workers(workers: Option<Vec<Worker>>) -> std::thread::Result<()> {
        if let Some(workers) = workers {
            for worker in workers {
                worker.join()?;
            }
        }
        Ok(())
    }

    fn core_threads_expire(&self) -> bool {
        self.allow_core_thread_timeout && !self.keep_alive_time.is_zero()
    }

    fn create_worker(&self, task: TaskFn, core: bool) -> Worker {
        let resident = core && !self.core_threads_expire();
        Worker::new(
            resident,
            self.keep_alive_time,
            self.thread_factory.clone(),
            self.receiver.clone(),
            task,
        )
    }

    fn send_task(&self, task: TaskFn) -> ExecResult<()> {
        let sender = self.share.sender.lock().unwrap();
        let Some(sender_ref) = sender.as_ref() else {
            return Err(ExecError::Closed);
        };

        if let Err(err) = sender_ref.try_send(task) {
            drop(sender);
            return match err {
                TrySendError::Full(task) => self.process_task_if_queue_full(task),
                TrySendError::Disconnected(_) => Err(ExecError::Closed),
            };
        }
        Ok(())
    }

    fn process_task_if_queue_full(&self, task: TaskFn) -> ExecResult<()> {
        let mut workers = self.share.workers.lock().unwrap();
        if workers.is_none() {
            // `wait` took the workers and is closing the pool, but the
            // task was already accepted.
            return self.reject(task);
        }

        let non_core_workers = workers.as_mut().unwrap();
        if let Some(idle) = non_core_workers.iter_mut().find(|w| w.is_finished()) {
            idle.restart(task);
            return Ok(());
        }

        if non_core_workers.len() < self.max_pool_size - self.core_pool_size {
            let worker = self.create_worker(task, false);
            non_core_workers.push(worker);
            Ok(())
        } else {
            drop(workers);
            self.reject(task)
        }
    }

    fn reject(&self, task: TaskFn) -> ExecResult<()> {
        match self.rejection_policy {
            RejectionPolicy::BlockingPut => {
                let sender = {
                    let guard = self.share.sender.lock().unwrap();
                    match guard.as_ref() {
                        Some(sender) => sender.clone(),
                        None => return Err(ExecError::Closed),
                    }
                };
                // Suspends the submitter until a queue slot frees up.
                sender.send(task).map_err(|_| ExecError::Closed)
            }
            RejectionPolicy::Discard => {
                tracing::error!(
                    backtrace = %Backtrace::capture(),
                    "queue full, discarding rejected task"
                );
                drop(task);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{RejectionPolicy, ThreadPoolBuilder};
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc,
        },
        thread,
        time::{Duration, Instant},
    };

    #[test]
    fn executes_tasks_across_many_submitters() {
        let thread_pool = ThreadPoolBuilder::default()
            .core_pool_size(4)
            .max_pool_size(10)
            .queue_capacity(100)
            .keep_alive_time(Duration::from_secs(100))
            .build();

        let sum = Arc::new(AtomicUsize::new(0));
        let mut handles = Vec::new();
        for _ in 0..10 {
            let sum = sum.clone();
            let thread_pool = thread_pool.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..10 {
                    let sum = sum.clone();
                    thread_pool
                        .execute(move || {
                            sum.fetch_add(1, Ordering::SeqCst);
                        })
                        .unwrap();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let core_workers = thread_pool.share.core_workers.lock().unwrap();
        assert_eq!(4, core_workers.as_ref().unwrap().len());
        drop(core_workers);

        thread_pool.wait().unwrap();
        assert_eq!(100, sum.load(Ordering::Relaxed));
    }

    #[test]
    fn blocking_put_blocks_the_submitter_instead_of_rejecting() {
        let thread_pool = ThreadPoolBuilder::default()
            .core_pool_size(1)
            .max_pool_size(1)
            .queue_capacity(1)
            .rejection_policy(RejectionPolicy::BlockingPut)
            .build();

        let ran = Arc::new(AtomicUsize::new(0));
        let start = Instant::now();
        for _ in 0..3 {
            let ran = ran.clone();
            thread_pool
                .execute(move || {
                    thread::sleep(Duration::from_millis(100));
                    ran.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }
        // The first task occupies the only worker and the second fills the
        // queue; the third submission must have blocked until the worker
        // freed a slot, not raised a rejection.
        assert!(start.elapsed() >= Duration::from_millis(90));

        thread_pool.wait().unwrap();
        assert_eq!(3, ran.load(Ordering::SeqCst));
    }

    #[test]
    fn discard_drops_overflow_silently() {
        let thread_pool = ThreadPoolBuilder::default()
            .core_pool_size(1)
            .max_pool_size(1)
            .queue_capacity(1)
            .rejection_policy(RejectionPolicy::Discard)
            .build();

        let ran = Arc::new(AtomicUsize::new(0));
        for _ in 0..4 {
            let ran = ran.clone();
            thread_pool
                .execute(move || {
                    thread::sleep(Duration::from_millis(100));
                    ran.fetch_add(1, Ordering::SeqCst);
                })
                .unwrap();
        }

        thread_pool.wait().unwrap();
        // One running, one queued, the rest discarded.
        assert_eq!(2, ran.load(Ordering::SeqCst));
    }

    #[test]
    fn closed_pool_refuses_tasks() {
        let thread_pool = ThreadPoolBuilder::default().build();
        thread_pool.close();
        assert!(thread_pool.is_closed());
        assert!(thread_pool.execute(|| ()).is_err());
    }

    #[test]
    fn named_threads_carry_the_pool_prefix() {
        let thread_pool = ThreadPoolBuilder::default()
            .core_pool_size(1)
            .max_pool_size(1)
            .queue_capacity(10)
            .named_threads("probe")
            .build();

        let (tx, rx) = crossbeam_channel::bounded(1);
        thread_pool
            .execute(move || {
                let name = thread::current().name().map(str::to_string);
                tx.send(name).unwrap();
            })
            .unwrap();

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap().unwrap();
        assert!(name.starts_with("probe-pool-"));
        thread_pool.wait().unwrap();
    }

    #[test]
    fn queue_len_reflects_waiting_tasks() {
        let thread_pool = ThreadPoolBuilder::default()
            .core_pool_size(1)
            .max_pool_size(1)
            .queue_capacity(5)
            .build();

        thread_pool
            .execute(|| thread::sleep(Duration::from_millis(200)))
            .unwrap();
        for _ in 0..3 {
            thread_pool.execute(|| ()).unwrap();
        }
        assert_eq!(3, thread_pool.queue_len());
        assert_eq!(1, thread_pool.pool_size());
        thread_pool.wait().unwrap();
    }
}
