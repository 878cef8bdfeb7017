use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::Receiver;

use crate::{task::TaskFn, ThreadFactory};

/// A worker holds a thread handle and a receiver on the shared task queue.
///
/// Core workers normally stay resident for the pool's lifetime; non-core
/// workers idle out after `keep_alive` without a task. When the pool allows
/// core-thread timeout, core workers idle out too and are restarted on
/// demand.
pub(crate) struct Worker {
    pub(crate) handle: JoinHandle<()>,
    receiver: Receiver<TaskFn>,
    keep_alive: Duration,
    thread_factory: Arc<ThreadFactory>,
    resident: bool,
}

fn spawn_resident_thread(
    thread_factory: &ThreadFactory,
    receiver: Receiver<TaskFn>,
    task: TaskFn,
) -> JoinHandle<()> {
    thread_factory()
        .spawn(move || {
            task();
            while let Ok(task) = receiver.recv() {
                task();
            }
        })
        .expect("failed to spawn a pool thread")
}

fn spawn_expiring_thread(
    thread_factory: &ThreadFactory,
    receiver: Receiver<TaskFn>,
    keep_alive: Duration,
    task: TaskFn,
) -> JoinHandle<()> {
    thread_factory()
        .spawn(move || {
            task();
            while let Ok(task) = receiver.recv_timeout(keep_alive) {
                task();
            }
        })
        .expect("failed to spawn a pool thread")
}

impl Worker {
    pub(crate) fn new(
        resident: bool,
        keep_alive: Duration,
        thread_factory: Arc<ThreadFactory>,
        receiver: Receiver<TaskFn>,
        task: TaskFn,
    ) -> Self {
        Worker {
            keep_alive,
            receiver: receiver.clone(),
            handle: if resident {
                spawn_resident_thread(&*thread_factory, receiver, task)
            } else {
                spawn_expiring_thread(&*thread_factory, receiver, keep_alive, task)
            },
            thread_factory,
            resident,
        }
    }

    /// Spawns a fresh thread for a worker whose previous thread idled out,
    /// making the slot live again.
    pub(crate) fn restart(&mut self, task: TaskFn) {
        debug_assert!(self.is_finished());
        self.handle = if self.resident {
            spawn_resident_thread(&*self.thread_factory, self.receiver.clone(), task)
        } else {
            spawn_expiring_thread(
                &*self.thread_factory,
                self.receiver.clone(),
                self.keep_alive,
                task,
            )
        };
    }

    #[inline]
    pub(crate) fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub(crate) fn join(self) -> thread::Result<()> {
        if self.handle.thread().id() != thread::current().id() {
            self.handle.join()?;
        }
        Ok(())
    }
}
