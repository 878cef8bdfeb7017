//! # Taskpool
//!
//! A managed task-execution facade: a bounded worker pool that accepts
//! units of work (single tasks, batches, fire-and-forget jobs), runs them
//! concurrently with configurable capacity, and lets callers retrieve
//! results synchronously, with optional timeouts and cancellation.
//! Application code never touches raw thread-pool primitives; it gains
//! consistent backpressure, thread naming, deadlock-risk detection, and
//! safe bulk-wait semantics.
//!
//! # The facade
//!
//! An [`ExecService`] owns exactly one lazily-built pool, sized from a
//! [`Properties`](config::Properties) source and frozen at first use.
//! Pool threads are named `"<type>-pool-<n>"` so thread dumps read per
//! pool type and so the advisory deadlock-risk guard can recognize a
//! submission coming from inside its own pool.
//!
//! ```no_run
//! use std::sync::Arc;
//! use taskpool::ExecService;
//!
//! let service = Arc::new(ExecService::with_env("pricing"));
//!
//! // Block for one result.
//! let n = service.execute(|| 6 * 7).unwrap();
//! assert_eq!(42, n);
//!
//! // Fan out a batch; `None` results are dropped from the aggregate.
//! let results = service
//!     .execute_all((0..4).map(|i| -> taskpool::Callable<Option<u32>> {
//!         Box::new(move || (i % 2 == 0).then_some(i))
//!     }).collect())
//!     .unwrap();
//! assert_eq!(2, results.len());
//! ```
//!
//! # Build a bare pool
//!
//! The underlying [`ThreadPool`] can also be configured directly with the
//! [`ThreadPoolBuilder`] when no facade is wanted.
//!
//! ```
//! use taskpool::ThreadPoolBuilder;
//! let thread_pool = ThreadPoolBuilder::default()
//!     .core_pool_size(5)
//!     .max_pool_size(10)
//!     .queue_capacity(100)
//!     .build();
//!
//! thread_pool.execute(|| println!("Hello World")).unwrap();
//! ```

mod builder;
mod error;
mod handle;
mod provider;
mod service;
mod thread_pool;

pub mod config;
pub mod context;
pub mod wait;

pub(crate) mod factory;
pub(crate) mod task;
pub(crate) mod worker;

pub use builder::*;
pub use error::{ExecError, ExecResult};
pub use factory::{NamedThreadFactory, DEFAULT_TYPE_NAME};
pub use handle::{CancelToken, TaskHandle};
pub use provider::PoolProvider;
pub use service::ExecService;
pub use task::{cancellation_requested, Callable};
pub use thread_pool::*;
