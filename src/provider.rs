use std::sync::{Arc, OnceLock};

use crate::{
    config::{PoolConfig, Properties},
    ThreadPool, ThreadPoolBuilder,
};

/// Owns exactly one lazily-constructed pool per execution-service instance.
///
/// Sizing is resolved from the [`Properties`] source on first access and
/// frozen for the pool's lifetime. Concurrent first-callers observe the
/// same single pool; `OnceLock` gives the construct-once guarantee the
/// original implemented with double-checked locking.
pub struct PoolProvider {
    type_name: String,
    props: Arc<dyn Properties>,
    pool: OnceLock<ThreadPool>,
}

impl PoolProvider {
    #[must_use]
    pub fn new(type_name: &str, props: Arc<dyn Properties>) -> Self {
        Self {
            type_name: type_name.to_string(),
            props,
            pool: OnceLock::new(),
        }
    }

    /// The pool, constructing it on first use.
    pub fn pool(&self) -> &ThreadPool {
        self.pool.get_or_init(|| {
            let config = PoolConfig::resolve(&self.type_name, self.props.as_ref());
            ThreadPoolBuilder::from_config(&config).build()
        })
    }

    /// The pool, only if a caller has already forced construction.
    #[must_use]
    pub fn existing(&self) -> Option<&ThreadPool> {
        self.pool.get()
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}
