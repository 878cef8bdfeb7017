use std::{collections::HashMap, time::Duration};

/// A process-wide source of named integer/boolean properties.
///
/// The pool provider resolves its sizing through this trait exactly once,
/// at first pool use; after that the configuration is frozen.
pub trait Properties: Send + Sync {
    fn get_int(&self, key: &str, default: i64) -> i64;

    fn get_bool(&self, key: &str, default: bool) -> bool;
}

/// Properties backed by environment variables.
///
/// A key like `threadpool.corePoolSize` maps to the variable
/// `THREADPOOL_CORE_POOL_SIZE`.
#[derive(Debug, Default)]
pub struct EnvProperties;

fn env_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch);
        } else if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_uppercase());
        } else {
            out.push('_');
        }
    }
    out
}

impl Properties for EnvProperties {
    fn get_int(&self, key: &str, default: i64) -> i64 {
        std::env::var(env_key(key))
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        std::env::var(env_key(key))
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(default)
    }
}

/// In-memory properties, mainly for wiring tests and embedded setups.
#[derive(Debug, Default)]
pub struct MapProperties {
    entries: HashMap<String, String>,
}

impl MapProperties {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.entries.insert(key.to_string(), value.to_string());
        self
    }
}

impl Properties for MapProperties {
    fn get_int(&self, key: &str, default: i64) -> i64 {
        self.entries
            .get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.entries
            .get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }
}

pub const KEY_CORE_POOL_SIZE: &str = "threadpool.corePoolSize";
pub const KEY_MAX_POOL_SIZE: &str = "threadpool.maxPoolSize";
pub const KEY_KEEP_ALIVE_TIME: &str = "threadpool.keepAliveTime";
pub const KEY_WORK_QUEUE_SIZE: &str = "threadpool.workQueueSize";
pub const KEY_ALLOW_CORE_TIMEOUT: &str = "threadpool.allowCoreThreadTimeOut";

pub const DEFAULT_CORE_POOL_SIZE: i64 = 200;
pub const DEFAULT_MAX_POOL_SIZE: i64 = 1000;
/// Minutes.
pub const DEFAULT_KEEP_ALIVE_TIME: i64 = 2;
pub const DEFAULT_WORK_QUEUE_SIZE: i64 = 5;

/// Frozen sizing of one worker pool, resolved from a [`Properties`] source
/// at first use.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub core_pool_size: usize,
    pub max_pool_size: usize,
    pub keep_alive: Duration,
    pub work_queue_capacity: usize,
    pub allow_core_thread_timeout: bool,
    pub type_name: String,
}

impl PoolConfig {
    /// Reads the pool sizing for `type_name` from `props`.
    ///
    /// A configured `maxPoolSize` below `corePoolSize` is raised to
    /// `corePoolSize` rather than rejected.
    pub fn resolve(type_name: &str, props: &dyn Properties) -> Self {
        let core_pool_size =
            props.get_int(KEY_CORE_POOL_SIZE, DEFAULT_CORE_POOL_SIZE).max(0) as usize;
        let mut max_pool_size =
            props.get_int(KEY_MAX_POOL_SIZE, DEFAULT_MAX_POOL_SIZE).max(1) as usize;
        let keep_alive_minutes =
            props.get_int(KEY_KEEP_ALIVE_TIME, DEFAULT_KEEP_ALIVE_TIME).max(0) as u64;
        let work_queue_capacity =
            props.get_int(KEY_WORK_QUEUE_SIZE, DEFAULT_WORK_QUEUE_SIZE).max(1) as usize;

        if max_pool_size < core_pool_size {
            max_pool_size = core_pool_size;
        }

        Self {
            core_pool_size,
            max_pool_size,
            keep_alive: Duration::from_secs(keep_alive_minutes * 60),
            work_queue_capacity,
            allow_core_thread_timeout: props.get_bool(KEY_ALLOW_CORE_TIMEOUT, true),
            type_name: type_name.to_string(),
        }
    }
}

/// Whether the process runs in a production-like environment.
///
/// The deadlock-risk guard is active only outside production. Anything
/// other than `APP_ENV=prod`/`production` (including an unset variable)
/// counts as non-production, so the guard stays on in dev and test.
#[must_use]
pub fn is_production_env() -> bool {
    matches!(
        std::env::var("APP_ENV").as_deref(),
        Ok("prod") | Ok("production")
    )
}
