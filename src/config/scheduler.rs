//! Task scheduler configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::ConfigLoader;

/// Key for the maximum worker count.
pub const POOL_SIZE_KEY: &str = "task.pool.size";
/// Key for the per-task timeout in milliseconds.
pub const TASK_TIMEOUT_KEY: &str = "task.timeout";

/// Default maximum worker count.
pub const DEFAULT_POOL_SIZE: usize = 10;
/// Default per-task timeout in milliseconds.
pub const DEFAULT_TASK_TIMEOUT_MS: u64 = 60_000;
/// Default backlog capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
/// Default idle time before a non-core worker retires, in milliseconds.
pub const DEFAULT_KEEP_ALIVE_MS: u64 = 60_000;
/// Default length of each shutdown drain window, in milliseconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;

/// Scheduler configuration.
///
/// Only `pool_size` and `task_timeout_ms` are read from [`ConfigLoader`];
/// the rest keep their defaults unless set explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Maximum concurrent workers. Core workers are half of this.
    pub pool_size: usize,
    /// Per-task deadline in milliseconds, measured from submission.
    pub task_timeout_ms: u64,
    /// Backlog capacity before the pool grows past core or the caller runs the task.
    pub queue_capacity: usize,
    /// Idle milliseconds before a worker above core size retires.
    pub keep_alive_ms: u64,
    /// Length of each of the two shutdown windows, in milliseconds.
    pub shutdown_timeout_ms: u64,
    /// Prefix for worker and timer thread names.
    pub thread_name_prefix: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
            task_timeout_ms: DEFAULT_TASK_TIMEOUT_MS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            keep_alive_ms: DEFAULT_KEEP_ALIVE_MS,
            shutdown_timeout_ms: DEFAULT_SHUTDOWN_TIMEOUT_MS,
            thread_name_prefix: "browseruse".into(),
        }
    }
}

impl SchedulerConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `task.pool.size` and `task.timeout` from `loader`.
    ///
    /// Negative values are logged and replaced by the defaults.
    #[must_use]
    pub fn from_loader(loader: &ConfigLoader) -> Self {
        let pool_size = non_negative(
            loader.get_int(POOL_SIZE_KEY, i64::try_from(DEFAULT_POOL_SIZE).unwrap_or(i64::MAX)),
            POOL_SIZE_KEY,
            DEFAULT_POOL_SIZE,
        );
        let task_timeout_ms = non_negative(
            loader.get_int(TASK_TIMEOUT_KEY, i64::try_from(DEFAULT_TASK_TIMEOUT_MS).unwrap_or(i64::MAX)),
            TASK_TIMEOUT_KEY,
            DEFAULT_TASK_TIMEOUT_MS,
        );

        Self {
            pool_size,
            task_timeout_ms,
            ..Self::default()
        }
    }

    /// Set the maximum worker count.
    #[must_use]
    pub const fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Set the per-task timeout.
    #[must_use]
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the backlog capacity.
    #[must_use]
    pub const fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Set the idle retirement delay for workers above core size.
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive_ms = u64::try_from(keep_alive.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the length of each shutdown window.
    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the thread name prefix.
    #[must_use]
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    /// Workers kept alive while idle: half the pool size, rounded down.
    #[must_use]
    pub const fn core_size(&self) -> usize {
        self.pool_size / 2
    }

    /// Per-task timeout as a `Duration`.
    #[must_use]
    pub const fn task_timeout(&self) -> Duration {
        Duration::from_millis(self.task_timeout_ms)
    }

    /// Idle retirement delay as a `Duration`.
    #[must_use]
    pub const fn keep_alive(&self) -> Duration {
        Duration::from_millis(self.keep_alive_ms)
    }

    /// Shutdown window as a `Duration`.
    #[must_use]
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.pool_size == 0 {
            return Err("pool_size must be greater than 0".into());
        }
        if self.task_timeout_ms == 0 {
            return Err("task_timeout_ms must be greater than 0".into());
        }
        if self.queue_capacity == 0 {
            return Err("queue_capacity must be greater than 0".into());
        }
        if self.keep_alive_ms == 0 {
            return Err("keep_alive_ms must be greater than 0".into());
        }
        if self.shutdown_timeout_ms == 0 {
            return Err("shutdown_timeout_ms must be greater than 0".into());
        }
        Ok(())
    }

    /// Parse configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

fn non_negative<T>(value: i64, key: &str, default: T) -> T
where
    T: TryFrom<i64> + std::fmt::Display + Copy,
{
    T::try_from(value).unwrap_or_else(|_| {
        warn!(key = key, value = value, default = %default, "Negative configuration value, using default");
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = SchedulerConfig::new();
        assert_eq!(cfg.pool_size, 10);
        assert_eq!(cfg.core_size(), 5);
        assert_eq!(cfg.task_timeout(), Duration::from_secs(60));
        assert_eq!(cfg.queue_capacity, 100);
        assert_eq!(cfg.keep_alive(), Duration::from_secs(60));
        assert_eq!(cfg.shutdown_timeout(), Duration::from_secs(5));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_core_size_rounds_down() {
        assert_eq!(SchedulerConfig::new().with_pool_size(1).core_size(), 0);
        assert_eq!(SchedulerConfig::new().with_pool_size(4).core_size(), 2);
        assert_eq!(SchedulerConfig::new().with_pool_size(7).core_size(), 3);
    }

    #[test]
    fn test_validation_rejects_zero() {
        assert!(SchedulerConfig::new().with_pool_size(0).validate().is_err());
        assert!(SchedulerConfig::new().with_queue_capacity(0).validate().is_err());
        assert!(SchedulerConfig::new()
            .with_task_timeout(Duration::ZERO)
            .validate()
            .is_err());
        assert!(SchedulerConfig::new()
            .with_shutdown_timeout(Duration::from_micros(10))
            .validate()
            .is_err());
    }

    #[test]
    fn test_sub_second_keep_alive_is_kept() {
        let cfg = SchedulerConfig::new().with_keep_alive(Duration::from_millis(500));
        assert_eq!(cfg.keep_alive_ms, 500);
        assert_eq!(cfg.keep_alive(), Duration::from_millis(500));
        assert!(cfg.validate().is_ok());

        let err = SchedulerConfig::new()
            .with_keep_alive(Duration::from_micros(200))
            .validate()
            .unwrap_err();
        assert!(err.contains("keep_alive_ms"));
    }

    #[test]
    fn test_from_loader() {
        let loader = ConfigLoader::from_pairs([("task.pool.size", "4"), ("task.timeout", "5000")]);
        let cfg = SchedulerConfig::from_loader(&loader);
        assert_eq!(cfg.pool_size, 4);
        assert_eq!(cfg.task_timeout(), Duration::from_millis(5000));
        assert_eq!(cfg.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_from_loader_negative_falls_back() {
        let loader = ConfigLoader::from_pairs([("task.pool.size", "-3")]);
        let cfg = SchedulerConfig::from_loader(&loader);
        assert_eq!(cfg.pool_size, DEFAULT_POOL_SIZE);
    }

    #[test]
    fn test_from_json_partial() {
        let cfg = SchedulerConfig::from_json_str(r#"{ "pool_size": 2, "task_timeout_ms": 250 }"#).unwrap();
        assert_eq!(cfg.pool_size, 2);
        assert_eq!(cfg.task_timeout(), Duration::from_millis(250));
        assert_eq!(cfg.queue_capacity, DEFAULT_QUEUE_CAPACITY);

        assert!(SchedulerConfig::from_json_str(r#"{ "pool_size": 0 }"#).is_err());
        assert!(SchedulerConfig::from_json_str("not json").is_err());
    }
}
