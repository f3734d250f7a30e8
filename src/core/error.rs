//! Error types for scheduler operations.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

/// Errors produced while building or configuring a scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Configuration validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A scheduler-owned thread could not be started.
    #[error("failed to spawn {what}: {source}")]
    Spawn {
        /// Which thread failed to start.
        what: &'static str,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

/// Failure carried by a [`TaskHandle`](crate::core::TaskHandle).
///
/// Cloneable so that a single outcome can be observed by the handle owner and
/// by any batch that aggregates it.
#[derive(Debug, Clone, Error)]
pub enum TaskError {
    /// The scheduler refused the task, typically because it is shut down.
    #[error("task rejected: {0}")]
    Rejected(String),
    /// The task returned an error.
    #[error("task failed: {0:#}")]
    Failed(Arc<anyhow::Error>),
    /// The task panicked.
    #[error("task panicked: {0}")]
    Panicked(String),
    /// The task did not complete within the configured window.
    #[error("task timed out after {0:?}")]
    Timeout(Duration),
    /// The task was still queued when shutdown forced the pool down.
    #[error("task cancelled before it started")]
    Cancelled,
}

impl TaskError {
    /// Returns `true` for [`TaskError::Timeout`].
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Returns the task's own error when this is a [`TaskError::Failed`].
    #[must_use]
    pub fn task_error(&self) -> Option<&anyhow::Error> {
        match self {
            Self::Failed(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        Self::Failed(Arc::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_error_display() {
        let err = TaskError::Rejected("scheduler is shut down".into());
        assert_eq!(err.to_string(), "task rejected: scheduler is shut down");

        let err = TaskError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "task timed out after 250ms");

        let err = TaskError::Cancelled;
        assert_eq!(err.to_string(), "task cancelled before it started");
    }

    #[test]
    fn test_failed_keeps_original_error() {
        let err: TaskError = anyhow::anyhow!("disk full").into();
        assert!(!err.is_timeout());
        assert_eq!(err.task_error().map(ToString::to_string).as_deref(), Some("disk full"));
        assert_eq!(err.to_string(), "task failed: disk full");
    }

    #[test]
    fn test_scheduler_error_display() {
        let err = SchedulerError::InvalidConfig("pool_size must be greater than 0".into());
        assert_eq!(
            err.to_string(),
            "invalid configuration: pool_size must be greater than 0"
        );
    }
}
