//! Core scheduling: tasks, completion handles, the bounded pool and the scheduler.

pub mod completion;
mod deadline;
pub mod error;
pub mod scheduler;
pub mod task;
pub mod worker_pool;

pub use completion::{TaskHandle, TaskOutcome};
pub use error::{SchedulerError, TaskError};
pub use scheduler::{LifecycleState, ShutdownOutcome, SimpleTaskScheduler, TaskScheduler};
pub use task::Task;
pub use worker_pool::{is_interrupted, SchedulerStats};
