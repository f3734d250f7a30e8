//! Bounded asynchronous task scheduler.
//!
//! [`SimpleTaskScheduler`] runs [`Task`]s on a [`BoundedPool`] and hands back a
//! [`TaskHandle`] per submission. Every handle is raced against a deadline of
//! `task_timeout` measured from submission; whichever of the worker and the
//! deadline timer resolves it first wins.
//!
//! A timed-out task is not cancelled. It keeps its worker until it returns on
//! its own, and its late result is discarded.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, trace, warn};

use crate::config::{ConfigLoader, SchedulerConfig};

use super::completion::{Completion, TaskHandle};
use super::deadline::{DeadlineTimer, TimerKey};
use super::task::{Job, Task};
use super::worker_pool::{BoundedPool, PoolCounters, PoolSettings, SchedulerStats};
use super::{SchedulerError, TaskError};

/// Asynchronous task submission.
pub trait TaskScheduler: Send + Sync {
    /// Submit one task. Never panics; failures resolve the returned handle.
    fn execute_async(&self, task: Task) -> TaskHandle;

    /// Submit every task independently and return a handle that completes once
    /// all of them have. The aggregate fails with the first failure observed.
    /// An empty batch yields an already-completed handle.
    fn execute_async_tasks(&self, tasks: Vec<Task>) -> TaskHandle;

    /// Stop accepting tasks and wait for the pool to drain.
    fn shutdown(&self) -> ShutdownOutcome;
}

/// How a call to [`TaskScheduler::shutdown`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// All workers exited within the first window.
    Graceful,
    /// The backlog was discarded and workers exited within the second window.
    Forced,
    /// Some workers were still running after both windows. They stay detached.
    Incomplete,
    /// Shutdown had already been initiated.
    AlreadyShutdown,
}

/// Scheduler lifecycle. Transitions are monotonic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Accepting tasks.
    Running,
    /// Shutdown initiated; workers still alive.
    ShuttingDown,
    /// Shutdown initiated and every worker has exited.
    Terminated,
}

/// Thread-pool backed [`TaskScheduler`].
///
/// - core workers: `pool_size / 2`; max workers: `pool_size`
/// - backlog: `queue_capacity` (100 by default), FIFO
/// - saturation: the submitting thread runs the task itself
/// - per-task timeout: `task_timeout_ms` from submission
pub struct SimpleTaskScheduler {
    config: SchedulerConfig,
    pool: BoundedPool,
    timer: DeadlineTimer,
    counters: Arc<PoolCounters>,
    shutdown: AtomicBool,
    task_ids: AtomicU64,
}

struct BatchState {
    remaining: AtomicUsize,
    first_failure: Mutex<Option<TaskError>>,
}

impl SimpleTaskScheduler {
    /// Create a scheduler.
    ///
    /// # Errors
    ///
    /// - `SchedulerError::InvalidConfig` if the configuration is invalid
    /// - `SchedulerError::Spawn` if the deadline timer thread cannot start
    pub fn new(config: SchedulerConfig) -> Result<Self, SchedulerError> {
        config.validate().map_err(SchedulerError::InvalidConfig)?;

        let timer = DeadlineTimer::start(format!("{}-deadline", config.thread_name_prefix))?;
        let counters = Arc::new(PoolCounters::default());
        let pool = BoundedPool::new(
            PoolSettings {
                core_size: config.core_size(),
                max_size: config.pool_size,
                queue_capacity: config.queue_capacity,
                keep_alive: config.keep_alive(),
                thread_name_prefix: config.thread_name_prefix.clone(),
            },
            Arc::clone(&counters),
        );

        info!(
            pool_size = config.pool_size,
            core_size = config.core_size(),
            queue_capacity = config.queue_capacity,
            task_timeout_ms = config.task_timeout_ms,
            "Task scheduler initialized"
        );

        Ok(Self {
            config,
            pool,
            timer,
            counters,
            shutdown: AtomicBool::new(false),
            task_ids: AtomicU64::new(0),
        })
    }

    /// Create a scheduler from `task.pool.size` and `task.timeout` in `loader`.
    ///
    /// # Errors
    ///
    /// See [`SimpleTaskScheduler::new`].
    pub fn from_loader(loader: &ConfigLoader) -> Result<Self, SchedulerError> {
        Self::new(SchedulerConfig::from_loader(loader))
    }

    /// Create a scheduler from the environment and `application.properties`.
    ///
    /// # Errors
    ///
    /// See [`SimpleTaskScheduler::new`].
    pub fn from_env() -> Result<Self, SchedulerError> {
        Self::from_loader(&ConfigLoader::new())
    }

    /// Submit a closure that cannot fail other than by panicking.
    pub fn spawn<F>(&self, f: F) -> TaskHandle
    where
        F: FnOnce() + Send + 'static,
    {
        self.execute_async(Task::new(f))
    }

    /// Number of tasks currently executing on workers.
    #[must_use]
    pub fn active_count(&self) -> usize {
        self.pool.active_count()
    }

    /// Number of tasks waiting in the backlog.
    #[must_use]
    pub fn queue_size(&self) -> usize {
        self.pool.queue_size()
    }

    /// Whether shutdown has been initiated.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    /// Whether shutdown has been initiated and every worker has exited.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.is_shutdown() && self.pool.is_terminated()
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn lifecycle(&self) -> LifecycleState {
        if !self.is_shutdown() {
            LifecycleState::Running
        } else if self.pool.is_terminated() {
            LifecycleState::Terminated
        } else {
            LifecycleState::ShuttingDown
        }
    }

    /// The configuration this scheduler was built with.
    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Get current pool statistics.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        let settings = self.pool.settings();
        SchedulerStats {
            pool_size: settings.max_size,
            core_size: settings.core_size,
            live_workers: self.pool.live_workers(),
            queued_tasks: self.pool.queue_size() as u64,
            ..self.counters.snapshot()
        }
    }

    /// Cancel the deadline and record the outcome before waiters see it.
    fn track(&self, completion: &Completion, task_id: u64, name: String, timer_key: Option<TimerKey>) {
        let timer = self.timer.clone();
        let counters = Arc::clone(&self.counters);

        completion.before_complete(move |outcome| {
            if let Some(key) = timer_key {
                timer.cancel(key);
            }
            match outcome {
                Ok(()) => {
                    counters.completed_tasks.fetch_add(1, Ordering::Relaxed);
                    debug!(task_id = task_id, task = %name, "Async task completed");
                }
                Err(err) => {
                    counters.failed_tasks.fetch_add(1, Ordering::Relaxed);
                    if err.is_timeout() {
                        counters.timed_out_tasks.fetch_add(1, Ordering::Relaxed);
                    }
                    error!(task_id = task_id, task = %name, error = %err, "Async task failed");
                }
            }
        });
    }
}

impl TaskScheduler for SimpleTaskScheduler {
    fn execute_async(&self, task: Task) -> TaskHandle {
        let task_id = self.task_ids.fetch_add(1, Ordering::Relaxed) + 1;
        let name = task.name().to_owned();
        debug!(task_id = task_id, task = %name, "Submitting async task");

        let completion = Completion::new();
        let handle = TaskHandle::from_completion(Arc::clone(&completion));

        // Armed before dispatch so the deadline counts from submission.
        let timer_key = self.timer.arm(&completion, self.config.task_timeout());
        self.track(&completion, task_id, name, timer_key);
        self.counters.submitted_tasks.fetch_add(1, Ordering::Relaxed);

        match self.pool.execute(Job::new(task_id, task, completion)) {
            Ok(dispatch) => trace!(task_id = task_id, ?dispatch, "Task dispatched"),
            Err(job) => {
                self.counters.rejected_tasks.fetch_add(1, Ordering::Relaxed);
                job.abandon(TaskError::Rejected("scheduler is shut down".into()));
            }
        }

        handle
    }

    fn execute_async_tasks(&self, tasks: Vec<Task>) -> TaskHandle {
        if tasks.is_empty() {
            debug!("Task batch is empty, nothing to submit");
            return TaskHandle::completed();
        }

        let count = tasks.len();
        info!(count = count, "Submitting async task batch");

        let aggregate = Completion::new();
        aggregate.on_complete(move |outcome| match outcome {
            Ok(()) => info!(count = count, "Async task batch completed"),
            Err(err) => error!(count = count, error = %err, "Async task batch failed"),
        });

        let state = Arc::new(BatchState {
            remaining: AtomicUsize::new(count),
            first_failure: Mutex::new(None),
        });

        for task in tasks {
            let handle = self.execute_async(task);
            let state = Arc::clone(&state);
            let aggregate = Arc::clone(&aggregate);

            handle.on_complete(move |outcome| {
                if let Err(err) = outcome {
                    state.first_failure.lock().get_or_insert_with(|| err.clone());
                }
                if state.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    let failure = state.first_failure.lock().take();
                    aggregate.complete(failure.map_or(Ok(()), Err));
                }
            });
        }

        TaskHandle::from_completion(aggregate)
    }

    /// Initiate shutdown and wait for the pool to drain.
    ///
    /// 1. Stop accepting tasks; queued and running tasks continue.
    /// 2. Wait up to `shutdown_timeout` for every worker to exit.
    /// 3. Otherwise discard the backlog (handles fail with
    ///    [`TaskError::Cancelled`]), raise the interrupt flag seen through
    ///    [`is_interrupted`](crate::core::is_interrupted), and wait once more.
    /// 4. If workers are still alive, log and return
    ///    [`ShutdownOutcome::Incomplete`]. Tasks that ignore the interrupt
    ///    flag keep running on detached threads.
    ///
    /// Idempotent: later calls return [`ShutdownOutcome::AlreadyShutdown`].
    fn shutdown(&self) -> ShutdownOutcome {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            debug!("Task scheduler already shut down");
            return ShutdownOutcome::AlreadyShutdown;
        }

        info!("Shutting down task scheduler");
        self.pool.close();

        let window = self.config.shutdown_timeout();
        if self.pool.await_termination(window) {
            info!("Task scheduler shut down");
            return ShutdownOutcome::Graceful;
        }

        warn!(
            active = self.pool.active_count(),
            queued = self.pool.queue_size(),
            "Task scheduler did not drain in time, forcing shutdown"
        );
        let discarded = self.pool.shutdown_now();

        if self.pool.await_termination(window) {
            info!(discarded = discarded, "Task scheduler shut down after forced cancellation");
            ShutdownOutcome::Forced
        } else {
            error!(
                live_workers = self.pool.live_workers(),
                active = self.pool.active_count(),
                "Task scheduler could not shut down; remaining workers are detached"
            );
            ShutdownOutcome::Incomplete
        }
    }
}

impl Drop for SimpleTaskScheduler {
    fn drop(&mut self) {
        // Signal shutdown but don't wait for workers here.
        if !self.shutdown.swap(true, Ordering::AcqRel) {
            self.pool.close();
            debug!("Task scheduler dropped without explicit shutdown - workers will be detached");
        }
        self.timer.close();
    }
}
