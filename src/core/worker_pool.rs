//! Bounded worker pool with a caller-runs saturation policy.
//!
//! The pool keeps between `core_size` and `max_size` OS threads. Submission
//! follows a fixed order:
//!
//! 1. Fewer than `core_size` workers alive: start a worker with the job.
//! 2. Otherwise push the job onto the bounded backlog.
//! 3. Backlog full and fewer than `max_size` workers: start a worker with it.
//! 4. Backlog full and pool at `max_size`: run the job on the calling thread.
//!
//! Workers above `core_size` retire after `keep_alive` without work. Worker
//! threads are detached and never keep the process alive.
//!
//! # Design
//!
//! - **No polling**: workers block on channel recv; termination uses a Condvar
//! - **Clean shutdown**: dropping the sender unblocks idle workers once the
//!   backlog is drained
//! - **Lock-free fast path**: atomic counters; the worker-set mutex is only
//!   taken when spawning or retiring threads

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, error, trace, warn};

use super::task::Job;
use super::TaskError;

thread_local! {
    static INTERRUPT: RefCell<Option<Arc<AtomicBool>>> = const { RefCell::new(None) };
}

/// Whether the pool running the current task has entered forced shutdown.
///
/// Rust threads cannot be interrupted from outside, so long-running tasks that
/// want to stop early during a forced shutdown must check this themselves.
/// Always `false` outside a pool worker, including tasks run on the caller's
/// thread under saturation.
#[must_use]
pub fn is_interrupted() -> bool {
    INTERRUPT.with(|flag| {
        flag.borrow()
            .as_ref()
            .is_some_and(|f| f.load(Ordering::Acquire))
    })
}

/// Statistics about pool utilization. Values are racy snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Configured maximum number of worker threads.
    pub pool_size: usize,
    /// Workers kept alive while idle.
    pub core_size: usize,
    /// Worker threads currently alive.
    pub live_workers: usize,
    /// Tasks currently executing on workers.
    pub active_tasks: u64,
    /// Tasks waiting in the backlog.
    pub queued_tasks: u64,
    /// Total tasks submitted.
    pub submitted_tasks: u64,
    /// Total tasks whose handle completed successfully.
    pub completed_tasks: u64,
    /// Total tasks whose handle failed, for any reason.
    pub failed_tasks: u64,
    /// Failed tasks that failed by timeout.
    pub timed_out_tasks: u64,
    /// Tasks refused at submission.
    pub rejected_tasks: u64,
    /// Tasks executed on the submitting thread because the pool was saturated.
    pub caller_runs: u64,
}

/// Internal counters for pool statistics (thread-safe).
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub active_tasks: AtomicU64,
    pub submitted_tasks: AtomicU64,
    pub completed_tasks: AtomicU64,
    pub failed_tasks: AtomicU64,
    pub timed_out_tasks: AtomicU64,
    pub rejected_tasks: AtomicU64,
    pub caller_runs: AtomicU64,
}

impl PoolCounters {
    /// Get a snapshot of the counters; sizing fields are left at zero.
    pub fn snapshot(&self) -> SchedulerStats {
        SchedulerStats {
            active_tasks: self.active_tasks.load(Ordering::Relaxed),
            submitted_tasks: self.submitted_tasks.load(Ordering::Relaxed),
            completed_tasks: self.completed_tasks.load(Ordering::Relaxed),
            failed_tasks: self.failed_tasks.load(Ordering::Relaxed),
            timed_out_tasks: self.timed_out_tasks.load(Ordering::Relaxed),
            rejected_tasks: self.rejected_tasks.load(Ordering::Relaxed),
            caller_runs: self.caller_runs.load(Ordering::Relaxed),
            ..SchedulerStats::default()
        }
    }
}

/// Sizing and naming for a [`BoundedPool`].
#[derive(Debug, Clone)]
pub(crate) struct PoolSettings {
    pub core_size: usize,
    pub max_size: usize,
    pub queue_capacity: usize,
    pub keep_alive: Duration,
    pub thread_name_prefix: String,
}

/// How an accepted job was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Dispatch {
    /// Handed to a newly started worker.
    Started,
    /// Placed in the backlog.
    Queued,
    /// Run to completion on the submitting thread.
    CallerRuns,
}

enum Admission {
    Dispatched(Dispatch),
    Saturated(Job),
    Closed(Job),
}

struct WorkerSet {
    live: usize,
    next_id: u64,
}

struct PoolShared {
    settings: PoolSettings,
    task_rx: Receiver<Job>,
    workers: Mutex<WorkerSet>,
    exited: Condvar,
    counters: Arc<PoolCounters>,
    interrupt: Arc<AtomicBool>,
}

/// Fixed-capacity thread pool fed by a bounded FIFO backlog.
pub(crate) struct BoundedPool {
    shared: Arc<PoolShared>,
    /// Task sender. `None` once the pool stops accepting work.
    task_tx: RwLock<Option<Sender<Job>>>,
}

impl BoundedPool {
    /// Create the pool. No threads start until work arrives.
    pub(crate) fn new(settings: PoolSettings, counters: Arc<PoolCounters>) -> Self {
        let (task_tx, task_rx) = bounded::<Job>(settings.queue_capacity);

        Self {
            shared: Arc::new(PoolShared {
                settings,
                task_rx,
                workers: Mutex::new(WorkerSet { live: 0, next_id: 0 }),
                exited: Condvar::new(),
                counters,
                interrupt: Arc::new(AtomicBool::new(false)),
            }),
            task_tx: RwLock::new(Some(task_tx)),
        }
    }

    /// Dispatch a job. Returns the job back if the pool no longer accepts work.
    ///
    /// Under saturation this runs the job on the calling thread before returning.
    pub(crate) fn execute(&self, job: Job) -> Result<Dispatch, Job> {
        match self.admit(job) {
            Admission::Dispatched(dispatch) => Ok(dispatch),
            Admission::Saturated(job) => {
                self.shared.counters.caller_runs.fetch_add(1, Ordering::Relaxed);
                debug!(task_id = job.id(), "Pool saturated, running task on caller thread");
                job.run();
                Ok(Dispatch::CallerRuns)
            }
            Admission::Closed(job) => Err(job),
        }
    }

    fn admit(&self, job: Job) -> Admission {
        // Held for the whole admission so `close` cannot interleave.
        let task_tx_guard = self.task_tx.read();
        let Some(task_tx) = task_tx_guard.as_ref() else {
            return Admission::Closed(job);
        };

        let job = {
            let mut workers = self.shared.workers.lock();
            if workers.live < self.shared.settings.core_size {
                match self.add_worker(&mut workers, Some(job)) {
                    Ok(()) => return Admission::Dispatched(Dispatch::Started),
                    Err(Some(job)) => job,
                    Err(None) => unreachable!("a first job is always handed back"),
                }
            } else {
                job
            }
        };

        match task_tx.try_send(job) {
            Ok(()) => {
                let mut workers = self.shared.workers.lock();
                if workers.live == 0 {
                    // Nothing else would ever drain the backlog.
                    let _ = self.add_worker(&mut workers, None);
                }
                Admission::Dispatched(Dispatch::Queued)
            }
            Err(TrySendError::Full(job)) => {
                let mut workers = self.shared.workers.lock();
                if workers.live < self.shared.settings.max_size {
                    match self.add_worker(&mut workers, Some(job)) {
                        Ok(()) => Admission::Dispatched(Dispatch::Started),
                        Err(Some(job)) => Admission::Saturated(job),
                        Err(None) => unreachable!("a first job is always handed back"),
                    }
                } else {
                    Admission::Saturated(job)
                }
            }
            Err(TrySendError::Disconnected(job)) => Admission::Closed(job),
        }
    }

    /// Start a worker thread, optionally seeded with its first job.
    ///
    /// On spawn failure the seed job is handed back.
    fn add_worker(&self, workers: &mut WorkerSet, first: Option<Job>) -> Result<(), Option<Job>> {
        workers.next_id += 1;
        let worker_id = workers.next_id;
        let name = format!("{}-task-{worker_id}", self.shared.settings.thread_name_prefix);

        let seed = Arc::new(Mutex::new(first));
        let worker_seed = Arc::clone(&seed);
        let shared = Arc::clone(&self.shared);

        match thread::Builder::new()
            .name(name)
            .spawn(move || run_worker(&shared, worker_id, &worker_seed))
        {
            Ok(_detached) => {
                workers.live += 1;
                Ok(())
            }
            Err(e) => {
                error!(worker_id = worker_id, error = %e, "Failed to spawn worker thread");
                Err(seed.lock().take())
            }
        }
    }

    /// Stop accepting work. Returns `false` if already closed.
    ///
    /// Queued jobs still run; idle workers exit once the backlog is empty.
    pub(crate) fn close(&self) -> bool {
        self.task_tx.write().take().is_some()
    }

    /// Raise the interrupt flag and discard everything still queued.
    ///
    /// Returns the number of discarded jobs, each failed with
    /// [`TaskError::Cancelled`].
    pub(crate) fn shutdown_now(&self) -> usize {
        self.shared.interrupt.store(true, Ordering::Release);
        let discarded: Vec<Job> = self.shared.task_rx.try_iter().collect();
        let count = discarded.len();
        for job in discarded {
            trace!(task_id = job.id(), "Discarding queued task");
            job.abandon(TaskError::Cancelled);
        }
        count
    }

    /// Wait up to `timeout` for every worker to exit.
    pub(crate) fn await_termination(&self, timeout: Duration) -> bool {
        let mut workers = self.shared.workers.lock();
        let _ = self
            .shared
            .exited
            .wait_while_for(&mut workers, |w| w.live > 0, timeout);
        workers.live == 0
    }

    /// Closed and no worker alive.
    pub(crate) fn is_terminated(&self) -> bool {
        self.task_tx.read().is_none() && self.shared.workers.lock().live == 0
    }

    pub(crate) fn active_count(&self) -> usize {
        usize::try_from(self.shared.counters.active_tasks.load(Ordering::Relaxed)).unwrap_or(usize::MAX)
    }

    pub(crate) fn queue_size(&self) -> usize {
        self.shared.task_rx.len()
    }

    pub(crate) fn live_workers(&self) -> usize {
        self.shared.workers.lock().live
    }

    pub(crate) fn settings(&self) -> &PoolSettings {
        &self.shared.settings
    }
}

impl PoolShared {
    fn run_job(&self, worker_id: u64, job: Job) {
        if self.interrupt.load(Ordering::Acquire) {
            job.abandon(TaskError::Cancelled);
            return;
        }

        self.counters.active_tasks.fetch_add(1, Ordering::Relaxed);
        trace!(worker_id = worker_id, task_id = job.id(), "Worker executing task");
        job.run();
        self.counters.active_tasks.fetch_sub(1, Ordering::Relaxed);
    }

    /// Under the worker-set lock: decide whether an idle worker may retire.
    fn try_retire(&self) -> bool {
        let mut workers = self.workers.lock();
        if workers.live > self.settings.core_size && self.task_rx.is_empty() {
            workers.live -= 1;
            self.exited.notify_all();
            true
        } else {
            false
        }
    }
}

/// Worker loop. Blocks on the backlog; exits when the sender is dropped and
/// the backlog is drained, or when retired for idleness.
fn run_worker(shared: &PoolShared, worker_id: u64, seed: &Mutex<Option<Job>>) {
    INTERRUPT.with(|flag| *flag.borrow_mut() = Some(Arc::clone(&shared.interrupt)));
    debug!(worker_id = worker_id, "Worker thread started");

    let first = seed.lock().take();
    if let Some(job) = first {
        shared.run_job(worker_id, job);
    }

    loop {
        match shared.task_rx.recv_timeout(shared.settings.keep_alive) {
            Ok(job) => shared.run_job(worker_id, job),
            Err(RecvTimeoutError::Timeout) => {
                if shared.try_retire() {
                    debug!(worker_id = worker_id, "Idle worker retired");
                    return;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let mut workers = shared.workers.lock();
    workers.live -= 1;
    shared.exited.notify_all();
    drop(workers);

    debug!(worker_id = worker_id, "Worker thread exiting");
}

impl Drop for BoundedPool {
    fn drop(&mut self) {
        if self.close() {
            warn!("Worker pool dropped while open - workers will be detached");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::completion::Completion;
    use crate::core::{Task, TaskHandle};
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;

    fn settings(core: usize, max: usize, queue: usize) -> PoolSettings {
        PoolSettings {
            core_size: core,
            max_size: max,
            queue_capacity: queue,
            keep_alive: Duration::from_secs(60),
            thread_name_prefix: "test".into(),
        }
    }

    fn job(id: u64, task: Task) -> (Job, TaskHandle) {
        let completion = Completion::new();
        let handle = TaskHandle::from_completion(Arc::clone(&completion));
        (Job::new(id, task, completion), handle)
    }

    #[test]
    fn test_pool_counters_snapshot() {
        let counters = PoolCounters::default();
        counters.submitted_tasks.fetch_add(10, Ordering::Relaxed);
        counters.completed_tasks.fetch_add(5, Ordering::Relaxed);
        counters.caller_runs.fetch_add(2, Ordering::Relaxed);

        let stats = counters.snapshot();
        assert_eq!(stats.submitted_tasks, 10);
        assert_eq!(stats.completed_tasks, 5);
        assert_eq!(stats.caller_runs, 2);
        assert_eq!(stats.pool_size, 0);
    }

    #[test]
    fn test_core_workers_start_on_demand() {
        let pool = BoundedPool::new(settings(2, 4, 10), Arc::default());
        assert_eq!(pool.live_workers(), 0);

        let (j, handle) = job(1, Task::new(|| {}));
        assert_eq!(pool.execute(j).ok(), Some(Dispatch::Started));
        assert!(handle.wait_timeout(Duration::from_secs(2)).is_some());
        assert_eq!(pool.live_workers(), 1);
    }

    #[test]
    fn test_zero_core_still_drains_backlog() {
        let pool = BoundedPool::new(settings(0, 1, 10), Arc::default());
        let (j, handle) = job(1, Task::new(|| {}));
        assert_eq!(pool.execute(j).ok(), Some(Dispatch::Queued));
        assert!(matches!(handle.wait_timeout(Duration::from_secs(2)), Some(Ok(()))));
    }

    #[test]
    fn test_saturated_pool_runs_on_caller() {
        let pool = BoundedPool::new(settings(0, 1, 1), Arc::default());
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel::<()>();

        // Occupies the single worker.
        let (blocker, blocker_handle) = job(
            1,
            Task::new(move || {
                started_tx.send(()).unwrap();
                let _ = release_rx.recv();
            }),
        );
        pool.execute(blocker).ok().unwrap();
        started_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        // Fills the backlog.
        let (queued, queued_handle) = job(2, Task::new(|| {}));
        assert_eq!(pool.execute(queued).ok(), Some(Dispatch::Queued));

        let caller = thread::current().id();
        let ran_on = Arc::new(Mutex::new(None));
        let seen = Arc::clone(&ran_on);
        let (overflow, overflow_handle) = job(
            3,
            Task::new(move || {
                *seen.lock() = Some(thread::current().id());
            }),
        );
        assert_eq!(pool.execute(overflow).ok(), Some(Dispatch::CallerRuns));
        assert!(overflow_handle.is_done());
        assert_eq!(*ran_on.lock(), Some(caller));

        release_tx.send(()).unwrap();
        assert!(blocker_handle.wait_timeout(Duration::from_secs(2)).is_some());
        assert!(queued_handle.wait_timeout(Duration::from_secs(2)).is_some());
    }

    #[test]
    fn test_closed_pool_hands_job_back() {
        let pool = BoundedPool::new(settings(1, 2, 10), Arc::default());
        assert!(pool.close());
        assert!(!pool.close());
        assert!(pool.is_terminated());

        let (j, _handle) = job(1, Task::new(|| {}));
        assert!(pool.execute(j).is_err());
    }

    #[test]
    fn test_close_drains_backlog_then_terminates() {
        let counter = Arc::new(AtomicUsize::new(0));
        let pool = BoundedPool::new(settings(1, 1, 10), Arc::default());

        for id in 0..5 {
            let c = Arc::clone(&counter);
            let (j, _handle) = job(
                id,
                Task::new(move || {
                    thread::sleep(Duration::from_millis(5));
                    c.fetch_add(1, Ordering::SeqCst);
                }),
            );
            pool.execute(j).ok().unwrap();
        }

        pool.close();
        assert!(pool.await_termination(Duration::from_secs(5)));
        assert_eq!(counter.load(Ordering::SeqCst), 5);
        assert_eq!(pool.queue_size(), 0);
    }

    #[test]
    fn test_idle_workers_above_core_retire() {
        let mut s = settings(0, 2, 10);
        s.keep_alive = Duration::from_millis(20);
        let pool = BoundedPool::new(s, Arc::default());

        let (j, handle) = job(1, Task::new(|| {}));
        pool.execute(j).ok().unwrap();
        assert!(handle.wait_timeout(Duration::from_secs(2)).is_some());

        // Retirement leaves the pool with no threads but still open.
        assert!(pool.await_termination(Duration::from_secs(2)));
        assert!(!pool.is_terminated());
    }

    #[test]
    fn test_shutdown_now_cancels_backlog() {
        let pool = BoundedPool::new(settings(1, 1, 10), Arc::default());
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let (started_tx, started_rx) = mpsc::channel::<()>();
        let interrupted = Arc::new(AtomicBool::new(false));
        let seen = Arc::clone(&interrupted);

        let (blocker, _) = job(
            1,
            Task::new(move || {
                started_tx.send(()).unwrap();
                let _ = release_rx.recv();
                seen.store(is_interrupted(), Ordering::SeqCst);
            }),
        );
        pool.execute(blocker).ok().unwrap();
        started_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        let (queued, queued_handle) = job(2, Task::new(|| {}));
        pool.execute(queued).ok().unwrap();

        pool.close();
        assert_eq!(pool.shutdown_now(), 1);
        assert!(matches!(queued_handle.outcome(), Some(Err(TaskError::Cancelled))));

        release_tx.send(()).unwrap();
        assert!(pool.await_termination(Duration::from_secs(2)));
        assert!(interrupted.load(Ordering::SeqCst));
        assert!(!is_interrupted());
    }
}
