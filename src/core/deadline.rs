//! Deadline timer backing per-task timeouts.
//!
//! A single thread per scheduler sleeps on a condvar until the earliest armed
//! deadline. When a deadline passes, the entry's completion is failed with
//! [`TaskError::Timeout`]; entries cancelled before that point are simply
//! removed. The timer never touches the task itself.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tracing::{debug, trace};

use super::completion::Completion;
use super::{SchedulerError, TaskError};

/// Identifies one armed deadline so it can be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) struct TimerKey {
    deadline: Instant,
    seq: u64,
}

struct TimerEntry {
    completion: Arc<Completion>,
    timeout: Duration,
}

struct TimerState {
    entries: BTreeMap<TimerKey, TimerEntry>,
    next_seq: u64,
    closed: bool,
}

struct TimerShared {
    state: Mutex<TimerState>,
    wake: Condvar,
}

/// Handle to a scheduler's deadline thread.
#[derive(Clone)]
pub(crate) struct DeadlineTimer {
    shared: Arc<TimerShared>,
}

impl DeadlineTimer {
    /// Start the timer thread.
    pub(crate) fn start(thread_name: String) -> Result<Self, SchedulerError> {
        let shared = Arc::new(TimerShared {
            state: Mutex::new(TimerState {
                entries: BTreeMap::new(),
                next_seq: 0,
                closed: false,
            }),
            wake: Condvar::new(),
        });

        let worker = Arc::clone(&shared);
        thread::Builder::new()
            .name(thread_name)
            .spawn(move || run_timer(&worker))
            .map_err(|source| SchedulerError::Spawn {
                what: "deadline timer",
                source,
            })?;

        Ok(Self { shared })
    }

    /// Fail `completion` with a timeout once `timeout` has elapsed.
    ///
    /// Returns `None` if the deadline is too far out to represent, in which
    /// case nothing is armed.
    pub(crate) fn arm(&self, completion: &Arc<Completion>, timeout: Duration) -> Option<TimerKey> {
        let deadline = Instant::now().checked_add(timeout)?;

        let mut state = self.shared.state.lock();
        let key = TimerKey {
            deadline,
            seq: state.next_seq,
        };
        state.next_seq += 1;

        let earliest = state.entries.keys().next().is_none_or(|first| key < *first);
        state.entries.insert(
            key,
            TimerEntry {
                completion: Arc::clone(completion),
                timeout,
            },
        );
        if earliest {
            self.shared.wake.notify_one();
        }
        Some(key)
    }

    /// Drop an armed deadline. Returns `false` if it already fired.
    pub(crate) fn cancel(&self, key: TimerKey) -> bool {
        self.shared.state.lock().entries.remove(&key).is_some()
    }

    /// Number of armed deadlines.
    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.shared.state.lock().entries.len()
    }

    /// Let the thread exit once every armed deadline has fired or been cancelled.
    pub(crate) fn close(&self) {
        self.shared.state.lock().closed = true;
        self.shared.wake.notify_one();
    }
}

fn run_timer(shared: &TimerShared) {
    trace!("Deadline timer started");
    let mut state = shared.state.lock();

    loop {
        let Some(key) = state.entries.keys().next().copied() else {
            if state.closed {
                break;
            }
            shared.wake.wait(&mut state);
            continue;
        };

        if key.deadline > Instant::now() {
            shared.wake.wait_until(&mut state, key.deadline);
            continue;
        }

        if let Some(entry) = state.entries.remove(&key) {
            // Completion callbacks may call back into `cancel`.
            MutexGuard::unlocked(&mut state, || {
                if entry.completion.complete(Err(TaskError::Timeout(entry.timeout))) {
                    debug!(timeout_ms = entry.timeout.as_millis(), "Task deadline expired");
                }
            });
        }
    }

    trace!("Deadline timer exiting");
}
