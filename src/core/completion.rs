//! One-shot completion handles returned by the scheduler.
//!
//! A [`Completion`] is fed by up to two producers, the worker that runs the
//! task and the deadline timer. The first producer wins; later outcomes are
//! discarded. Observers block on a `parking_lot` condvar, poll the handle as a
//! future, or register callbacks that run on the completing thread.
//!
//! Hooks registered with `before_complete` run before the outcome becomes
//! visible to waiters; callbacks registered with `on_complete` run after.

use std::fmt;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use super::TaskError;

/// Outcome of a task or batch.
pub type TaskOutcome = Result<(), TaskError>;

type Callback = Box<dyn FnOnce(&TaskOutcome) + Send + 'static>;

struct CompletionState {
    outcome: Option<TaskOutcome>,
    /// A producer won and is running hooks; the outcome is not yet published.
    completing: bool,
    wakers: Vec<Waker>,
    hooks: Vec<Callback>,
    callbacks: Vec<Callback>,
}

/// Shared completion cell behind every [`TaskHandle`].
pub(crate) struct Completion {
    state: Mutex<CompletionState>,
    ready: Condvar,
}

impl Completion {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(CompletionState {
                outcome: None,
                completing: false,
                wakers: Vec::new(),
                hooks: Vec::new(),
                callbacks: Vec::new(),
            }),
            ready: Condvar::new(),
        })
    }

    /// Store `outcome` unless an outcome is already present.
    ///
    /// Returns `false` when another producer completed first.
    pub(crate) fn complete(&self, outcome: TaskOutcome) -> bool {
        let hooks = {
            let mut state = self.state.lock();
            if state.outcome.is_some() || state.completing {
                return false;
            }
            state.completing = true;
            mem::take(&mut state.hooks)
        };
        for hook in hooks {
            hook(&outcome);
        }

        let (wakers, callbacks) = {
            let mut state = self.state.lock();
            state.outcome = Some(outcome.clone());
            self.ready.notify_all();
            (mem::take(&mut state.wakers), mem::take(&mut state.callbacks))
        };
        for waker in wakers {
            waker.wake();
        }
        for callback in callbacks {
            callback(&outcome);
        }
        true
    }

    /// Run `f` before the outcome is published to waiters.
    ///
    /// Falls back to `on_complete` ordering if a producer already won.
    pub(crate) fn before_complete<F>(&self, f: F)
    where
        F: FnOnce(&TaskOutcome) + Send + 'static,
    {
        let mut state = self.state.lock();
        if let Some(outcome) = state.outcome.clone() {
            drop(state);
            f(&outcome);
        } else if state.completing {
            state.callbacks.push(Box::new(f));
        } else {
            state.hooks.push(Box::new(f));
        }
    }

    /// Run `f` once the outcome is known, immediately if it already is.
    pub(crate) fn on_complete<F>(&self, f: F)
    where
        F: FnOnce(&TaskOutcome) + Send + 'static,
    {
        let mut state = self.state.lock();
        if let Some(outcome) = state.outcome.clone() {
            drop(state);
            f(&outcome);
            return;
        }
        state.callbacks.push(Box::new(f));
    }

    fn outcome(&self) -> Option<TaskOutcome> {
        self.state.lock().outcome.clone()
    }

    fn wait(&self) -> TaskOutcome {
        let mut state = self.state.lock();
        loop {
            if let Some(outcome) = &state.outcome {
                return outcome.clone();
            }
            self.ready.wait(&mut state);
        }
    }

    fn wait_timeout(&self, timeout: Duration) -> Option<TaskOutcome> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        while state.outcome.is_none() {
            if self.ready.wait_until(&mut state, deadline).timed_out() {
                break;
            }
        }
        state.outcome.clone()
    }
}

/// Handle to the eventual completion of a submitted task or batch.
///
/// The handle can be waited on from blocking code, awaited from async code, or
/// polled. Clones observe the same outcome.
///
/// ```rust,ignore
/// let handle = scheduler.execute_async(Task::new(|| {}));
/// handle.wait()?;
/// ```
#[derive(Clone)]
pub struct TaskHandle {
    completion: Arc<Completion>,
}

impl TaskHandle {
    pub(crate) const fn from_completion(completion: Arc<Completion>) -> Self {
        Self { completion }
    }

    /// A handle that has already completed successfully.
    #[must_use]
    pub fn completed() -> Self {
        Self::resolved(Ok(()))
    }

    /// A handle that has already failed with `err`.
    #[must_use]
    pub fn failed(err: TaskError) -> Self {
        Self::resolved(Err(err))
    }

    fn resolved(outcome: TaskOutcome) -> Self {
        let completion = Completion::new();
        completion.complete(outcome);
        Self { completion }
    }

    /// Whether the outcome is known.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.completion.outcome().is_some()
    }

    /// Whether the handle completed with an error.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self.completion.outcome(), Some(Err(_)))
    }

    /// The outcome if already known, without blocking.
    #[must_use]
    pub fn outcome(&self) -> Option<TaskOutcome> {
        self.completion.outcome()
    }

    /// Block the current thread until the outcome is known.
    ///
    /// # Errors
    ///
    /// Returns the [`TaskError`] the handle completed with.
    pub fn wait(&self) -> TaskOutcome {
        self.completion.wait()
    }

    /// Block for at most `timeout`. Returns `None` if still pending.
    ///
    /// This only bounds the observation; it has no effect on the task.
    #[must_use]
    pub fn wait_timeout(&self, timeout: Duration) -> Option<TaskOutcome> {
        self.completion.wait_timeout(timeout)
    }

    /// Await the outcome for at most `timeout`. Returns `None` if still pending.
    #[cfg(feature = "tokio-runtime")]
    pub async fn wait_for(&self, timeout: Duration) -> Option<TaskOutcome> {
        tokio::time::timeout(timeout, self.clone()).await.ok()
    }

    pub(crate) fn on_complete<F>(&self, f: F)
    where
        F: FnOnce(&TaskOutcome) + Send + 'static,
    {
        self.completion.on_complete(f);
    }
}

impl Future for TaskHandle {
    type Output = TaskOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.completion.state.lock();
        if let Some(outcome) = &state.outcome {
            return Poll::Ready(outcome.clone());
        }
        if !state.wakers.iter().any(|w| w.will_wake(cx.waker())) {
            state.wakers.push(cx.waker().clone());
        }
        Poll::Pending
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("outcome", &self.completion.outcome())
            .finish()
    }
}
