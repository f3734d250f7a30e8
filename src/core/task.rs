//! Units of work accepted by the scheduler.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::debug;

use super::completion::Completion;
use super::TaskError;

type TaskBody = Box<dyn FnOnce() -> anyhow::Result<()> + Send + 'static>;

/// A zero-argument unit of work.
///
/// Tasks either return nothing ([`Task::new`]) or report failure through an
/// `anyhow::Error` ([`Task::fallible`]). A panic inside the body is caught and
/// surfaces as [`TaskError::Panicked`] on the task's handle. Each task carries
/// a name used only for diagnostics; by default this is the closure's type name.
pub struct Task {
    name: Cow<'static, str>,
    body: TaskBody,
}

impl Task {
    /// Wrap a closure that cannot fail other than by panicking.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            name: Cow::Borrowed(std::any::type_name::<F>()),
            body: Box::new(move || {
                f();
                Ok(())
            }),
        }
    }

    /// Wrap a closure that reports failure through its return value.
    pub fn fallible<F>(f: F) -> Self
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        Self {
            name: Cow::Borrowed(std::any::type_name::<F>()),
            body: Box::new(f),
        }
    }

    /// Replace the diagnostic name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Name used in log lines for this task.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("name", &self.name).finish_non_exhaustive()
    }
}

/// A task paired with the completion it resolves.
pub(crate) struct Job {
    id: u64,
    task: Task,
    completion: Arc<Completion>,
}

impl Job {
    pub(crate) const fn new(id: u64, task: Task, completion: Arc<Completion>) -> Self {
        Self {
            id,
            task,
            completion,
        }
    }

    pub(crate) const fn id(&self) -> u64 {
        self.id
    }

    /// Run the body on the current thread and resolve the completion.
    pub(crate) fn run(self) {
        let Self {
            id,
            task,
            completion,
        } = self;

        let outcome = match panic::catch_unwind(AssertUnwindSafe(task.body)) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(TaskError::from(err)),
            Err(payload) => Err(TaskError::Panicked(panic_message(payload.as_ref()))),
        };

        if !completion.complete(outcome) {
            debug!(
                task_id = id,
                task = %task.name,
                "Task finished after its handle had already completed"
            );
        }
    }

    /// Resolve the completion with `err` without running the body.
    pub(crate) fn abandon(self, err: TaskError) {
        self.completion.complete(Err(err));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TaskHandle;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn run_to_outcome(task: Task) -> Result<(), TaskError> {
        let completion = Completion::new();
        let handle = TaskHandle::from_completion(Arc::clone(&completion));
        Job::new(1, task, completion).run();
        handle.outcome().expect("job resolves its completion")
    }

    #[test]
    fn test_task_runs_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let outcome = run_to_outcome(Task::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }));
        assert!(outcome.is_ok());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fallible_error_is_kept() {
        let outcome = run_to_outcome(Task::fallible(|| Err(anyhow::anyhow!("Test exception"))));
        let err = outcome.unwrap_err();
        assert_eq!(
            err.task_error().map(ToString::to_string).as_deref(),
            Some("Test exception")
        );
    }

    #[test]
    fn test_panic_is_caught() {
        let outcome = run_to_outcome(Task::new(|| panic!("exploded")));
        assert!(matches!(outcome, Err(TaskError::Panicked(msg)) if msg == "exploded"));

        let outcome = run_to_outcome(Task::new(|| panic!("code {}", 7)));
        assert!(matches!(outcome, Err(TaskError::Panicked(msg)) if msg == "code 7"));
    }

    #[test]
    fn test_names() {
        let task = Task::new(|| {});
        assert!(task.name().contains("closure"));

        let task = Task::new(|| {}).with_name("fetch-page");
        assert_eq!(task.name(), "fetch-page");
    }

    #[test]
    fn test_abandon_skips_body() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let completion = Completion::new();
        let handle = TaskHandle::from_completion(Arc::clone(&completion));

        let job = Job::new(
            9,
            Task::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
            }),
            completion,
        );
        assert_eq!(job.id(), 9);
        job.abandon(TaskError::Cancelled);

        assert!(matches!(handle.outcome(), Some(Err(TaskError::Cancelled))));
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
