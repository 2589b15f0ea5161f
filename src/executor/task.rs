//! Task representation and failure type.

use super::cancel::CancelToken;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A unit of work run by an [`Executor`](crate::Executor).
///
/// Tasks in one batch are independent of each other and run in no particular
/// order. A long-running task should check `cancel` at its safe points and
/// return early once it is set; the executor never kills a thread.
pub trait Task: Send + Sync {
    fn run(&self, cancel: &CancelToken) -> Result<(), TaskError>;

    /// Label used in log events.
    fn name(&self) -> &str {
        "task"
    }
}

impl<T: Task + ?Sized> Task for Arc<T> {
    fn run(&self, cancel: &CancelToken) -> Result<(), TaskError> {
        (**self).run(cancel)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Failure reported by a task. Displays as exactly the message the task gave.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct TaskError {
    message: String,
    #[source]
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl TaskError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an arbitrary error, keeping it reachable through `source()`.
    pub fn from_error<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: err.to_string(),
            source: Some(Arc::new(err)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "task panicked".to_string()
        };
        Self::new(message)
    }
}

impl From<crate::Error> for TaskError {
    fn from(err: crate::Error) -> Self {
        match err {
            crate::Error::Task(inner) => inner,
            other => TaskError::from_error(other),
        }
    }
}

/// Adapts a closure into a [`Task`]. See [`from_fn`].
pub struct FnTask<F> {
    name: String,
    func: F,
}

impl<F> FnTask<F> {
    pub fn named<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }
}

impl<F> Task for FnTask<F>
where
    F: Fn(&CancelToken) -> Result<(), TaskError> + Send + Sync,
{
    fn run(&self, cancel: &CancelToken) -> Result<(), TaskError> {
        (self.func)(cancel)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl<F> std::fmt::Debug for FnTask<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTask").field("name", &self.name).finish()
    }
}

/// Build a task from a closure.
///
/// ```
/// use batchrun::{task, Executor, TaskError};
/// use std::time::Duration;
///
/// let mut executor = Executor::new(2).unwrap();
/// executor.push(task::from_fn(|cancel| {
///     if cancel.wait_timeout(Duration::from_millis(10)) {
///         return Err(TaskError::new("cancelled"));
///     }
///     Ok(())
/// }));
/// assert!(executor.execute().is_ok());
/// ```
pub fn from_fn<F>(func: F) -> FnTask<F>
where
    F: Fn(&CancelToken) -> Result<(), TaskError> + Send + Sync,
{
    FnTask {
        name: "task".to_string(),
        func,
    }
}

static JOB_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(u64);

impl JobId {
    fn next() -> Self {
        JobId(JOB_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Internal unit queued on a worker pool.
pub(crate) struct Job {
    pub(crate) id: JobId,
    pub(crate) func: Box<dyn FnOnce() + Send + 'static>,
}

impl Job {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Job {
            id: JobId::next(),
            func: Box::new(f),
        }
    }

    pub fn execute(self) {
        (self.func)();
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_from_fn_runs_closure() {
        let task = from_fn(|_| Err(TaskError::new("boom"))).named("exploder");
        let err = task.run(&CancelToken::new()).unwrap_err();
        assert_eq!(err.message(), "boom");
        assert_eq!(task.name(), "exploder");
    }

    #[test]
    fn test_from_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = TaskError::from_error(io);
        assert_eq!(err.to_string(), "disk gone");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_panic_payloads() {
        let err = TaskError::from_panic(Box::new("static str"));
        assert_eq!(err.message(), "static str");

        let err = TaskError::from_panic(Box::new(String::from("owned")));
        assert_eq!(err.message(), "owned");

        let err = TaskError::from_panic(Box::new(42u8));
        assert_eq!(err.message(), "task panicked");
    }

    #[test]
    fn test_job_ids_are_unique() {
        let a = Job::new(|| {});
        let b = Job::new(|| {});
        assert_ne!(a.id, b.id);
    }
}
