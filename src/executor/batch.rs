//! Aggregate dispatch of one batch of tasks onto a pool.

use super::cancel::CancelToken;
use super::failure::FailureCapture;
use super::pool::WorkerPool;
use super::task::{Task, TaskError};
use crate::error::{Error, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Signal {
    /// Every task returned.
    Completed,
    /// A failure was recorded.
    Failed,
}

/// Shared by every wrapped task of a batch. The signal channel disconnects
/// once the last wrapper is gone, whether it ran or was discarded.
pub(crate) struct Batch {
    remaining: AtomicUsize,
    capture: Arc<FailureCapture>,
    signal: Sender<Signal>,
    cancel: CancelToken,
}

impl Batch {
    /// Submit every task to `pool`. Submission stops quietly if the pool is
    /// shut down part way, which only happens when a task already failed.
    pub fn dispatch(
        pool: &WorkerPool,
        tasks: &[Arc<dyn Task>],
        capture: Arc<FailureCapture>,
    ) -> Result<Receiver<Signal>> {
        let (signal, signals) = unbounded();
        let batch = Arc::new(Batch {
            remaining: AtomicUsize::new(tasks.len()),
            capture,
            signal,
            cancel: pool.cancel_token(),
        });

        for (submitted, task) in tasks.iter().enumerate() {
            let batch = batch.clone();
            let task = task.clone();
            match pool.execute(move || batch.run_one(task.as_ref())) {
                Ok(()) => {}
                Err(Error::PoolShutdown) => {
                    tracing::debug!(submitted, total = tasks.len(), "pool stopped during dispatch");
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(signals)
    }

    fn run_one(&self, task: &dyn Task) {
        let name = task.name();
        tracing::trace!(task = name, "task started");

        let outcome = catch_unwind(AssertUnwindSafe(|| task.run(&self.cancel)))
            .unwrap_or_else(|payload| Err(TaskError::from_panic(payload)));

        match outcome {
            Ok(()) => tracing::trace!(task = name, "task finished"),
            Err(err) => {
                tracing::warn!(task = name, error = %err, "task failed");
                if self.capture.record(err) {
                    let _ = self.signal.send(Signal::Failed);
                }
            }
        }

        if self.remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
            let _ = self.signal.send(Signal::Completed);
        }
    }
}
