use crate::config::{Config, DEFAULT_TIMEOUT};
use crate::error::{Error, Result};
use crate::executor::batch::{Batch, Signal};
use crate::executor::failure::FailureCapture;
use crate::executor::worker::LiveWorkers;
use crate::executor::{CancelToken, Task, TaskError, WorkerPool};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How a single `execute` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    Failed,
    TimedOut,
    Interrupted,
}

/// Runs a set of independent tasks in parallel, failing fast.
///
/// Every call to [`execute`](Executor::execute) builds a fresh pool of
/// `num_threads` workers, runs all tasks on it, and waits at most `timeout`.
/// The first task failure cancels the rest of the batch and is returned as
/// [`Error::Task`]; any failure after it is dropped. The pool is always shut
/// down before `execute` returns.
///
/// ```
/// use batchrun::{task, Executor, TaskError};
///
/// let mut executor = Executor::new(4).unwrap();
/// executor.push(task::from_fn(|_| Ok(())));
/// executor.push(task::from_fn(|_| Err(TaskError::new("disk full"))));
///
/// let err = executor.execute().unwrap_err();
/// assert_eq!(err.to_string(), "disk full");
/// ```
pub struct Executor {
    config: Config,
    tasks: Vec<Arc<dyn Task>>,
    interrupt_tx: Sender<()>,
    interrupt_rx: Receiver<()>,
    last_pool: Mutex<Option<Arc<LiveWorkers>>>,
    pools_created: AtomicU64,
}

/// Aborts the wait of an in-flight [`Executor::execute`] call.
///
/// Interrupts pending when a call starts are discarded before its pool is
/// built. An interrupt sent concurrently with the start of a call can
/// therefore be lost; send it once the call is known to be waiting.
#[derive(Debug, Clone)]
pub struct Interrupter {
    tx: Sender<()>,
}

impl Interrupter {
    pub fn interrupt(&self) {
        // a pending interrupt is enough
        let _ = self.tx.try_send(());
    }
}

impl Executor {
    /// Executor with the default timeout of 1000 seconds.
    pub fn new(num_threads: usize) -> Result<Self> {
        Self::with_timeout(num_threads, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(num_threads: usize, timeout: Duration) -> Result<Self> {
        let config = Config::builder()
            .num_threads(num_threads)
            .timeout(timeout)
            .build()?;
        Self::with_config(config)
    }

    pub fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        let (interrupt_tx, interrupt_rx) = bounded(1);

        Ok(Self {
            config,
            tasks: Vec::new(),
            interrupt_tx,
            interrupt_rx,
            last_pool: Mutex::new(None),
            pools_created: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn tasks(&self) -> &[Arc<dyn Task>] {
        &self.tasks
    }

    pub fn tasks_mut(&mut self) -> &mut Vec<Arc<dyn Task>> {
        &mut self.tasks
    }

    pub fn push<T: Task + 'static>(&mut self, task: T) {
        self.tasks.push(Arc::new(task));
    }

    pub fn clear_tasks(&mut self) {
        self.tasks.clear();
    }

    pub fn interrupter(&self) -> Interrupter {
        Interrupter {
            tx: self.interrupt_tx.clone(),
        }
    }

    /// Worker threads of the most recent pool that have not exited yet.
    pub fn active_workers(&self) -> usize {
        self.last_pool.lock().as_ref().map_or(0, |live| live.get())
    }

    pub fn pools_created(&self) -> u64 {
        self.pools_created.load(Ordering::Relaxed)
    }

    /// Run every task and report the first failure, if any.
    pub fn execute(&self) -> Result<()> {
        self.run_batch(None)
    }

    fn run_batch(&self, parent: Option<&CancelToken>) -> Result<()> {
        if self.tasks.is_empty() {
            tracing::debug!("no tasks to execute");
            return Ok(());
        }

        // interrupts aimed at an earlier call
        while self.interrupt_rx.try_recv().is_ok() {}

        let pool = match parent {
            Some(parent) => WorkerPool::with_parent(&self.config, parent)?,
            None => WorkerPool::new(&self.config)?,
        };
        self.pools_created.fetch_add(1, Ordering::Relaxed);
        *self.last_pool.lock() = Some(pool.live());

        let capture = Arc::new(FailureCapture::new(pool.control()));
        let start = Instant::now();

        tracing::debug!(
            tasks = self.tasks.len(),
            threads = self.config.num_threads,
            timeout = ?self.config.timeout,
            "dispatching batch"
        );

        let signals = Batch::dispatch(&pool, &self.tasks, capture.clone())?;
        let outcome = self.wait(&signals);

        let result = match outcome {
            Outcome::Completed | Outcome::Failed => match capture.take() {
                Some(err) => Err(Error::Task(err)),
                None if outcome == Outcome::Completed => Ok(()),
                // every job was discarded without a failure: cancelled from outside
                None => Err(Error::Interrupted),
            },
            Outcome::TimedOut | Outcome::Interrupted => {
                capture.cancel();
                match capture.take() {
                    Some(err) => Err(Error::Task(err)),
                    None if outcome == Outcome::TimedOut => Err(Error::Timeout(self.config.timeout)),
                    None => Err(Error::Interrupted),
                }
            }
        };

        pool.shutdown();
        match &result {
            Ok(()) => {
                if !pool.await_termination(self.config.shutdown_grace) {
                    tracing::warn!(
                        live = pool.live_workers(),
                        grace = ?self.config.shutdown_grace,
                        "workers still running after shutdown grace"
                    );
                }
                tracing::debug!(elapsed = ?start.elapsed(), "batch completed");
            }
            Err(err) => {
                tracing::warn!(?outcome, elapsed = ?start.elapsed(), error = %err, "batch failed");
            }
        }

        result
    }

    fn wait(&self, signals: &Receiver<Signal>) -> Outcome {
        let timeout = self.config.timeout;

        select! {
            recv(signals) -> signal => match signal {
                Ok(Signal::Completed) => Outcome::Completed,
                Ok(Signal::Failed) => Outcome::Failed,
                // all wrappers dropped without completing
                Err(_) => Outcome::Failed,
            },
            recv(self.interrupt_rx) -> _ => Outcome::Interrupted,
            default(timeout) => Outcome::TimedOut,
        }
    }
}

/// Executors nest: the inner batch runs as one task of the outer one and is
/// cancelled along with it.
impl Task for Executor {
    fn run(&self, cancel: &CancelToken) -> std::result::Result<(), TaskError> {
        self.run_batch(Some(cancel)).map_err(TaskError::from)
    }

    fn name(&self) -> &str {
        "executor"
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("config", &self.config)
            .field("tasks", &self.tasks.len())
            .field("pools_created", &self.pools_created())
            .finish()
    }
}
