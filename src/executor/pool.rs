use super::cancel::CancelToken;
use super::task::Job;
use super::worker::{LiveWorkers, Worker, WorkerId};
use crate::config::Config;
use crate::error::{Error, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Bounded set of worker threads sharing one job queue.
///
/// A pool is built for a single batch and shut down when the batch ends.
/// `shutdown` closes the queue and lets queued jobs finish; `shutdown_now`
/// additionally discards queued jobs and cancels the pool's token so running
/// tasks can stop early. Neither blocks on running jobs.
pub struct WorkerPool {
    workers: Vec<WorkerHandle>,
    control: Arc<PoolControl>,
    live: Arc<LiveWorkers>,
    num_threads: usize,
}

struct WorkerHandle {
    id: WorkerId,
    thread: Option<JoinHandle<()>>,
}

/// Shutdown state of a pool, shareable with whoever may need to stop it.
pub(crate) struct PoolControl {
    // `None` once shut down; dropping the sender closes the queue
    sender: Mutex<Option<Sender<Job>>>,
    backlog: Receiver<Job>,
    cancel: CancelToken,
}

impl PoolControl {
    fn submit(&self, job: Job) -> Result<()> {
        match self.sender.lock().as_ref() {
            Some(tx) => tx.send(job).map_err(|_| Error::PoolShutdown),
            None => Err(Error::PoolShutdown),
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Returns `true` if this call closed the queue.
    pub fn shutdown(&self) -> bool {
        self.sender.lock().take().is_some()
    }

    /// Close the queue, cancel the token and discard queued jobs. Returns how
    /// many jobs were discarded.
    pub fn shutdown_now(&self) -> usize {
        self.shutdown();
        self.cancel.cancel();

        let mut dropped = 0;
        while let Ok(job) = self.backlog.try_recv() {
            tracing::trace!(job = ?job.id, "dropping queued job");
            drop(job);
            dropped += 1;
        }
        dropped
    }
}

impl WorkerPool {
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_cancel(config, CancelToken::new())
    }

    /// Build a pool whose token is cancelled whenever `parent` is.
    pub fn with_parent(config: &Config, parent: &CancelToken) -> Result<Self> {
        Self::with_cancel(config, parent.child())
    }

    fn with_cancel(config: &Config, cancel: CancelToken) -> Result<Self> {
        config.validate()?;
        let num_threads = config.num_threads;

        let (sender, receiver) = unbounded();
        let control = Arc::new(PoolControl {
            sender: Mutex::new(Some(sender)),
            backlog: receiver.clone(),
            cancel,
        });
        let live = Arc::new(LiveWorkers::new(0));

        let mut workers = Vec::with_capacity(num_threads);

        for id in 0..num_threads {
            let worker = Worker::new(id);
            let queue = receiver.clone();
            let cancel = control.cancel.clone();
            let live_clone = live.clone();
            let name = format!("{}-{}", config.thread_name_prefix, id);

            let mut builder = thread::Builder::new().name(name);

            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            live.enter();
            let spawned = builder.spawn(move || {
                worker.run(queue, cancel, live_clone);
            });

            let thread = match spawned {
                Ok(thread) => thread,
                Err(e) => {
                    live.leave();
                    // let the threads already started wind down
                    control.shutdown_now();
                    return Err(Error::executor(format!("spawn failed: {}", e)));
                }
            };

            workers.push(WorkerHandle {
                id,
                thread: Some(thread),
            });
        }

        tracing::debug!(threads = num_threads, prefix = %config.thread_name_prefix, "worker pool started");

        Ok(Self {
            workers,
            control,
            live,
            num_threads,
        })
    }

    pub fn execute<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.control.submit(Job::new(f))
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.control.cancel.clone()
    }

    pub fn is_shutdown(&self) -> bool {
        self.control.is_shutdown()
    }

    pub fn shutdown(&self) {
        if self.control.shutdown() {
            tracing::debug!(threads = self.num_threads, "worker pool shut down");
        }
    }

    pub fn shutdown_now(&self) -> usize {
        let dropped = self.control.shutdown_now();
        tracing::debug!(dropped, "worker pool shut down immediately");
        dropped
    }

    /// Worker threads that have not exited yet.
    pub fn live_workers(&self) -> usize {
        self.live.get()
    }

    /// Wait until every worker has exited. Only meaningful after a shutdown.
    pub fn await_termination(&self, timeout: Duration) -> bool {
        self.live.wait_for_zero(timeout)
    }

    pub(crate) fn control(&self) -> Arc<PoolControl> {
        self.control.clone()
    }

    pub(crate) fn live(&self) -> Arc<LiveWorkers> {
        self.live.clone()
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("num_threads", &self.num_threads)
            .field("live_workers", &self.live_workers())
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();

        // reap finished threads; anything still inside a task is detached
        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                if thread.is_finished() {
                    let _ = thread.join();
                } else {
                    tracing::trace!(worker = worker.id, "detaching busy worker");
                }
            }
        }
    }
}
