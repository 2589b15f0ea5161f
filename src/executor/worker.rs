// worker thread loop
use super::cancel::CancelToken;
use super::task::Job;
use crossbeam_channel::Receiver;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub type WorkerId = usize;

/// Count of worker threads still running, shared between a pool and its
/// threads so the pool can wait for them without holding join handles.
#[derive(Debug, Default)]
pub(crate) struct LiveWorkers {
    count: Mutex<usize>,
    exited: Condvar,
}

impl LiveWorkers {
    pub fn new(count: usize) -> Self {
        Self {
            count: Mutex::new(count),
            exited: Condvar::new(),
        }
    }

    pub fn get(&self) -> usize {
        *self.count.lock()
    }

    pub fn wait_for_zero(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        let mut count = self.count.lock();
        while *count > 0 {
            match timeout.checked_sub(start.elapsed()) {
                Some(remaining) if !remaining.is_zero() => {
                    self.exited.wait_for(&mut count, remaining);
                }
                _ => break,
            }
        }
        *count == 0
    }

    pub fn enter(&self) {
        *self.count.lock() += 1;
    }

    pub fn leave(&self) {
        let mut count = self.count.lock();
        *count = count.saturating_sub(1);
        self.exited.notify_all();
    }
}

// decrements the live count however the thread leaves `run`
struct ExitGuard<'a>(&'a LiveWorkers);

impl Drop for ExitGuard<'_> {
    fn drop(&mut self) {
        self.0.leave();
    }
}

pub(crate) struct Worker {
    pub id: WorkerId,
}

impl Worker {
    pub fn new(id: WorkerId) -> Self {
        Self { id }
    }

    // main loop; ends once the queue is closed and drained
    pub fn run(&self, queue: Receiver<Job>, cancel: CancelToken, live: Arc<LiveWorkers>) {
        let _exit = ExitGuard(&live);

        for job in queue.iter() {
            if cancel.is_cancelled() {
                tracing::trace!(worker = self.id, job = ?job.id, "skipping job of cancelled pool");
                continue;
            }
            self.execute_job(job);
        }

        tracing::trace!(worker = self.id, "worker exiting");
    }

    fn execute_job(&self, job: Job) {
        let id = job.id;
        let start = Instant::now();

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            job.execute();
        }));

        if result.is_err() {
            tracing::warn!(worker = self.id, job = ?id, "job panicked");
        } else {
            tracing::trace!(worker = self.id, job = ?id, elapsed = ?start.elapsed(), "job finished");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_worker_drains_queue_then_exits() {
        let (tx, rx) = unbounded();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let hits = hits.clone();
            tx.send(Job::new(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        }
        drop(tx);

        let live = Arc::new(LiveWorkers::new(1));
        let worker = Worker::new(0);
        worker.run(rx, CancelToken::new(), live.clone());

        assert_eq!(hits.load(Ordering::SeqCst), 5);
        assert_eq!(live.get(), 0);
    }

    #[test]
    fn test_worker_skips_after_cancel() {
        let (tx, rx) = unbounded();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let hits = hits.clone();
            tx.send(Job::new(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        }
        drop(tx);

        let cancel = CancelToken::new();
        cancel.cancel();
        let worker = Worker::new(0);
        worker.run(rx, cancel, Arc::new(LiveWorkers::new(1)));

        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_worker_survives_panic() {
        let (tx, rx) = unbounded();
        let hits = Arc::new(AtomicUsize::new(0));
        tx.send(Job::new(|| panic!("boom"))).unwrap();
        {
            let hits = hits.clone();
            tx.send(Job::new(move || {
                hits.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        }
        drop(tx);

        let live = Arc::new(LiveWorkers::new(1));
        Worker::new(0).run(rx, CancelToken::new(), live.clone());

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(live.get(), 0);
    }

    #[test]
    fn test_wait_for_zero_with_huge_timeout() {
        let live = Arc::new(LiveWorkers::new(0));
        assert!(live.wait_for_zero(Duration::MAX));

        live.enter();
        let leaver = {
            let live = live.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(20));
                live.leave();
            })
        };
        assert!(live.wait_for_zero(Duration::MAX));
        leaver.join().unwrap();
    }

    #[test]
    fn test_wait_for_zero_times_out() {
        let live = LiveWorkers::new(1);
        assert!(!live.wait_for_zero(Duration::from_millis(20)));
    }
}
