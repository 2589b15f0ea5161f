//! First-failure capture for one batch.

use super::pool::PoolControl;
use super::task::TaskError;
use parking_lot::Mutex;
use std::sync::Arc;

/// Holds the first failure of a batch and stops the batch's pool.
///
/// The slot and the decision to shut the pool down share one lock, so the
/// failure that reaches the lock first wins and every later one is dropped.
/// "First" means first to acquire the lock, which under contention need not
/// be the failure that happened first in wall-clock time.
pub(crate) struct FailureCapture {
    slot: Mutex<Option<TaskError>>,
    pool: Arc<PoolControl>,
}

impl FailureCapture {
    pub fn new(pool: Arc<PoolControl>) -> Self {
        Self {
            slot: Mutex::new(None),
            pool,
        }
    }

    /// Store `err` and cancel the pool, unless the pool is already stopping.
    /// Returns `true` if `err` was stored.
    pub fn record(&self, err: TaskError) -> bool {
        let mut slot = self.slot.lock();
        if self.pool.is_shutdown() {
            tracing::debug!(error = %err, "discarding failure, batch already stopping");
            return false;
        }

        *slot = Some(err);
        let dropped = self.pool.shutdown_now();
        tracing::debug!(dropped, "batch cancelled after first failure");
        true
    }

    /// Cancel the pool without recording a failure. Returns `false` if the
    /// pool was already stopping.
    pub fn cancel(&self) -> bool {
        let _slot = self.slot.lock();
        if self.pool.is_shutdown() {
            return false;
        }
        self.pool.shutdown_now();
        true
    }

    pub fn take(&self) -> Option<TaskError> {
        self.slot.lock().take()
    }

    #[cfg(test)]
    pub fn is_recorded(&self) -> bool {
        self.slot.lock().is_some()
    }
}
