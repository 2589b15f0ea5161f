//! Cooperative cancellation.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Signal a running task polls (or blocks on) to learn that its batch was
/// abandoned. Cancellation is advisory: a task that never looks at the token
/// keeps its worker busy until it returns.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    cancelled: AtomicBool,
    lock: Mutex<Vec<CancelToken>>,
    cvar: Condvar,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }

    /// Cancel this token and every child derived from it. Idempotent.
    pub fn cancel(&self) {
        let children = {
            let mut children = self.inner.lock.lock();
            if self.inner.cancelled.swap(true, Ordering::AcqRel) {
                return;
            }
            self.inner.cvar.notify_all();
            std::mem::take(&mut *children)
        };

        for child in children {
            child.cancel();
        }
    }

    /// Block until cancelled or `timeout` elapses. Returns `true` if cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        let mut guard = self.inner.lock.lock();
        while !self.is_cancelled() {
            // wait_for copes with durations too large for an Instant
            match timeout.checked_sub(start.elapsed()) {
                Some(remaining) if !remaining.is_zero() => {
                    self.inner.cvar.wait_for(&mut guard, remaining);
                }
                _ => break,
            }
        }
        self.is_cancelled()
    }

    /// A token cancelled whenever `self` is; cancelling the child leaves the
    /// parent untouched.
    pub fn child(&self) -> CancelToken {
        let child = CancelToken::new();
        {
            let mut children = self.inner.lock.lock();
            if !self.is_cancelled() {
                // drop children nobody but this parent still holds
                children.retain(|c| !c.is_cancelled() && Arc::strong_count(&c.inner) > 1);
                children.push(child.clone());
                return child;
            }
        }
        child.cancel();
        child
    }

    #[cfg(test)]
    fn child_count(&self) -> usize {
        self.inner.lock.lock().len()
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
