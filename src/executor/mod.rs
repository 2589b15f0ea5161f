//! Task execution infrastructure.
//!
//! This module provides the primitives a batch is built from: the task
//! abstraction, cooperative cancellation, worker threads and the per-batch
//! worker pool, plus the dispatch wrapper and first-failure capture that
//! give a batch its fail-fast behavior.

pub(crate) mod batch;
pub mod cancel;
pub(crate) mod failure;
pub mod pool;
pub mod task;
pub mod worker;

pub use cancel::CancelToken;
pub use pool::WorkerPool;
pub use task::{from_fn, FnTask, Task, TaskError};
