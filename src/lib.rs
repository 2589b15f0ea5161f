//! batchrun - fail-fast parallel batch execution
//!
//! Runs a collection of independent tasks across a bounded pool of worker
//! threads under one shared timeout. The first task failure cancels the rest
//! of the batch and is the only error reported.
//!
//! # Quick Start
//!
//! ```no_run
//! use batchrun::prelude::*;
//! use std::time::Duration;
//!
//! let mut executor = Executor::with_timeout(4, Duration::from_secs(30)).unwrap();
//!
//! for shard in 0..8 {
//!     executor.push(from_fn(move |cancel| {
//!         // stop early if a sibling failed
//!         if cancel.wait_timeout(Duration::from_millis(100)) {
//!             return Ok(());
//!         }
//!         if shard == 5 {
//!             return Err(TaskError::new(format!("shard {} is corrupt", shard)));
//!         }
//!         Ok(())
//!     }));
//! }
//!
//! match executor.execute() {
//!     Ok(()) => println!("all shards processed"),
//!     Err(e) => eprintln!("batch failed: {}", e),
//! }
//! ```
//!
//! # Semantics
//!
//! - **Fresh pool per call**: every `execute` builds its own pool and always
//!   shuts it down before returning.
//! - **First failure wins**: the first recorded failure cancels the batch;
//!   later failures are dropped.
//! - **Cooperative cancellation**: tasks receive a [`CancelToken`] and are
//!   expected to return once it is cancelled.
//! - **Bounded wait**: the caller waits at most the configured timeout, and can
//!   be woken early through an [`Interrupter`].

#![warn(missing_debug_implementations)]

pub mod config;
pub mod error;
pub mod executor;
pub mod prelude;
pub mod runner;

// Re-export key types at crate root
pub use config::{Config, ConfigBuilder, DEFAULT_TIMEOUT, MAX_THREADS};
pub use error::{Error, Result};
pub use executor::{task, CancelToken, Task, TaskError, WorkerPool};
pub use runner::{Executor, Interrupter};
