pub use crate::config::{Config, ConfigBuilder};
pub use crate::error::{Error, Result};
pub use crate::executor::{from_fn, CancelToken, Task, TaskError};
pub use crate::runner::{Executor, Interrupter};
