use crate::executor::TaskError;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    /// The first task failure of an execution, surfaced verbatim.
    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("execution timed out after {0:?}")]
    Timeout(Duration),

    #[error("execution interrupted")]
    Interrupted,

    #[error("worker pool is shut down")]
    PoolShutdown,

    #[error("executor error: {0}")]
    Executor(String),
}

impl Error {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn executor<S: Into<String>>(msg: S) -> Self {
        Error::Executor(msg.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout(_))
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Interrupted)
    }

    /// The captured task failure, if this error is one.
    pub fn task_error(&self) -> Option<&TaskError> {
        match self {
            Error::Task(err) => Some(err),
            _ => None,
        }
    }
}
