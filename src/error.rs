use std::fmt;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

/// Failure of an underlying preference or list store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{op} failed for {key:?}: {message}")]
pub struct StorageError {
    pub op: StorageOp,
    pub key: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageOp {
    Read,
    Write,
    Delete,
}

impl fmt::Display for StorageOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageOp::Read => f.write_str("read"),
            StorageOp::Write => f.write_str("write"),
            StorageOp::Delete => f.write_str("delete"),
        }
    }
}

impl StorageError {
    pub fn new<K: Into<String>, M: Into<String>>(op: StorageOp, key: K, message: M) -> Self {
        Self {
            op,
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn read<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Self::new(StorageOp::Read, key, message)
    }

    pub fn write<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Self::new(StorageOp::Write, key, message)
    }

    pub fn delete<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Self::new(StorageOp::Delete, key, message)
    }
}

// Clone is required: every reader of a settled task gets its own copy of the
// failure payload.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("task cancelled")]
    Cancelled,

    #[error("interrupted")]
    Interrupted,

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("worker panic: {0}")]
    WorkerPanic(String),

    #[error("task failed: {0}")]
    TaskFailed(String),

    #[error("config error: {0}")]
    Config(String),

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

    pub fn rejected<S: Into<String>>(msg: S) -> Self {
        Error::Rejected(msg.into())
    }

    pub fn task_failed<S: Into<String>>(msg: S) -> Self {
        Error::TaskFailed(msg.into())
    }

    /// Timeouts and cancellations are expected outcomes of a bounded wait;
    /// callers substitute a fallback instead of surfacing them.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::TimedOut(_) | Error::Cancelled | Error::Interrupted)
    }
}
