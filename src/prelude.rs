pub use crate::config::{Config, ConfigBuilder};
pub use crate::context::TaskContext;
pub use crate::dispatcher::{Dispatcher, EventLoop};
pub use crate::error::{Error, Result, StorageError};
pub use crate::executor::{ExecutionPool, TaskId};
pub use crate::task::{Interrupt, Outcome, TaskHandle, TaskState};
