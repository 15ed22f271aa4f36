//! Background execution infrastructure.
//!
//! This module provides the worker threads, the job queue and the
//! [`ExecutionPool`] that runs submitted work off the interactive thread.

pub mod job;
pub mod panic_handler;
pub mod pool;
pub mod worker;

pub use job::TaskId;
pub use panic_handler::{PanicHandler, PanicInfo};
pub use pool::ExecutionPool;
