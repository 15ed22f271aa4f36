//! deckhand - cancellable background tasks for interactive applications
//!
//! An interactive thread hands work to an [`ExecutionPool`] and either
//! registers a callback that runs back on the interactive thread, or waits
//! for the result with a deadline and cancels the work if it runs late.
//!
//! # Quick Start
//!
//! ```no_run
//! use deckhand::prelude::*;
//! use std::time::Duration;
//!
//! let (ctx, events) = TaskContext::new(Config::default()).unwrap();
//!
//! // bounded synchronous read with a fallback
//! let handle = ctx.submit(|interrupt| {
//!     interrupt.sleep(Duration::from_millis(10))?;
//!     Ok("value".to_string())
//! });
//! let value = handle.wait(Duration::from_millis(500)).unwrap_or_else(|_| {
//!     handle.cancel();
//!     String::new()
//! });
//!
//! // fire-and-forget, delivered when the interactive thread drains its loop
//! ctx.spawn(|_| Ok(42), |n| println!("got {}", n), |err| eprintln!("{}", err));
//! events.run_for(Duration::from_millis(50));
//! # let _ = value;
//! ```
//!
//! # Outline
//!
//! - **Single-assignment results**: the worker and `cancel()` race to settle
//!   a task's [`ResultChannel`](task::ResultChannel); the first writer wins
//! - **Bounded waits**: `TaskHandle::wait` blocks on a condition variable
//!   until settlement or the deadline
//! - **Interactive-thread delivery**: completion callbacks go through a
//!   [`Dispatcher`](dispatcher::Dispatcher), exactly once, never after a
//!   cancellation
//! - **Explicit context**: one [`TaskContext`] per application, passed to
//!   whatever needs to submit work

// Lint configuration
#![warn(missing_debug_implementations)]

pub mod api_key;
pub mod bookmarks;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod merge;
pub mod prefs;
pub mod prelude;
pub mod present;
pub mod task;
pub mod util;

// Re-export key types at crate root
pub use config::{Config, ConfigBuilder};
pub use context::TaskContext;
pub use error::{Error, Result, StorageError};
pub use executor::ExecutionPool;
pub use task::{TaskHandle, TaskState};
