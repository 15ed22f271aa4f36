//! The application-owned task context.
//!
//! One [`TaskContext`] per process, created by the top-level application and
//! passed (by reference or `Arc`) to every component that submits work. It
//! owns the [`ExecutionPool`] and the posting side of the interactive
//! thread's event loop.

use crate::config::Config;
use crate::dispatcher::{self, Dispatcher, EventLoop};
use crate::error::{Error, Result};
use crate::executor::ExecutionPool;
use crate::task::{Interrupt, TaskHandle};
use std::time::Duration;

#[derive(Debug)]
pub struct TaskContext {
    pool: ExecutionPool,
    dispatcher: Dispatcher,
    config: Config,
}

impl TaskContext {
    /// Start the pool. The returned [`EventLoop`] belongs to the interactive
    /// thread; completion callbacks run wherever it is driven.
    pub fn new(config: Config) -> Result<(Self, EventLoop)> {
        let pool = ExecutionPool::new(&config)?;
        let (dispatcher, events) = dispatcher::channel();

        Ok((
            Self {
                pool,
                dispatcher,
                config,
            },
            events,
        ))
    }

    pub fn with_defaults() -> Result<(Self, EventLoop)> {
        Self::new(Config::default())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn pool(&self) -> &ExecutionPool {
        &self.pool
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Queue `work` on the pool. Never blocks.
    pub fn submit<T, F>(&self, work: F) -> TaskHandle<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce(&Interrupt) -> Result<T> + Send + 'static,
    {
        self.pool.submit(work)
    }

    /// Have `on_success` or `on_failure` run on the interactive thread once
    /// `handle` completes or fails. Nothing runs if it is cancelled.
    pub fn register_completion_callback<T, S, F>(&self, handle: &TaskHandle<T>, on_success: S, on_failure: F)
    where
        T: Clone + Send + 'static,
        S: FnOnce(T) + Send + 'static,
        F: FnOnce(Error) + Send + 'static,
    {
        handle.on_complete(&self.dispatcher, on_success, on_failure);
    }

    /// Fire-and-forget: submit and register callbacks in one step.
    pub fn spawn<T, W, S, F>(&self, work: W, on_success: S, on_failure: F) -> TaskHandle<T>
    where
        T: Clone + Send + 'static,
        W: FnOnce(&Interrupt) -> Result<T> + Send + 'static,
        S: FnOnce(T) + Send + 'static,
        F: FnOnce(Error) + Send + 'static,
    {
        let handle = self.submit(work);
        self.register_completion_callback(&handle, on_success, on_failure);
        handle
    }

    /// Bounded synchronous read with the configured deadline.
    pub fn read_bounded<T, F>(&self, work: F) -> Option<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce(&Interrupt) -> Result<T> + Send + 'static,
    {
        self.read_bounded_within(self.config.bounded_read_timeout, work)
    }

    /// Submit `work` and wait at most `timeout`. On timeout or failure the
    /// task is cancelled and `None` is returned; the caller supplies the
    /// fallback.
    pub fn read_bounded_within<T, F>(&self, timeout: Duration, work: F) -> Option<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce(&Interrupt) -> Result<T> + Send + 'static,
    {
        let handle = self.submit(work);
        match handle.wait(timeout) {
            Ok(value) => Some(value),
            Err(err) => {
                handle.cancel();
                if err.is_recoverable() {
                    tracing::debug!(task = %handle.id(), %err, "bounded read fell back");
                } else {
                    tracing::warn!(task = %handle.id(), %err, "bounded read failed");
                }
                None
            }
        }
    }

    /// Drain accepted work and stop the workers.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }
}
