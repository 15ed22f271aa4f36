//! Task lifecycle: the handle a caller holds for one submitted unit of work.

use super::channel::{Outcome, ResultChannel};
use super::interrupt::Interrupt;
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::executor::TaskId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Observable lifecycle state of a task.
///
/// `Completed`, `Failed` and `Cancelled` are settled: they come from the
/// result channel and never change. `TimedOut` is what a bounded waiter saw;
/// it stays visible until the handle settles (normally via `cancel`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Created,
    Running,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

impl TaskState {
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }
}

pub(crate) struct TaskCore<T> {
    pub(crate) id: TaskId,
    pub(crate) channel: ResultChannel<T>,
    pub(crate) interrupt: Interrupt,
    running: AtomicBool,
}

impl<T: Clone + Send + 'static> TaskCore<T> {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            id: TaskId::next(),
            channel: ResultChannel::new(),
            interrupt: Interrupt::new(),
            running: AtomicBool::new(false),
        })
    }

    /// Called by a worker before running the body. Returns `false` when the
    /// task was settled (cancelled or rejected) before it was picked up.
    pub(crate) fn begin(&self) -> bool {
        if self.channel.is_settled() {
            tracing::trace!(task = %self.id, "skipping settled task");
            return false;
        }
        self.running.store(true, Ordering::Release);
        tracing::trace!(task = %self.id, "running");
        true
    }

    pub(crate) fn finish(&self, result: Result<T>) {
        let outcome = match result {
            Ok(value) => Outcome::Completed(value),
            Err(err) => Outcome::Failed(err),
        };

        if self.channel.write(outcome) {
            tracing::debug!(task = %self.id, "settled by worker");
        } else {
            tracing::trace!(task = %self.id, "late result discarded");
        }
    }
}

/// Handle to a submitted task. Owned by the caller that submitted it.
pub struct TaskHandle<T> {
    core: Arc<TaskCore<T>>,
}

impl<T: Clone + Send + 'static> TaskHandle<T> {
    pub(crate) fn new(core: Arc<TaskCore<T>>) -> Self {
        Self { core }
    }

    pub fn id(&self) -> TaskId {
        self.core.id
    }

    pub fn state(&self) -> TaskState {
        match self.core.channel.try_read() {
            Some(Outcome::Completed(_)) => TaskState::Completed,
            Some(Outcome::Failed(_)) => TaskState::Failed,
            Some(Outcome::Cancelled) => TaskState::Cancelled,
            None if self.core.channel.is_timed_out() => TaskState::TimedOut,
            None if self.core.running.load(Ordering::Acquire) => TaskState::Running,
            None => TaskState::Created,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.core.channel.is_settled()
    }

    /// Block the calling thread until the task settles or `timeout` elapses.
    ///
    /// Returns the value on completion, the work's error on failure,
    /// `Error::Cancelled` if a cancellation settled the task, and
    /// `Error::TimedOut` if the deadline passed first. A timeout does not
    /// settle the task; call [`cancel`](Self::cancel) to do that.
    pub fn wait(&self, timeout: Duration) -> Result<T> {
        if let Some(outcome) = self.core.channel.wait_timeout(timeout) {
            return outcome.into_result();
        }

        // completion may have raced in between the wait and the mark
        match self.core.channel.mark_timed_out() {
            Some(outcome) => outcome.into_result(),
            None => {
                tracing::debug!(task = %self.core.id, ?timeout, "wait timed out");
                Err(Error::TimedOut(timeout))
            }
        }
    }

    /// Non-blocking read of the settled outcome.
    pub fn try_result(&self) -> Option<Result<T>> {
        self.core.channel.try_read().map(Outcome::into_result)
    }

    /// Settle the task as cancelled unless it already settled. Idempotent.
    /// A running body is interrupted when the cancellation wins.
    pub fn cancel(&self) {
        if self.core.channel.write(Outcome::Cancelled) {
            self.core.interrupt.interrupt();
            tracing::debug!(task = %self.core.id, "cancelled");
        }
    }

    /// Deliver the outcome on the dispatcher's event loop exactly once,
    /// only if the task completes or fails. Nothing is delivered for a
    /// cancelled task, or for one a waiter timed out on.
    pub fn on_complete<S, F>(&self, dispatcher: &Dispatcher, on_success: S, on_failure: F)
    where
        S: FnOnce(T) + Send + 'static,
        F: FnOnce(Error) + Send + 'static,
    {
        let dispatcher = dispatcher.clone();
        let id = self.core.id;
        self.core.channel.subscribe(move |outcome| match outcome {
            Outcome::Completed(value) => {
                dispatcher.post(move || on_success(value));
            }
            Outcome::Failed(err) => {
                dispatcher.post(move || on_failure(err));
            }
            Outcome::Cancelled => {
                tracing::trace!(task = %id, "cancelled, no delivery");
            }
        });
    }
}

impl<T> std::fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskHandle")
            .field("id", &self.core.id)
            .field("channel", &self.core.channel)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn detached<T: Clone + Send + 'static>() -> (TaskHandle<T>, Arc<TaskCore<T>>) {
        let core = TaskCore::new();
        (TaskHandle::new(core.clone()), core)
    }

    #[test]
    fn test_state_progression() {
        let (handle, core) = detached::<u32>();
        assert_eq!(handle.state(), TaskState::Created);

        assert!(core.begin());
        assert_eq!(handle.state(), TaskState::Running);

        core.finish(Ok(5));
        assert_eq!(handle.state(), TaskState::Completed);
        assert_eq!(handle.wait(Duration::from_millis(10)), Ok(5));
    }

    #[test]
    fn test_cancel_before_start_skips_body() {
        let (handle, core) = detached::<u32>();
        handle.cancel();
        assert!(!core.begin());
        assert_eq!(handle.state(), TaskState::Cancelled);
        assert!(core.interrupt.is_interrupted());
    }

    #[test]
    fn test_cancel_after_completion_is_noop() {
        let (handle, core) = detached::<&'static str>();
        core.begin();
        core.finish(Ok("Y"));

        handle.cancel();
        handle.cancel();
        assert_eq!(handle.state(), TaskState::Completed);
        assert!(!core.interrupt.is_interrupted());
        assert_eq!(handle.try_result(), Some(Ok("Y")));
    }

    #[test]
    fn test_timeout_then_cancel() {
        let (handle, core) = detached::<u32>();
        core.begin();

        let res = handle.wait(Duration::from_millis(20));
        assert_eq!(res, Err(Error::TimedOut(Duration::from_millis(20))));
        assert_eq!(handle.state(), TaskState::TimedOut);

        handle.cancel();
        assert_eq!(handle.state(), TaskState::Cancelled);

        // the worker's late write has no effect
        core.finish(Ok(1));
        assert_eq!(handle.state(), TaskState::Cancelled);
        assert_eq!(handle.wait(Duration::from_millis(1)), Err(Error::Cancelled));
    }

    #[test]
    fn test_wait_with_huge_timeout() {
        let (handle, core) = detached::<u32>();
        core.begin();
        core.finish(Ok(3));
        assert_eq!(handle.wait(Duration::MAX), Ok(3));

        let (handle, core) = detached::<u32>();
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            core.begin();
            core.finish(Ok(4));
        });
        assert_eq!(handle.wait(Duration::MAX), Ok(4));
        t.join().unwrap();
    }

    #[test]
    fn test_wait_twice_same_outcome() {
        let (handle, core) = detached::<u32>();
        core.begin();
        core.finish(Err(Error::task_failed("boom")));

        let first = handle.wait(Duration::from_millis(10));
        let second = handle.wait(Duration::from_millis(10));
        assert_eq!(first, second);
        assert_eq!(handle.state(), TaskState::Failed);
    }

    #[test]
    fn test_concurrent_cancel_single_outcome() {
        let (handle, core) = detached::<u32>();
        core.begin();

        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| handle.cancel());
            }
            s.spawn(|| core.finish(Ok(9)));
        });

        let state = handle.state();
        assert!(state == TaskState::Cancelled || state == TaskState::Completed);
        let first = handle.wait(Duration::from_millis(1));
        for _ in 0..4 {
            assert_eq!(handle.wait(Duration::from_millis(1)), first);
        }
    }
}
