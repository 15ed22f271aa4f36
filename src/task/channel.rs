//! Single-assignment result slot shared between a worker and its readers.

use crate::error::{Error, Result};
use crate::util::deadline_after;
use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Terminal outcome written into a [`ResultChannel`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Completed(T),
    Failed(Error),
    Cancelled,
}

impl<T> Outcome<T> {
    pub fn into_result(self) -> Result<T> {
        match self {
            Outcome::Completed(value) => Ok(value),
            Outcome::Failed(err) => Err(err),
            Outcome::Cancelled => Err(Error::Cancelled),
        }
    }
}

type Subscriber<T> = Box<dyn FnOnce(Outcome<T>) + Send + 'static>;

struct Slot<T> {
    outcome: Option<Outcome<T>>,
    subscribers: Vec<Subscriber<T>>,
    timed_out: bool,
}

/// Exactly one `write` succeeds; every later write is a no-op and every
/// reader sees the same outcome.
pub struct ResultChannel<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T: Clone + Send + 'static> ResultChannel<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                outcome: None,
                subscribers: Vec::new(),
                timed_out: false,
            }),
            ready: Condvar::new(),
        }
    }

    /// Attempt to settle the channel. Returns `false` when another writer got
    /// there first.
    pub fn write(&self, outcome: Outcome<T>) -> bool {
        let pending = {
            let mut slot = self.slot.lock();
            if slot.outcome.is_some() {
                return false;
            }

            let pending: Vec<_> = std::mem::take(&mut slot.subscribers)
                .into_iter()
                .map(|s| (s, outcome.clone()))
                .collect();

            slot.outcome = Some(outcome);
            self.ready.notify_all();
            pending
        };

        // subscribers run outside the lock so they may read the channel
        for (subscriber, outcome) in pending {
            subscriber(outcome);
        }
        true
    }

    pub fn is_settled(&self) -> bool {
        self.slot.lock().outcome.is_some()
    }

    pub fn try_read(&self) -> Option<Outcome<T>> {
        self.slot.lock().outcome.clone()
    }

    /// Block until settled or `deadline` passes.
    pub fn wait_until(&self, deadline: Instant) -> Option<Outcome<T>> {
        self.wait_deadline(Some(deadline))
    }

    /// A timeout too large to represent waits until settled.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Outcome<T>> {
        self.wait_deadline(deadline_after(timeout))
    }

    fn wait_deadline(&self, deadline: Option<Instant>) -> Option<Outcome<T>> {
        let mut slot = self.slot.lock();
        while slot.outcome.is_none() {
            match deadline {
                Some(deadline) => {
                    if self.ready.wait_until(&mut slot, deadline).timed_out() {
                        break;
                    }
                }
                None => self.ready.wait(&mut slot),
            }
        }
        slot.outcome.clone()
    }

    /// Record that a bounded waiter gave up. If the channel settled in the
    /// meantime, the outcome is returned instead and nothing is marked.
    pub fn mark_timed_out(&self) -> Option<Outcome<T>> {
        let mut slot = self.slot.lock();
        if slot.outcome.is_some() {
            return slot.outcome.clone();
        }
        slot.timed_out = true;
        slot.subscribers.clear();
        None
    }

    pub fn is_timed_out(&self) -> bool {
        self.slot.lock().timed_out
    }

    /// Run `f` once with the final outcome. Runs immediately on the calling
    /// thread if the channel is already settled, otherwise on the writer's
    /// thread. Never runs once a waiter has timed out on the channel.
    pub fn subscribe<F>(&self, f: F)
    where
        F: FnOnce(Outcome<T>) + Send + 'static,
    {
        let settled = {
            let mut slot = self.slot.lock();
            if slot.timed_out {
                return;
            }
            let settled = slot.outcome.clone();
            if settled.is_none() {
                slot.subscribers.push(Box::new(f));
                return;
            }
            settled
        };

        if let Some(outcome) = settled {
            f(outcome);
        }
    }
}

impl<T: Clone + Send + 'static> Default for ResultChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for ResultChannel<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let slot = self.slot.lock();
        f.debug_struct("ResultChannel")
            .field("settled", &slot.outcome.is_some())
            .field("subscribers", &slot.subscribers.len())
            .field("timed_out", &slot.timed_out)
            .finish()
    }
}
