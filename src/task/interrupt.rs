//! Cooperative interruption signal handed to every work body.

use crate::error::{Error, Result};
use crate::util::deadline_after;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct Inner {
    flag: AtomicBool,
    lock: Mutex<()>,
    wake: Condvar,
}

/// Work bodies call [`Interrupt::check`] or [`Interrupt::sleep`] at their
/// blocking points so that a cancellation takes effect promptly.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    inner: Arc<Inner>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt(&self) {
        // take the lock so a sleeper between its flag check and its wait
        // cannot miss the wakeup
        let _guard = self.inner.lock.lock();
        self.inner.flag.store(true, Ordering::Release);
        self.inner.wake.notify_all();
    }

    pub fn is_interrupted(&self) -> bool {
        self.inner.flag.load(Ordering::Acquire)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_interrupted() {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Sleep for `duration`, returning `Err(Interrupted)` as soon as the
    /// interrupt is raised. A duration too large to represent sleeps until
    /// interrupted.
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        let deadline = deadline_after(duration);
        let mut guard = self.inner.lock.lock();
        loop {
            if self.is_interrupted() {
                return Err(Error::Interrupted);
            }
            match deadline {
                Some(deadline) => {
                    if self.inner.wake.wait_until(&mut guard, deadline).timed_out() {
                        return self.check();
                    }
                }
                None => self.inner.wake.wait(&mut guard),
            }
        }
    }
}
