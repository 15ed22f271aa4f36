//! Idle backoff for worker threads with an empty queue.

use std::hint::spin_loop;
use std::thread;
use std::time::Duration;

/// Spin, then yield, then park. Each worker owns one; a submit unparks a
/// worker so the park phase does not add latency to new work.
#[derive(Debug)]
pub struct Backoff {
    step: u32,
    park: Duration,
}

impl Backoff {
    const SPIN_LIMIT: u32 = 6;
    const YIELD_LIMIT: u32 = 10;

    pub fn new(park: Duration) -> Self {
        Self { step: 0, park }
    }

    pub fn reset(&mut self) {
        self.step = 0;
    }

    /// Perform one step of backoff
    pub fn idle(&mut self) {
        if self.step <= Self::SPIN_LIMIT {
            for _ in 0..(1u32 << self.step) {
                spin_loop();
            }
        } else if self.step <= Self::YIELD_LIMIT {
            thread::yield_now();
        } else {
            thread::park_timeout(self.park);
        }
        self.step = self.step.saturating_add(1);
    }

    #[cfg(test)]
    fn is_parking(&self) -> bool {
        self.step > Self::YIELD_LIMIT
    }
}
