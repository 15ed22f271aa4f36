//! Deadlines that tolerate arbitrarily large timeouts.

use std::time::{Duration, Instant};

/// `now + timeout`, or `None` when that is past what `Instant` can hold.
/// `None` means wait without a deadline.
pub fn deadline_after(timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(timeout)
}

/// Time left until `deadline`, `None` once it has passed. An unbounded
/// deadline always has `Duration::MAX` left.
pub fn remaining(deadline: Option<Instant>) -> Option<Duration> {
    match deadline {
        None => Some(Duration::MAX),
        Some(deadline) => deadline
            .checked_duration_since(Instant::now())
            .filter(|left| !left.is_zero()),
    }
}
