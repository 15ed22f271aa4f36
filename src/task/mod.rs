//! Cancellable tasks with bounded waits.
//!
//! A [`TaskHandle`] wraps one submitted unit of work. Its outcome lives in a
//! [`ResultChannel`], a single-assignment slot: the worker and `cancel()` race
//! to write it and the first writer wins. Waiters block on a condition
//! variable with a deadline; completion callbacks are posted through a
//! [`Dispatcher`](crate::dispatcher::Dispatcher).

pub mod channel;
pub mod handle;
pub mod interrupt;

pub use channel::{Outcome, ResultChannel};
pub use handle::{TaskHandle, TaskState};
pub use interrupt::Interrupt;

pub(crate) use handle::TaskCore;
