//! Delivery of task outcomes onto the interactive thread.
//!
//! [`channel`] creates a connected [`Dispatcher`] / [`EventLoop`] pair. The
//! dispatcher is cheap to clone and is handed to workers; the event loop stays
//! on the interactive thread, which drains it with [`EventLoop::run_pending`]
//! or [`EventLoop::run_for`]. Every posted event runs exactly once, on the
//! thread that drives the loop, in posting order.

use crate::util::{deadline_after, remaining};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

type Event = Box<dyn FnOnce() + Send + 'static>;

#[derive(Debug, Default)]
struct Counters {
    posted: AtomicU64,
    delivered: AtomicU64,
}

/// Posting side. Clone freely.
#[derive(Clone)]
pub struct Dispatcher {
    tx: Sender<Event>,
    counters: Arc<Counters>,
}

/// Receiving side, owned by the interactive thread.
pub struct EventLoop {
    rx: Receiver<Event>,
    counters: Arc<Counters>,
}

pub fn channel() -> (Dispatcher, EventLoop) {
    let (tx, rx) = unbounded();
    let counters = Arc::new(Counters::default());
    (
        Dispatcher {
            tx,
            counters: counters.clone(),
        },
        EventLoop { rx, counters },
    )
}

impl Dispatcher {
    /// Queue `f` to run on the interactive thread. Returns `false` if the
    /// event loop is gone, in which case `f` is dropped without running.
    pub fn post<F>(&self, f: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match self.tx.send(Box::new(f)) {
            Ok(()) => {
                self.counters.posted.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                tracing::warn!("event loop closed, dropping event");
                false
            }
        }
    }

    pub fn posted(&self) -> u64 {
        self.counters.posted.load(Ordering::Relaxed)
    }
}

impl EventLoop {
    /// Run every event already queued. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            match self.rx.try_recv() {
                Ok(event) => {
                    self.deliver(event);
                    ran += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        ran
    }

    /// Wait up to `timeout` for one event and run it.
    pub fn run_one(&self, timeout: Duration) -> bool {
        match self.next_event(timeout) {
            Ok(event) => {
                self.deliver(event);
                true
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => false,
        }
    }

    /// Keep running events as they arrive until `duration` has elapsed, or
    /// every dispatcher is gone.
    pub fn run_for(&self, duration: Duration) -> usize {
        let deadline = deadline_after(duration);
        let mut ran = 0;
        while let Some(left) = remaining(deadline) {
            match self.next_event(left) {
                Ok(event) => {
                    self.deliver(event);
                    ran += 1;
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        ran
    }

    /// Run events until `done` returns true or `timeout` elapses. Returns
    /// the final value of `done`.
    pub fn run_until<P>(&self, timeout: Duration, mut done: P) -> bool
    where
        P: FnMut() -> bool,
    {
        let deadline = deadline_after(timeout);
        loop {
            if done() {
                return true;
            }
            let Some(left) = remaining(deadline) else {
                return done();
            };
            match self.next_event(left) {
                Ok(event) => self.deliver(event),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return done(),
            }
        }
    }

    pub fn delivered(&self) -> u64 {
        self.counters.delivered.load(Ordering::Relaxed)
    }

    fn next_event(&self, timeout: Duration) -> Result<Event, RecvTimeoutError> {
        match deadline_after(timeout) {
            Some(deadline) => self.rx.recv_deadline(deadline),
            None => self.rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        }
    }

    fn deliver(&self, event: Event) {
        event();
        self.counters.delivered.fetch_add(1, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("posted", &self.posted())
            .finish()
    }
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("queued", &self.rx.len())
            .field("delivered", &self.delivered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::thread;

    #[test]
    fn test_events_run_on_loop_thread_in_order() {
        let (dispatcher, events) = channel();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let poster = {
            let seen = seen.clone();
            thread::spawn(move || {
                for i in 0..5 {
                    let seen = seen.clone();
                    dispatcher.post(move || seen.lock().push((i, thread::current().id())));
                }
            })
        };
        poster.join().unwrap();

        assert_eq!(events.run_pending(), 5);
        let me = thread::current().id();
        let seen = seen.lock();
        assert_eq!(seen.iter().map(|(i, _)| *i).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
        assert!(seen.iter().all(|(_, t)| *t == me));
    }

    #[test]
    fn test_run_until() {
        let (dispatcher, events) = channel();
        let flag = Arc::new(Mutex::new(false));

        let f = flag.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            dispatcher.post(move || *f.lock() = true);
        });

        assert!(events.run_until(Duration::from_secs(5), || *flag.lock()));
        assert_eq!(events.delivered(), 1);
    }

    #[test]
    fn test_unbounded_waits() {
        let (dispatcher, events) = channel();
        let flag = Arc::new(Mutex::new(false));

        let f = flag.clone();
        let poster = dispatcher.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            poster.post(move || *f.lock() = true);
        });

        assert!(events.run_one(Duration::MAX));
        assert!(*flag.lock());
        assert!(events.run_until(Duration::MAX, || *flag.lock()));

        dispatcher.post(|| {});
        drop(dispatcher);
        // returns once the last dispatcher is gone and the queue is drained
        assert_eq!(events.run_for(Duration::MAX), 1);
    }

    #[test]
    fn test_post_after_loop_dropped() {
        let (dispatcher, events) = channel();
        drop(events);
        assert!(!dispatcher.post(|| {}));
        assert_eq!(dispatcher.posted(), 0);
    }
}
