use super::job::Job;
use super::panic_handler::PanicHandler;
use super::worker::{Worker, WorkerId, WorkerState};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::task::{Interrupt, Outcome, TaskCore, TaskHandle};
use crossbeam_deque::{Injector, Stealer};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// State shared between the pool and its workers.
#[derive(Debug)]
pub(crate) struct PoolShared {
    // cleared under the write lock so no push can land after shutdown starts
    accepting: RwLock<bool>,
    shutdown: AtomicBool,
    pub(crate) pending: AtomicUsize,
    pub(crate) idle_park: Duration,
    panics: PanicHandler,
}

impl PoolShared {
    pub(crate) fn new(idle_park: Duration) -> Self {
        Self {
            accepting: RwLock::new(true),
            shutdown: AtomicBool::new(false),
            pending: AtomicUsize::new(0),
            idle_park,
            panics: PanicHandler::new(),
        }
    }

    /// Stop intake, then raise the shutdown flag. Every accepted push
    /// happens before the flag is set. Returns `false` if already closed.
    pub(crate) fn close(&self) -> bool {
        {
            let mut accepting = self.accepting.write();
            if !*accepting {
                return false;
            }
            *accepting = false;
        }
        self.shutdown.store(true, Ordering::Release);
        true
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

/// Fixed-size set of worker threads that run submitted work off the
/// interactive thread.
///
/// Accepted work always runs, including work still queued when
/// [`shutdown`](Self::shutdown) is called. Work submitted after shutdown, or
/// beyond the queue capacity, is rejected: its handle settles immediately as
/// failed with [`Error::Rejected`].
pub struct ExecutionPool {
    workers: Mutex<Vec<WorkerHandle>>,
    unparkers: Vec<thread::Thread>,
    worker_states: Vec<Arc<WorkerState>>,
    injector: Arc<Injector<Job>>,
    shared: Arc<PoolShared>,
    num_threads: usize,
    capacity: usize,
    next_wake: AtomicUsize,
}

struct WorkerHandle {
    id: WorkerId,
    thread: Option<JoinHandle<()>>,
}

impl ExecutionPool {
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let num_threads = config.worker_threads();

        let injector = Arc::new(Injector::new());
        let shared = Arc::new(PoolShared::new(config.idle_park));

        let workers: Vec<Worker> = (0..num_threads).map(Worker::new).collect();
        let stealers: Vec<Stealer<Job>> = workers.iter().map(|w| w.local_queue.stealer()).collect();
        let worker_states: Vec<Arc<WorkerState>> = workers.iter().map(|w| w.state.clone()).collect();

        let mut handles: Vec<WorkerHandle> = Vec::with_capacity(num_threads);
        let mut unparkers: Vec<thread::Thread> = Vec::with_capacity(num_threads);

        for worker in workers {
            let id = worker.id;
            let stealers_clone = stealers.clone();
            let injector_clone = injector.clone();
            let shared_clone = shared.clone();
            let name = format!("{}-{}", config.thread_name_prefix, id);

            let mut builder = thread::Builder::new().name(name);
            if let Some(stack_size) = config.stack_size {
                builder = builder.stack_size(stack_size);
            }

            let spawned = builder.spawn(move || {
                worker.run(stealers_clone, injector_clone, shared_clone);
            });

            let thread = match spawned {
                Ok(thread) => thread,
                Err(e) => {
                    // stop the workers already started before bailing out
                    shared.close();
                    for t in &unparkers {
                        t.unpark();
                    }
                    return Err(Error::executor(format!("spawn failed: {}", e)));
                }
            };

            unparkers.push(thread.thread().clone());
            handles.push(WorkerHandle {
                id,
                thread: Some(thread),
            });
        }

        tracing::debug!(threads = num_threads, "execution pool started");

        Ok(Self {
            workers: Mutex::new(handles),
            unparkers,
            worker_states,
            injector,
            shared,
            num_threads,
            capacity: config.queue_capacity,
            next_wake: AtomicUsize::new(0),
        })
    }

    /// Queue `work` and return its handle immediately. Never blocks.
    pub fn submit<T, F>(&self, work: F) -> TaskHandle<T>
    where
        T: Clone + Send + 'static,
        F: FnOnce(&Interrupt) -> Result<T> + Send + 'static,
    {
        let core = TaskCore::new();
        let job_core = core.clone();
        let shared = self.shared.clone();

        let job = Job::new(core.id, move || {
            if !job_core.begin() {
                return;
            }
            let interrupt = job_core.interrupt.clone();
            let result = shared
                .panics
                .execute(|| work(&interrupt))
                .unwrap_or_else(|info| Err(info.into()));
            job_core.finish(result);
        });

        match self.enqueue(job) {
            Ok(()) => tracing::trace!(task = %core.id, "submitted"),
            Err(err) => {
                tracing::warn!(task = %core.id, %err, "submission rejected");
                core.channel.write(Outcome::Failed(err));
            }
        }

        TaskHandle::new(core)
    }

    fn enqueue(&self, job: Job) -> Result<()> {
        let accepting = self.shared.accepting.read();
        if !*accepting {
            return Err(Error::rejected("execution pool is shut down"));
        }

        let pending = self.shared.pending.fetch_add(1, Ordering::AcqRel);
        if pending >= self.capacity {
            self.shared.pending.fetch_sub(1, Ordering::AcqRel);
            return Err(Error::rejected(format!("queue full ({} pending)", pending)));
        }

        self.injector.push(job);
        drop(accepting);

        self.wake_one();
        Ok(())
    }

    fn wake_one(&self) {
        let idx = self.next_wake.fetch_add(1, Ordering::Relaxed) % self.unparkers.len();
        self.unparkers[idx].unpark();
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    /// Jobs accepted but not yet finished
    pub fn pending_tasks(&self) -> usize {
        self.shared.pending.load(Ordering::Acquire)
    }

    pub fn jobs_executed(&self) -> u64 {
        self.worker_states
            .iter()
            .map(|s| s.jobs_executed.load(Ordering::Relaxed))
            .sum()
    }

    /// Jobs taken from another worker's queue
    pub fn jobs_stolen(&self) -> u64 {
        self.worker_states
            .iter()
            .map(|s| s.jobs_stolen.load(Ordering::Relaxed))
            .sum()
    }

    pub fn panic_count(&self) -> usize {
        self.shared.panics.panic_count()
    }

    pub fn is_shutdown(&self) -> bool {
        !*self.shared.accepting.read()
    }

    /// Stop accepting work, let the workers drain what was accepted, then
    /// join them. Idempotent.
    pub fn shutdown(&self) {
        if !self.shared.close() {
            return;
        }
        tracing::debug!(pending = self.pending_tasks(), "execution pool shutting down");

        for t in &self.unparkers {
            t.unpark();
        }

        let current = thread::current().id();
        let mut workers = self.workers.lock();
        for worker in workers.iter_mut() {
            let Some(thread) = worker.thread.take() else {
                continue;
            };
            // a work body dropping the last owner must not join itself
            if thread.thread().id() == current {
                continue;
            }
            if thread.join().is_err() {
                tracing::error!(worker = worker.id, "worker thread panicked");
            }
        }
    }
}

impl Drop for ExecutionPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ExecutionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionPool")
            .field("num_threads", &self.num_threads)
            .field("capacity", &self.capacity)
            .field("pending", &self.pending_tasks())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskState;
    use std::time::Instant;

    fn pool(threads: usize) -> ExecutionPool {
        let config = Config::builder().num_threads(threads).build().unwrap();
        ExecutionPool::new(&config).unwrap()
    }

    #[test]
    fn test_submit_and_wait() {
        let pool = pool(2);
        let handle = pool.submit(|_| Ok(21 * 2));
        assert_eq!(handle.wait(Duration::from_secs(5)), Ok(42));
        assert_eq!(handle.state(), TaskState::Completed);
    }

    #[test]
    fn test_submit_does_not_block() {
        let pool = pool(1);
        let start = Instant::now();
        let handle = pool.submit(|i| {
            i.sleep(Duration::from_millis(300))?;
            Ok(())
        });
        assert!(start.elapsed() < Duration::from_millis(200));
        handle.cancel();
    }

    #[test]
    fn test_panic_becomes_failure() {
        let pool = pool(1);
        let handle: TaskHandle<u32> = pool.submit(|_| panic!("kaboom"));
        assert_eq!(
            handle.wait(Duration::from_secs(5)),
            Err(Error::WorkerPanic("kaboom".to_string()))
        );
        assert_eq!(pool.panic_count(), 1);

        // the worker survives
        let handle = pool.submit(|_| Ok(1));
        assert_eq!(handle.wait(Duration::from_secs(5)), Ok(1));
    }

    #[test]
    fn test_rejected_after_shutdown() {
        let pool = pool(2);
        pool.shutdown();
        assert!(pool.is_shutdown());

        let handle = pool.submit(|_| Ok(1));
        assert_eq!(handle.state(), TaskState::Failed);
        assert!(matches!(
            handle.wait(Duration::from_millis(1)),
            Err(Error::Rejected(_))
        ));
    }

    #[test]
    fn test_shutdown_drains_accepted_work() {
        let pool = pool(1);
        let handles: Vec<_> = (0..20)
            .map(|i| {
                pool.submit(move |_| {
                    std::thread::sleep(Duration::from_millis(1));
                    Ok(i)
                })
            })
            .collect();

        pool.shutdown();

        for (i, handle) in handles.iter().enumerate() {
            assert_eq!(handle.try_result(), Some(Ok(i)));
        }
        assert_eq!(pool.pending_tasks(), 0);
        assert_eq!(pool.jobs_executed(), 20);
    }

    #[test]
    fn test_shutdown_right_after_submit_settles_every_task() {
        for _ in 0..200 {
            let pool = pool(2);
            // let the workers go idle first
            assert_eq!(pool.submit(|_| Ok(0)).wait(Duration::from_secs(5)), Ok(0));
            std::thread::sleep(Duration::from_micros(200));

            let handles: Vec<_> = (1..4).map(|i| pool.submit(move |_| Ok(i))).collect();
            pool.shutdown();

            for (i, handle) in handles.iter().enumerate() {
                assert_eq!(handle.try_result(), Some(Ok(i + 1)));
            }
            assert_eq!(pool.pending_tasks(), 0);
        }
    }

    #[test]
    fn test_stolen_jobs_are_counted() {
        let pool = pool(4);
        let handles: Vec<_> = (0..200)
            .map(|i| {
                pool.submit(move |_| {
                    std::thread::sleep(Duration::from_micros(50));
                    Ok(i)
                })
            })
            .collect();
        pool.shutdown();

        assert!(handles.iter().all(|h| h.state() == TaskState::Completed));
        assert_eq!(pool.jobs_executed(), 200);
        assert!(pool.jobs_stolen() <= pool.jobs_executed());
    }

    #[test]
    fn test_queue_capacity_rejects() {
        let config = Config::builder()
            .num_threads(1)
            .queue_capacity(1)
            .build()
            .unwrap();
        let pool = ExecutionPool::new(&config).unwrap();

        let blocker = pool.submit(|i| {
            i.sleep(Duration::from_secs(10))?;
            Ok(())
        });
        let overflow = pool.submit(|_| Ok(()));
        assert!(matches!(
            overflow.try_result(),
            Some(Err(Error::Rejected(_)))
        ));

        blocker.cancel();
    }
}
