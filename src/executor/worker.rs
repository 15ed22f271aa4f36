// worker thread loop
use super::job::Job;
use super::pool::PoolShared;
use crate::util::Backoff;
use crossbeam_deque::{Injector, Steal, Stealer, Worker as WorkerQueue};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub type WorkerId = usize;

// stats for each worker
#[derive(Debug, Default)]
pub struct WorkerState {
    pub jobs_executed: AtomicU64,
    pub jobs_stolen: AtomicU64,
}

pub(crate) struct Worker {
    pub id: WorkerId,
    pub local_queue: WorkerQueue<Job>,
    pub state: Arc<WorkerState>,
}

impl Worker {
    pub fn new(id: WorkerId) -> Self {
        Self {
            id,
            local_queue: WorkerQueue::new_fifo(),
            state: Arc::new(WorkerState::default()),
        }
    }

    // main loop; exits only after a search that began once shutdown was
    // flagged comes back empty, so every accepted push is seen
    pub fn run(&self, stealers: Vec<Stealer<Job>>, injector: Arc<Injector<Job>>, shared: Arc<PoolShared>) {
        let mut backoff = Backoff::new(shared.idle_park);

        loop {
            let stopping = shared.is_shutdown();

            if let Some(job) = self.find_job(&stealers, &injector) {
                backoff.reset();
                self.execute_job(job, &shared);
                continue;
            }

            if stopping {
                break;
            }

            backoff.idle();
        }

        tracing::trace!(worker = self.id, "worker exiting");
    }

    fn find_job(&self, stealers: &[Stealer<Job>], injector: &Injector<Job>) -> Option<Job> {
        if let Some(job) = self.local_queue.pop() {
            return Some(job);
        }

        loop {
            match injector.steal_batch_and_pop(&self.local_queue) {
                Steal::Success(job) => return Some(job),
                Steal::Empty => break,
                Steal::Retry => continue,
            }
        }

        self.try_steal_from_workers(stealers)
    }

    fn try_steal_from_workers(&self, stealers: &[Stealer<Job>]) -> Option<Job> {
        use rand::seq::SliceRandom;
        use rand::thread_rng;

        if stealers.len() < 2 {
            return None;
        }

        let mut indices: Vec<usize> = (0..stealers.len()).collect();
        indices.shuffle(&mut thread_rng());

        for &idx in &indices {
            if idx == self.id {
                continue;
            }

            loop {
                match stealers[idx].steal_batch_and_pop(&self.local_queue) {
                    Steal::Success(job) => {
                        self.state.jobs_stolen.fetch_add(1, Ordering::Relaxed);
                        return Some(job);
                    }
                    Steal::Empty => break,
                    Steal::Retry => continue,
                }
            }
        }

        None
    }

    fn execute_job(&self, job: Job, shared: &PoolShared) {
        let id = job.id;
        tracing::trace!(worker = self.id, task = %id, waited = ?job.queued_at.elapsed(), "picked up");

        // work bodies catch their own panics; this only guards the worker
        if std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| job.execute())).is_err() {
            tracing::error!(worker = self.id, task = %id, "job panicked outside its body");
        }

        shared.pending.fetch_sub(1, Ordering::AcqRel);
        self.state.jobs_executed.fetch_add(1, Ordering::Relaxed);
    }
}
