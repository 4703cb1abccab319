//! Fixed-size worker pool with a completion barrier.
//!
//! [`WorkQueue::finish`] waits until every submitted job has run, including
//! jobs submitted by other jobs while it waits. It does not stop the workers;
//! only [`WorkQueue::shutdown`] (or dropping the queue) does.

use anyhow::{bail, Context, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

type Job = Box<dyn FnOnce() + Send + 'static>;

#[derive(Default)]
struct QueueState {
    jobs: VecDeque<Job>,
    /// Submitted but not yet finished.
    pending: usize,
    shutdown: bool,
}

#[derive(Default)]
struct Shared {
    state: Mutex<QueueState>,
    available: Condvar,
    idle: Condvar,
}

impl Shared {
    fn submit(&self, job: Job) -> Result<()> {
        let mut state = self.state.lock();
        if state.shutdown {
            bail!("work queue has been shut down");
        }
        state.pending += 1;
        state.jobs.push_back(job);
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    fn finish(&self) {
        let mut state = self.state.lock();
        while state.pending > 0 {
            self.idle.wait(&mut state);
        }
    }

    fn next_job(&self) -> Option<Job> {
        let mut state = self.state.lock();
        loop {
            if let Some(job) = state.jobs.pop_front() {
                return Some(job);
            }
            if state.shutdown {
                return None;
            }
            self.available.wait(&mut state);
        }
    }
}

/// Decrements the pending count however the job exits.
struct PendingGuard<'a>(&'a Shared);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.0.state.lock();
        state.pending -= 1;
        if state.pending == 0 {
            self.0.idle.notify_all();
        }
    }
}

fn run_worker(shared: Arc<Shared>) {
    while let Some(job) = shared.next_job() {
        let _pending = PendingGuard(&shared);
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".into());
            tracing::error!(worker = thread::current().name().unwrap_or("?"), %reason, "job panicked");
        }
    }
    tracing::debug!(worker = thread::current().name().unwrap_or("?"), "worker exiting");
}

/// Cloneable submit/barrier access for code that runs inside jobs.
#[derive(Clone)]
pub struct WorkHandle {
    shared: Arc<Shared>,
}

impl WorkHandle {
    /// Queues `job` and returns immediately.
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.submit(Box::new(job))
    }

    /// Blocks until no submitted job is outstanding. Must not be called from a
    /// job on the same pool, since that job counts as outstanding.
    pub fn finish(&self) {
        self.shared.finish()
    }

    pub fn pending(&self) -> usize {
        self.shared.state.lock().pending
    }
}

pub struct WorkQueue {
    handle: WorkHandle,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkQueue {
    pub const DEFAULT_THREADS: usize = 5;

    /// Spawns `threads` workers; zero is raised to one. If a worker cannot be
    /// spawned, the ones already running are stopped and joined.
    pub fn new(threads: usize) -> Result<Self> {
        let threads = threads.max(1);
        let queue = Self { handle: WorkHandle { shared: Arc::new(Shared::default()) }, workers: Mutex::new(Vec::new()) };
        for i in 0..threads {
            let shared = queue.handle.shared.clone();
            let worker = thread::Builder::new()
                .name(format!("worker-{i}"))
                .spawn(move || run_worker(shared))
                .with_context(|| format!("spawning worker {i} of {threads}"))?;
            queue.workers.lock().push(worker);
        }
        tracing::debug!(threads, "work queue started");
        Ok(queue)
    }

    pub fn handle(&self) -> WorkHandle {
        self.handle.clone()
    }

    pub fn size(&self) -> usize {
        self.workers.lock().len()
    }

    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.handle.submit(job)
    }

    pub fn finish(&self) {
        self.handle.finish()
    }

    pub fn pending(&self) -> usize {
        self.handle.pending()
    }

    /// Lets the workers drain what is queued, then joins them. Later submits fail.
    pub fn shutdown(&self) {
        {
            let mut state = self.handle.shared.state.lock();
            if state.shutdown {
                return;
            }
            state.shutdown = true;
        }
        self.handle.shared.available.notify_all();
        for worker in self.workers.lock().drain(..) {
            if worker.join().is_err() {
                tracing::error!("worker thread terminated abnormally");
            }
        }
        tracing::debug!("work queue shut down");
    }
}

impl Drop for WorkQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}
