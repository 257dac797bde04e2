//! Bounded worker pool for optimizer and ray-sampling jobs.
//!
//! A fixed set of threads drains a bounded job queue. Each job carries a
//! cancellation flag that long-running work polls; callers waiting with a
//! deadline raise it when the deadline passes.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded};
use dashmap::DashMap;

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("job queue is full")]
    Saturated,
    #[error("all worker threads have exited")]
    Closed,
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum JobError {
    #[error("job did not finish before the deadline")]
    TimedOut,
    #[error("job panicked or was dropped before finishing")]
    Lost,
}

/// Internal wrapper that carries the work and its cancellation flag.
struct QueuedJob {
    id: u64,
    run: Box<dyn FnOnce(&AtomicBool) + Send>,
    cancelled: Arc<AtomicBool>,
}

/// Worker count leaving two cores for the caller's own threads.
pub fn default_thread_count() -> usize {
    let cpus = num_cpus::get().max(2);
    (cpus - 2).max(1)
}

/// Fixed-size thread pool with a bounded queue.
pub struct WorkerPool {
    job_sender: Sender<QueuedJob>,
    /// Cancellation flag per queued or running job.
    active_jobs: Arc<DashMap<u64, Arc<AtomicBool>>>,
    /// Jobs queued or executing.
    in_flight: Arc<AtomicU64>,
    next_id: AtomicU64,
    threads: usize,
}

impl WorkerPool {
    /// Spawn `threads` workers sharing a queue of `queue_capacity` jobs.
    pub fn new(threads: usize, queue_capacity: usize) -> Result<Self, PoolError> {
        let threads = threads.max(1);
        let (job_sender, job_receiver) = bounded::<QueuedJob>(queue_capacity.max(1));
        let active_jobs: Arc<DashMap<u64, Arc<AtomicBool>>> = Arc::new(DashMap::new());
        let in_flight = Arc::new(AtomicU64::new(0));

        for index in 0..threads {
            let receiver = job_receiver.clone();
            let active_jobs = Arc::clone(&active_jobs);
            let in_flight = Arc::clone(&in_flight);

            std::thread::Builder::new()
                .name(format!("tourlay-worker-{index}"))
                .spawn(move || {
                    while let Ok(job) = receiver.recv() {
                        if !job.cancelled.load(Ordering::Relaxed) {
                            let flag = Arc::clone(&job.cancelled);
                            let run = job.run;
                            // The job's own result channel reports the panic as Lost.
                            if catch_unwind(AssertUnwindSafe(|| run(&flag))).is_err() {
                                tracing::error!("worker job {} panicked", job.id);
                            }
                        }
                        active_jobs.remove(&job.id);
                        in_flight.fetch_sub(1, Ordering::Relaxed);
                    }
                })?;
        }

        tracing::debug!("worker pool started with {threads} threads");

        Ok(Self {
            job_sender,
            active_jobs,
            in_flight,
            next_id: AtomicU64::new(0),
            threads,
        })
    }

    /// Pool of [`default_thread_count`] workers.
    pub fn with_defaults() -> Result<Self, PoolError> {
        Self::new(default_thread_count(), 64)
    }

    /// Queue `job`. It receives a flag that is raised when the caller stops
    /// waiting; long-running work should poll it.
    pub fn submit<T, F>(&self, job: F) -> Result<JobHandle<T>, PoolError>
    where
        T: Send + 'static,
        F: FnOnce(&AtomicBool) -> T + Send + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let cancelled = Arc::new(AtomicBool::new(false));
        let (result_sender, result_receiver) = bounded::<T>(1);

        let queued = QueuedJob {
            id,
            run: Box::new(move |flag| {
                // The handle may already be gone; the result is then discarded.
                let _ = result_sender.send(job(flag));
            }),
            cancelled: Arc::clone(&cancelled),
        };

        self.active_jobs.insert(id, Arc::clone(&cancelled));
        self.in_flight.fetch_add(1, Ordering::Relaxed);

        match self.job_sender.try_send(queued) {
            Ok(()) => Ok(JobHandle {
                id,
                receiver: result_receiver,
                cancelled,
            }),
            Err(e) => {
                self.in_flight.fetch_sub(1, Ordering::Relaxed);
                self.active_jobs.remove(&id);
                match e {
                    TrySendError::Full(_) => Err(PoolError::Saturated),
                    TrySendError::Disconnected(_) => Err(PoolError::Closed),
                }
            }
        }
    }

    /// Raise the cancellation flag of a queued or running job.
    ///
    /// No-op if the job has already finished.
    pub fn cancel(&self, id: u64) {
        if let Some(flag) = self.active_jobs.get(&id) {
            flag.store(true, Ordering::Relaxed);
        }
    }

    /// Jobs currently queued or executing.
    pub fn in_flight_count(&self) -> u64 {
        self.in_flight.load(Ordering::Relaxed)
    }

    pub fn thread_count(&self) -> usize {
        self.threads
    }
}

/// Pending result of a submitted job.
pub struct JobHandle<T> {
    id: u64,
    receiver: Receiver<T>,
    cancelled: Arc<AtomicBool>,
}

impl<T> JobHandle<T> {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Block until the job finishes, or until `timeout` passes.
    ///
    /// On timeout the job's cancellation flag is raised.
    pub fn wait(self, timeout: Option<Duration>) -> Result<T, JobError> {
        match timeout {
            None => self.receiver.recv().map_err(|_| JobError::Lost),
            Some(limit) => match self.receiver.recv_timeout(limit) {
                Ok(value) => Ok(value),
                Err(RecvTimeoutError::Timeout) => {
                    self.cancelled.store(true, Ordering::Relaxed);
                    Err(JobError::TimedOut)
                }
                Err(RecvTimeoutError::Disconnected) => Err(JobError::Lost),
            },
        }
    }

    /// Ask the job to stop without waiting for it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_job_result_delivered() {
        let pool = WorkerPool::new(2, 8).unwrap();
        let handle = pool.submit(|_| 6 * 7).unwrap();
        assert_eq!(handle.wait(None), Ok(42));
    }

    /// A job that polls its flag stops once the waiter gives up.
    #[test]
    fn test_timeout_raises_cancel_flag() {
        let pool = WorkerPool::new(1, 4).unwrap();
        let (seen_tx, seen_rx) = bounded(1);
        let handle = pool
            .submit(move |cancel: &AtomicBool| {
                let start = Instant::now();
                while !cancel.load(Ordering::Relaxed) && start.elapsed() < Duration::from_secs(5) {
                    std::thread::sleep(Duration::from_millis(1));
                }
                let _ = seen_tx.send(cancel.load(Ordering::Relaxed));
            })
            .unwrap();
        assert_eq!(
            handle.wait(Some(Duration::from_millis(20))),
            Err(JobError::TimedOut)
        );
        assert_eq!(seen_rx.recv_timeout(Duration::from_secs(5)), Ok(true));
    }

    #[test]
    fn test_full_queue_is_saturated() {
        let pool = WorkerPool::new(1, 1).unwrap();
        let (release_tx, release_rx) = bounded::<()>(0);
        let (started_tx, started_rx) = bounded::<()>(1);
        let blocker = pool
            .submit(move |_| {
                let _ = started_tx.send(());
                let _ = release_rx.recv();
            })
            .unwrap();
        started_rx.recv().unwrap();

        // The worker is busy; one job fits in the queue, the next does not.
        let queued = pool.submit(|_| ()).unwrap();
        assert!(matches!(pool.submit(|_| ()), Err(PoolError::Saturated)));
        assert_eq!(pool.in_flight_count(), 2);

        release_tx.send(()).unwrap();
        blocker.wait(None).unwrap();
        queued.wait(None).unwrap();
    }

    #[test]
    fn test_panicking_job_is_lost_and_pool_survives() {
        let pool = WorkerPool::new(1, 4).unwrap();
        let handle = pool.submit(|_| -> u32 { panic!("boom") }).unwrap();
        assert_eq!(handle.wait(None), Err(JobError::Lost));
        assert_eq!(pool.submit(|_| 1).unwrap().wait(None), Ok(1));
    }

    #[test]
    fn test_cancelled_before_start_is_skipped() {
        let pool = WorkerPool::new(1, 4).unwrap();
        let (release_tx, release_rx) = bounded::<()>(0);
        let blocker = pool.submit(move |_| {
            let _ = release_rx.recv();
        });
        let pending = pool.submit(|_| 5).unwrap();
        pool.cancel(pending.id());
        release_tx.send(()).unwrap();
        blocker.unwrap().wait(None).unwrap();
        assert_eq!(pending.wait(None), Err(JobError::Lost));
    }

    #[test]
    fn test_defaults_have_a_thread() {
        assert!(WorkerPool::with_defaults().unwrap().thread_count() >= 1);
    }
}
