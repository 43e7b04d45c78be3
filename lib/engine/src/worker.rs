//! Background matching workers
//!
//! A FIFO job queue drained by a fixed set of named threads. Jobs are
//! plain closures; their outcome is recorded by the closure itself.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error};

use crate::error::{EngineError, Result};

pub type Job = Box<dyn FnOnce() + Send + 'static>;

struct Queue {
    jobs: Mutex<VecDeque<Job>>,
    condvar: Condvar,
    running: AtomicBool,
    processed: AtomicU64,
}

impl Queue {
    fn worker_loop(&self, worker_id: usize) {
        loop {
            let job = {
                let mut jobs = self.jobs.lock();
                while jobs.is_empty() && self.running.load(Ordering::Acquire) {
                    self.condvar.wait(&mut jobs);
                }
                match jobs.pop_front() {
                    Some(job) => job,
                    // Stopped and drained
                    None => break,
                }
            };

            if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                error!("match worker {}: job panicked", worker_id);
            }
            self.processed.fetch_add(1, Ordering::Relaxed);
        }
        debug!("match worker {} stopped", worker_id);
    }
}

/// Worker pool running matching jobs off the caller's thread
pub struct MatchWorker {
    queue: Arc<Queue>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl MatchWorker {
    /// Start `workers` threads (at least one)
    pub fn start(workers: usize) -> Result<Self> {
        let queue = Arc::new(Queue {
            jobs: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
            running: AtomicBool::new(true),
            processed: AtomicU64::new(0),
        });

        let mut handles = Vec::new();
        for worker_id in 0..workers.max(1) {
            let queue = queue.clone();
            let handle = thread::Builder::new()
                .name(format!("match-worker-{}", worker_id))
                .spawn(move || queue.worker_loop(worker_id))
                .map_err(EngineError::WorkerSpawn)?;
            handles.push(handle);
        }

        Ok(Self {
            queue,
            handles: Mutex::new(handles),
        })
    }

    /// Queue a job; rejected once the pool is shutting down
    pub fn submit(&self, job: Job) -> Result<()> {
        let mut jobs = self.queue.jobs.lock();
        if !self.queue.running.load(Ordering::Acquire) {
            return Err(EngineError::WorkerStopped);
        }
        jobs.push_back(job);
        self.queue.condvar.notify_one();
        Ok(())
    }

    pub fn pending_jobs(&self) -> usize {
        self.queue.jobs.lock().len()
    }

    pub fn jobs_processed(&self) -> u64 {
        self.queue.processed.load(Ordering::Relaxed)
    }

    /// Stop accepting jobs, finish the queued ones, and join the threads
    pub fn shutdown(&self) {
        {
            let _jobs = self.queue.jobs.lock();
            self.queue.running.store(false, Ordering::Release);
        }
        self.queue.condvar.notify_all();
        let handles: Vec<JoinHandle<()>> = self.handles.lock().drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                error!("match worker thread panicked");
            }
        }
    }
}

impl Drop for MatchWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;
    use std::time::Duration;

    #[test]
    fn test_jobs_run_in_background() {
        let worker = MatchWorker::start(1).unwrap();
        let (tx, rx) = mpsc::channel();
        for i in 0..5 {
            let tx = tx.clone();
            worker.submit(Box::new(move || tx.send(i).unwrap())).unwrap();
        }
        let got: Vec<i32> = (0..5).map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap()).collect();
        // Single worker keeps FIFO order
        assert_eq!(got, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_shutdown_drains_queue() {
        let worker = MatchWorker::start(2).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..20 {
            let counter = counter.clone();
            worker
                .submit(Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }))
                .unwrap();
        }
        worker.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 20);
        assert_eq!(worker.jobs_processed(), 20);
        assert!(matches!(worker.submit(Box::new(|| {})), Err(EngineError::WorkerStopped)));
    }

    #[test]
    fn test_panicking_job_does_not_kill_worker() {
        let worker = MatchWorker::start(1).unwrap();
        worker.submit(Box::new(|| panic!("boom"))).unwrap();
        let (tx, rx) = mpsc::channel();
        worker.submit(Box::new(move || tx.send(()).unwrap())).unwrap();
        assert!(rx.recv_timeout(Duration::from_secs(5)).is_ok());
    }
}
