use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{RecvTimeoutError, Sender};
use log::{debug, error, info, warn};

use crate::error::WorkerError;
use crate::queue::{Delivery, DispatchQueue};
use crate::worker::executor::{JobExecutor, Outcome};

/// How long a worker blocks on the queue before re-checking the shutdown flag.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Independent competing consumers, one OS thread each.
pub struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
    shutdown: Arc<AtomicBool>,
}

impl WorkerPool {
    pub fn start(
        executor: Arc<JobExecutor>,
        queue: Arc<dyn DispatchQueue>,
        worker_count: usize,
    ) -> Result<Self, WorkerError> {
        Self::with_poll_timeout(executor, queue, worker_count, DEFAULT_POLL_TIMEOUT)
    }

    pub fn with_poll_timeout(
        executor: Arc<JobExecutor>,
        queue: Arc<dyn DispatchQueue>,
        worker_count: usize,
        poll_timeout: Duration,
    ) -> Result<Self, WorkerError> {
        if worker_count == 0 {
            return Err(WorkerError::NoWorkers);
        }

        let shutdown = Arc::new(AtomicBool::new(false));
        let mut pool = Self {
            workers: Vec::with_capacity(worker_count),
            shutdown: Arc::clone(&shutdown),
        };

        for worker_id in 0..worker_count {
            let executor = Arc::clone(&executor);
            let queue = Arc::clone(&queue);
            let shutdown_flag = Arc::clone(&shutdown);

            let spawned = thread::Builder::new()
                .name(format!("worker-{}", worker_id))
                .spawn(move || {
                    run_worker(worker_id, executor, queue, shutdown_flag, poll_timeout);
                });

            match spawned {
                Ok(handle) => pool.workers.push(handle),
                Err(e) => {
                    pool.shutdown();
                    pool.wait();
                    return Err(WorkerError::SpawnFailed(e.to_string()));
                }
            }
        }

        info!(
            "Started {} workers on the {} queue",
            worker_count,
            queue.name()
        );
        Ok(pool)
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Asks every worker to stop after its current job.
    pub fn shutdown(&self) {
        info!("Shutting down worker pool...");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    /// Blocks until every worker has exited. Call [`shutdown`](Self::shutdown) first.
    pub fn wait(self) {
        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Worker {} panicked: {:?}", i, e);
            } else {
                debug!("Worker {} finished", i);
            }
        }

        info!("All workers have stopped");
    }
}

/// Renews a delivery's lease on a side thread until dropped.
struct LeaseHeartbeat {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl LeaseHeartbeat {
    /// Returns `None` when the queue has no leases to renew.
    fn start(queue: &Arc<dyn DispatchQueue>, delivery: &Delivery) -> Option<Self> {
        let interval = queue.renewal_interval()?;
        let (stop, stopped) = crossbeam_channel::bounded::<()>(0);
        let queue = Arc::clone(queue);
        let delivery = delivery.clone();
        let renewed = delivery.clone();

        let spawned = thread::Builder::new()
            .name(format!("lease-{}", delivery.message.job_id))
            .spawn(move || {
                let delivery = renewed;
                while let Err(RecvTimeoutError::Timeout) = stopped.recv_timeout(interval) {
                    match queue.renew(&delivery) {
                        Ok(true) => {}
                        Ok(false) => {
                            warn!("Lost the lease on job {}", delivery.message.job_id);
                            break;
                        }
                        Err(e) => warn!(
                            "Failed to renew lease on job {}: {}",
                            delivery.message.job_id, e
                        ),
                    }
                }
            });

        match spawned {
            Ok(handle) => Some(Self {
                stop: Some(stop),
                handle: Some(handle),
            }),
            Err(e) => {
                warn!(
                    "No lease heartbeat for job {}: {}",
                    delivery.message.job_id, e
                );
                None
            }
        }
    }
}

impl Drop for LeaseHeartbeat {
    fn drop(&mut self) {
        drop(self.stop.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run_worker(
    worker_id: usize,
    executor: Arc<JobExecutor>,
    queue: Arc<dyn DispatchQueue>,
    shutdown: Arc<AtomicBool>,
    poll_timeout: Duration,
) {
    debug!("Worker {} started", worker_id);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            debug!("Worker {} received shutdown signal", worker_id);
            break;
        }

        let delivery = match queue.dequeue(poll_timeout) {
            Ok(Some(delivery)) => delivery,
            Ok(None) => continue,
            Err(e) => {
                warn!("Worker {} cannot read from queue: {}", worker_id, e);
                thread::sleep(poll_timeout);
                continue;
            }
        };

        let job_id = delivery.message.job_id.clone();
        debug!(
            "Worker {} picked up job {} (attempt {})",
            worker_id, job_id, delivery.attempt
        );

        let heartbeat = LeaseHeartbeat::start(&queue, &delivery);
        let executed = panic::catch_unwind(AssertUnwindSafe(|| executor.execute(&delivery.message)));
        drop(heartbeat);

        match executed {
            Ok(Ok(outcome)) => {
                if let Outcome::Skipped(reason) = &outcome {
                    debug!("Worker {} skipped job {}: {:?}", worker_id, job_id, reason);
                }
                if let Err(e) = queue.ack(&delivery) {
                    warn!("Worker {} failed to ack job {}: {}", worker_id, job_id, e);
                }
            }
            Ok(Err(e)) => {
                // Left unacknowledged so the lease expires and it is retried.
                error!("Worker {} could not record job {}: {}", worker_id, job_id, e);
            }
            Err(_) => {
                error!("Worker {} panicked while handling job {}", worker_id, job_id);
            }
        }
    }

    debug!("Worker {} stopped", worker_id);
}
