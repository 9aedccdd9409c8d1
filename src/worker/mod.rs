// src/worker/mod.rs — Worker pool

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use crate::core::controller::IterationController;
use crate::infra::config::WorkerConfig;
use crate::infra::errors::ModelForgeError;
use crate::queue::{Delivery, QueueAdapter};

/// How long a losing claim waits before returning the delivery, so the
/// owning worker can finish before the message comes around again.
const REDELIVERY_BACKOFF: Duration = Duration::from_millis(500);

/// Fixed-size pool of workers draining the queue. Each worker holds at most
/// `prefetch_count` jobs in flight; that cap is the admission-control knob —
/// raising it buys throughput at the cost of per-job latency fairness.
pub struct WorkerPool {
    queue: Arc<dyn QueueAdapter>,
    controller: Arc<IterationController>,
    concurrency: u32,
    prefetch_count: usize,
}

impl WorkerPool {
    pub fn new(
        queue: Arc<dyn QueueAdapter>,
        controller: Arc<IterationController>,
        config: &WorkerConfig,
    ) -> Self {
        Self {
            queue,
            controller,
            concurrency: config.concurrency.max(1),
            prefetch_count: config.prefetch_count.max(1),
        }
    }

    /// Run until the shutdown flag flips. In-flight jobs run to their next
    /// durable commit before the pool returns.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<(), ModelForgeError> {
        let mut set = JoinSet::new();
        for i in 0..self.concurrency {
            let worker = Worker {
                id: format!("worker-{i}-{}", uuid::Uuid::new_v4()),
                queue: self.queue.clone(),
                controller: self.controller.clone(),
                prefetch_count: self.prefetch_count,
            };
            set.spawn(worker.run(shutdown.clone()));
        }

        while let Some(joined) = set.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Worker task panicked: {e}");
            }
        }
        Ok(())
    }
}

struct Worker {
    id: String,
    queue: Arc<dyn QueueAdapter>,
    controller: Arc<IterationController>,
    prefetch_count: usize,
}

impl Worker {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(worker = %self.id, prefetch = self.prefetch_count, "Worker started");
        let slots = Arc::new(Semaphore::new(self.prefetch_count));
        let mut tasks = JoinSet::new();

        loop {
            if *shutdown.borrow() {
                break;
            }

            let permit = match slots.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            tokio::select! {
                _ = shutdown.changed() => break,
                pulled = self.queue.pull() => match pulled {
                    Ok(delivery) => {
                        let queue = self.queue.clone();
                        let controller = self.controller.clone();
                        let owner = self.id.clone();
                        tasks.spawn(async move {
                            process(queue, controller, &owner, delivery).await;
                            drop(permit);
                        });
                    }
                    Err(e) => {
                        tracing::error!(worker = %self.id, "Queue pull failed: {e}");
                        drop(permit);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                    }
                },
            }
        }

        // Drain in-flight jobs to their terminal commit before exiting.
        while tasks.join_next().await.is_some() {}
        tracing::info!(worker = %self.id, "Worker stopped");
    }
}

/// Process one delivery. The acknowledgment only happens after the job
/// record's durable terminal commit; anything short of that returns the
/// delivery for redelivery.
async fn process(
    queue: Arc<dyn QueueAdapter>,
    controller: Arc<IterationController>,
    owner: &str,
    delivery: Delivery,
) {
    match controller.run(&delivery.job_id, owner).await {
        Ok(status) => {
            tracing::info!(job_id = %delivery.job_id, status = %status, "Job processed");
            if let Err(e) = queue.ack(delivery.tag).await {
                tracing::error!(job_id = %delivery.job_id, "Ack failed: {e}");
            }
        }
        Err(ModelForgeError::LeaseConflict { .. }) => {
            // The losing worker aborts its claim without mutating the record.
            tracing::warn!(
                job_id = %delivery.job_id,
                worker = owner,
                "Lease held elsewhere, requeueing"
            );
            tokio::time::sleep(REDELIVERY_BACKOFF).await;
            if let Err(e) = queue.nack(delivery.tag).await {
                tracing::error!(job_id = %delivery.job_id, "Nack failed: {e}");
            }
        }
        Err(ModelForgeError::NotFound { .. }) => {
            // A message referencing a record that no longer exists would
            // otherwise circulate forever.
            tracing::warn!(job_id = %delivery.job_id, "Dropping delivery for unknown job");
            if let Err(e) = queue.ack(delivery.tag).await {
                tracing::error!(job_id = %delivery.job_id, "Ack failed: {e}");
            }
        }
        Err(e) => {
            tracing::error!(job_id = %delivery.job_id, "Job processing failed: {e}");
            if let Err(e) = queue.nack(delivery.tag).await {
                tracing::error!(job_id = %delivery.job_id, "Nack failed: {e}");
            }
        }
    }
}
