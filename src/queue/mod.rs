// src/queue/mod.rs — Queue adapter

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::infra::config::QueueConfig;
use crate::infra::errors::ModelForgeError;

pub use memory::MemoryQueue;

/// One delivery of a job reference. Messages carry only the job id; all
/// mutable state lives in the job record, so redelivery is idempotent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub job_id: String,
    pub tag: u64,
}

/// At-least-once FIFO delivery of job references between the API and the
/// worker pool. A delivery stays in flight until acked; nacking returns it
/// to the queue for redelivery.
#[async_trait]
pub trait QueueAdapter: Send + Sync {
    async fn push(&self, job_id: &str) -> Result<(), ModelForgeError>;

    /// Wait for the next delivery.
    async fn pull(&self) -> Result<Delivery, ModelForgeError>;

    /// Remove an in-flight delivery. Called only after the job record's
    /// durable commit.
    async fn ack(&self, tag: u64) -> Result<(), ModelForgeError>;

    /// Return an in-flight delivery to the queue for redelivery.
    async fn nack(&self, tag: u64) -> Result<(), ModelForgeError>;

    /// Ready plus in-flight deliveries.
    async fn depth(&self) -> usize;
}

/// Select the queue backend for the configured location.
///
/// The broker is an external system; the in-process adapter ships in-tree
/// and backs tests and single-node runs.
pub fn from_config(config: &QueueConfig) -> Arc<dyn QueueAdapter> {
    tracing::debug!(
        host = %config.redis_host,
        port = config.redis_port,
        db = config.redis_db,
        "Queue backend configured"
    );
    Arc::new(MemoryQueue::new())
}
