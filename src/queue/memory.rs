// src/queue/memory.rs — In-process queue adapter

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{Delivery, QueueAdapter};
use crate::infra::errors::ModelForgeError;

#[derive(Default)]
struct Inner {
    ready: VecDeque<String>,
    in_flight: HashMap<u64, String>,
    next_tag: u64,
}

/// FIFO queue backed by process memory, with explicit ack/nack so the worker
/// pool's at-least-once semantics hold end to end.
#[derive(Default)]
pub struct MemoryQueue {
    inner: Mutex<Inner>,
    notify: Notify,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn locked(&self) -> Result<MutexGuard<'_, Inner>, ModelForgeError> {
        self.inner
            .lock()
            .map_err(|_| ModelForgeError::Queue("queue mutex poisoned".into()))
    }
}

#[async_trait]
impl QueueAdapter for MemoryQueue {
    async fn push(&self, job_id: &str) -> Result<(), ModelForgeError> {
        {
            let mut inner = self.locked()?;
            inner.ready.push_back(job_id.to_string());
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn pull(&self) -> Result<Delivery, ModelForgeError> {
        loop {
            // Register interest before checking, so a push between the check
            // and the await still wakes us.
            let notified = self.notify.notified();
            {
                let mut inner = self.locked()?;
                if let Some(job_id) = inner.ready.pop_front() {
                    let tag = inner.next_tag;
                    inner.next_tag += 1;
                    inner.in_flight.insert(tag, job_id.clone());
                    return Ok(Delivery { job_id, tag });
                }
            }
            notified.await;
        }
    }

    async fn ack(&self, tag: u64) -> Result<(), ModelForgeError> {
        let mut inner = self.locked()?;
        inner
            .in_flight
            .remove(&tag)
            .map(|_| ())
            .ok_or_else(|| ModelForgeError::Queue(format!("unknown delivery tag {tag}")))
    }

    async fn nack(&self, tag: u64) -> Result<(), ModelForgeError> {
        {
            let mut inner = self.locked()?;
            let job_id = inner
                .in_flight
                .remove(&tag)
                .ok_or_else(|| ModelForgeError::Queue(format!("unknown delivery tag {tag}")))?;
            inner.ready.push_back(job_id);
        }
        self.notify.notify_one();
        Ok(())
    }

    async fn depth(&self) -> usize {
        self.locked()
            .map(|inner| inner.ready.len() + inner.in_flight.len())
            .unwrap_or(0)
    }
}
