// src/store/memory.rs — In-process job store

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tokio::sync::RwLock;

use super::JobStore;
use crate::core::types::{JobRecord, JobStatus};
use crate::infra::errors::ModelForgeError;

#[derive(Debug, Clone)]
struct Lease {
    owner: String,
    expires_at: DateTime<Utc>,
}

impl Lease {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<String, JobRecord>,
    leases: HashMap<String, Lease>,
}

/// Reference implementation of the gateway contract, backed by process
/// memory. Also what the tests run against.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn chrono_ttl(ttl: Duration) -> ChronoDuration {
    ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::seconds(60))
}

#[async_trait]
impl JobStore for MemoryStore {
    async fn insert(&self, job: JobRecord) -> Result<(), ModelForgeError> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.jobs.get(&job.id) {
            return Err(ModelForgeError::Conflict {
                id: job.id,
                expected: 0,
                found: existing.version,
            });
        }
        inner.jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<JobRecord, ModelForgeError> {
        let inner = self.inner.read().await;
        inner
            .jobs
            .get(id)
            .cloned()
            .ok_or_else(|| ModelForgeError::NotFound { id: id.to_string() })
    }

    async fn save(&self, mut job: JobRecord) -> Result<JobRecord, ModelForgeError> {
        let mut inner = self.inner.write().await;
        let terminal = job.status.is_terminal();
        let id = job.id.clone();
        let stored = inner
            .jobs
            .get_mut(&id)
            .ok_or_else(|| ModelForgeError::NotFound { id: id.clone() })?;

        if stored.version != job.version {
            return Err(ModelForgeError::Conflict {
                id,
                expected: job.version,
                found: stored.version,
            });
        }

        job.version += 1;
        job.cancel_requested = job.cancel_requested || stored.cancel_requested;
        *stored = job.clone();

        if terminal {
            inner.leases.remove(&id);
        }
        Ok(job)
    }

    async fn claim(
        &self,
        id: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<JobRecord, ModelForgeError> {
        let now = Utc::now();
        let mut inner = self.inner.write().await;

        if let Some(lease) = inner.leases.get(id) {
            if lease.is_live(now) && lease.owner != owner {
                return Err(ModelForgeError::LeaseConflict { id: id.to_string() });
            }
        }

        let job = inner
            .jobs
            .get_mut(id)
            .ok_or_else(|| ModelForgeError::NotFound { id: id.to_string() })?;

        if job.status.is_terminal() {
            return Ok(job.clone());
        }

        job.status = JobStatus::Running;
        if job.started_at.is_none() {
            job.started_at = Some(now);
            job.deadline = Some(now + chrono_ttl(job.timeout));
        }
        job.updated_at = now;
        job.version += 1;
        let claimed = job.clone();

        inner.leases.insert(
            id.to_string(),
            Lease {
                owner: owner.to_string(),
                expires_at: now + chrono_ttl(ttl),
            },
        );
        Ok(claimed)
    }

    async fn renew_lease(
        &self,
        id: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<(), ModelForgeError> {
        let now = Utc::now();
        let mut inner = self.inner.write().await;
        match inner.leases.get_mut(id) {
            // An expired lease can be revived only while no other worker has
            // claimed the job in the meantime.
            Some(lease) if lease.owner == owner => {
                lease.expires_at = now + chrono_ttl(ttl);
                Ok(())
            }
            _ => Err(ModelForgeError::LeaseConflict { id: id.to_string() }),
        }
    }

    async fn release(&self, id: &str, owner: &str) -> Result<(), ModelForgeError> {
        let mut inner = self.inner.write().await;
        if inner
            .leases
            .get(id)
            .map(|lease| lease.owner == owner)
            .unwrap_or(false)
        {
            inner.leases.remove(id);
        }
        Ok(())
    }

    async fn request_cancel(&self, id: &str) -> Result<(), ModelForgeError> {
        let mut inner = self.inner.write().await;
        let job = inner
            .jobs
            .get_mut(id)
            .ok_or_else(|| ModelForgeError::NotFound { id: id.to_string() })?;
        if !job.status.is_terminal() {
            job.cancel_requested = true;
            job.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<JobRecord>, ModelForgeError> {
        let inner = self.inner.read().await;
        let mut jobs: Vec<JobRecord> = inner.jobs.values().cloned().collect();
        jobs.sort_by_key(|j| j.created_at);
        Ok(jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(30);

    fn record() -> JobRecord {
        JobRecord::new("predict churn", 5, Duration::from_secs(300))
    }

    #[tokio::test]
    async fn test_insert_and_load() {
        let store = MemoryStore::new();
        let job = record();
        let id = job.id.clone();
        store.insert(job).await.unwrap();
        let loaded = store.load(&id).await.unwrap();
        assert_eq!(loaded.id, id);
        assert_eq!(loaded.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_load_missing_is_not_found() {
        let store = MemoryStore::new();
        let err = store.load("nope").await.unwrap_err();
        assert!(matches!(err, ModelForgeError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_insert_duplicate_conflicts() {
        let store = MemoryStore::new();
        let job = record();
        store.insert(job.clone()).await.unwrap();
        let err = store.insert(job).await.unwrap_err();
        assert!(matches!(err, ModelForgeError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_save_bumps_version() {
        let store = MemoryStore::new();
        let job = record();
        let id = job.id.clone();
        store.insert(job).await.unwrap();
        let loaded = store.load(&id).await.unwrap();
        let saved = store.save(loaded).await.unwrap();
        assert_eq!(saved.version, 1);
    }

    #[tokio::test]
    async fn test_save_stale_version_conflicts() {
        let store = MemoryStore::new();
        let job = record();
        let id = job.id.clone();
        store.insert(job).await.unwrap();

        let snapshot_a = store.load(&id).await.unwrap();
        let snapshot_b = store.load(&id).await.unwrap();

        store.save(snapshot_a).await.unwrap();
        let err = store.save(snapshot_b).await.unwrap_err();
        assert!(matches!(err, ModelForgeError::Conflict { .. }));

        // The racing write must not have touched history.
        let current = store.load(&id).await.unwrap();
        assert!(current.history.is_empty());
        assert_eq!(current.version, 1);
    }

    #[tokio::test]
    async fn test_save_preserves_concurrent_cancel() {
        let store = MemoryStore::new();
        let job = record();
        let id = job.id.clone();
        store.insert(job).await.unwrap();

        let snapshot = store.load(&id).await.unwrap();
        store.request_cancel(&id).await.unwrap();

        // Checkpointing from a snapshot taken before the cancel keeps the flag.
        let saved = store.save(snapshot).await.unwrap();
        assert!(saved.cancel_requested);
        assert!(store.load(&id).await.unwrap().cancel_requested);
    }

    #[tokio::test]
    async fn test_claim_marks_running_and_stamps_deadline() {
        let store = MemoryStore::new();
        let job = record();
        let id = job.id.clone();
        let timeout = job.timeout;
        store.insert(job).await.unwrap();

        let claimed = store.claim(&id, "worker-a", TTL).await.unwrap();
        assert_eq!(claimed.status, JobStatus::Running);
        let started = claimed.started_at.unwrap();
        let deadline = claimed.deadline.unwrap();
        assert_eq!(deadline - started, ChronoDuration::from_std(timeout).unwrap());
    }

    #[tokio::test]
    async fn test_second_claim_is_lease_conflict() {
        let store = MemoryStore::new();
        let job = record();
        let id = job.id.clone();
        store.insert(job).await.unwrap();

        store.claim(&id, "worker-a", TTL).await.unwrap();
        let err = store.claim(&id, "worker-b", TTL).await.unwrap_err();
        assert!(matches!(err, ModelForgeError::LeaseConflict { .. }));
    }

    #[tokio::test]
    async fn test_expired_lease_can_be_reclaimed() {
        let store = MemoryStore::new();
        let job = record();
        let id = job.id.clone();
        store.insert(job).await.unwrap();

        store
            .claim(&id, "worker-a", Duration::from_millis(0))
            .await
            .unwrap();
        // worker-a's lease expired immediately; worker-b may take over.
        let reclaimed = store.claim(&id, "worker-b", TTL).await.unwrap();
        assert_eq!(reclaimed.status, JobStatus::Running);
    }

    #[tokio::test]
    async fn test_reclaim_preserves_original_deadline() {
        let store = MemoryStore::new();
        let job = record();
        let id = job.id.clone();
        store.insert(job).await.unwrap();

        let first = store
            .claim(&id, "worker-a", Duration::from_millis(0))
            .await
            .unwrap();
        let second = store.claim(&id, "worker-b", TTL).await.unwrap();
        assert_eq!(first.started_at, second.started_at);
        assert_eq!(first.deadline, second.deadline);
    }

    #[tokio::test]
    async fn test_renew_by_owner_extends() {
        let store = MemoryStore::new();
        let job = record();
        let id = job.id.clone();
        store.insert(job).await.unwrap();

        store.claim(&id, "worker-a", TTL).await.unwrap();
        store.renew_lease(&id, "worker-a", TTL).await.unwrap();
    }

    #[tokio::test]
    async fn test_renew_by_other_owner_conflicts() {
        let store = MemoryStore::new();
        let job = record();
        let id = job.id.clone();
        store.insert(job).await.unwrap();

        store.claim(&id, "worker-a", TTL).await.unwrap();
        let err = store.renew_lease(&id, "worker-b", TTL).await.unwrap_err();
        assert!(matches!(err, ModelForgeError::LeaseConflict { .. }));
    }

    #[tokio::test]
    async fn test_terminal_save_drops_lease() {
        let store = MemoryStore::new();
        let job = record();
        let id = job.id.clone();
        store.insert(job).await.unwrap();

        let mut claimed = store.claim(&id, "worker-a", TTL).await.unwrap();
        claimed.status = JobStatus::Succeeded;
        store.save(claimed).await.unwrap();

        // Lease is gone, so another claim returns the terminal record as-is.
        let after = store.claim(&id, "worker-b", TTL).await.unwrap();
        assert_eq!(after.status, JobStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_cancel_on_terminal_job_is_noop() {
        let store = MemoryStore::new();
        let job = record();
        let id = job.id.clone();
        store.insert(job).await.unwrap();

        let mut claimed = store.claim(&id, "worker-a", TTL).await.unwrap();
        claimed.status = JobStatus::Succeeded;
        store.save(claimed).await.unwrap();

        store.request_cancel(&id).await.unwrap();
        assert!(!store.load(&id).await.unwrap().cancel_requested);
    }

    #[tokio::test]
    async fn test_list_sorted_by_creation() {
        let store = MemoryStore::new();
        let a = record();
        let b = record();
        let (a_id, b_id) = (a.id.clone(), b.id.clone());
        store.insert(a).await.unwrap();
        store.insert(b).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        let ids: Vec<String> = listed.into_iter().map(|j| j.id).collect();
        assert!(ids.contains(&a_id) && ids.contains(&b_id));
    }
}
