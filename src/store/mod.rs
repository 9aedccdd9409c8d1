// src/store/mod.rs — Persistence gateway for job records

pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::types::JobRecord;
use crate::infra::config::StoreConfig;
use crate::infra::errors::ModelForgeError;

pub use memory::MemoryStore;

/// Transactional read/modify/write of job records.
///
/// `save` is compare-and-swap on `version`: a write from a stale snapshot
/// fails with `Conflict` instead of silently corrupting history. Leases are
/// worker-coordination state kept alongside the record, outside the CAS.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: JobRecord) -> Result<(), ModelForgeError>;

    async fn load(&self, id: &str) -> Result<JobRecord, ModelForgeError>;

    /// CAS write. On success returns the stored record: version bumped, any
    /// concurrently-set cancel flag folded in.
    async fn save(&self, job: JobRecord) -> Result<JobRecord, ModelForgeError>;

    /// Atomically take the lease and mark the job running. The first claim
    /// stamps `started_at` and `deadline = started_at + timeout`; re-claims
    /// preserve both. Fails with `LeaseConflict` while another worker holds
    /// a live lease. Terminal jobs are returned unchanged.
    async fn claim(
        &self,
        id: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<JobRecord, ModelForgeError>;

    /// Extend the caller's lease; required before each checkpoint. Fails
    /// with `LeaseConflict` if another worker owns the lease.
    async fn renew_lease(&self, id: &str, owner: &str, ttl: Duration)
        -> Result<(), ModelForgeError>;

    /// Drop the lease if the caller still owns it.
    async fn release(&self, id: &str, owner: &str) -> Result<(), ModelForgeError>;

    /// Set the cooperative cancel flag. Monotonic and outside the CAS so a
    /// racing checkpoint cannot clobber it. No-op on terminal jobs.
    async fn request_cancel(&self, id: &str) -> Result<(), ModelForgeError>;

    async fn list(&self) -> Result<Vec<JobRecord>, ModelForgeError>;
}

/// Select the persistence backend for the configured location.
///
/// The document store is an external system; the in-process gateway ships
/// in-tree and backs tests and single-node runs.
pub fn from_config(config: &StoreConfig) -> Arc<dyn JobStore> {
    tracing::debug!(db = %config.mongodb_db, "Job store configured");
    Arc::new(MemoryStore::new())
}
