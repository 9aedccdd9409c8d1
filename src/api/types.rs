// src/api/types.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::types::{IterationRecord, JobRecord, JobStatus};

/// Request body for submitting a model build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRequest {
    pub intent: String,
    /// Per-job override of the configured iteration ceiling.
    #[serde(default)]
    pub max_iterations: Option<u32>,
    /// Per-job override of the configured wall-clock budget.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

/// Response for build submission.
#[derive(Debug, Serialize)]
pub struct BuildAccepted {
    pub job_id: String,
    pub status: JobStatus,
}

/// External view of a job record. No raw internal errors — only the status
/// and the recorded cause string.
#[derive(Debug, Serialize)]
pub struct JobView {
    pub id: String,
    pub intent: String,
    pub status: JobStatus,
    pub iteration_count: u32,
    pub max_iterations: u32,
    pub best_score: Option<f64>,
    pub started_at: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    pub failure_cause: Option<String>,
    pub history: Vec<IterationRecord>,
}

impl From<JobRecord> for JobView {
    fn from(job: JobRecord) -> Self {
        Self {
            best_score: job.best_score(),
            id: job.id,
            intent: job.intent,
            status: job.status,
            iteration_count: job.iteration_count,
            max_iterations: job.max_iterations,
            started_at: job.started_at,
            deadline: job.deadline,
            failure_cause: job.failure_cause,
            history: job.history,
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
