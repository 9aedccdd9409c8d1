// src/core/types.rs — Job records and iteration domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lifecycle of a model-building job. Terminal states are final and never
/// revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::TimedOut | JobStatus::Cancelled
        )
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Succeeded => write!(f, "succeeded"),
            JobStatus::Failed => write!(f, "failed"),
            JobStatus::TimedOut => write!(f, "timed_out"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// An artifact produced by the propose capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub iteration: u32,
    /// Generated model source (training + inference) as proposed.
    pub source: String,
    /// Validation metric reported alongside the proposal, if any.
    pub validation_score: Option<f64>,
}

/// The best candidate seen so far, with the score the evaluator assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub candidate: Candidate,
    pub score: f64,
}

/// Outcome of one iteration slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IterationOutcome {
    /// Candidate scored strictly better than the previous best.
    Improved { score: f64 },
    /// Candidate evaluated but did not improve on the best.
    Rejected { score: f64 },
    /// Transient failures exhausted the retry budget; the slot is consumed.
    Abandoned { error: String },
    /// Unrecoverable step failure.
    Fatal { error: String },
}

/// Append-only history entry. Never mutated after insertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration: u32,
    pub outcome: IterationOutcome,
    /// Propose attempts spent on this iteration (1 + retries).
    pub attempts: u32,
    pub recorded_at: DateTime<Utc>,
}

/// Persisted state of one model-building request. The only shared mutable
/// state in the system; every mutation flows through the persistence
/// gateway's compare-and-swap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    /// Natural-language description of the model to build. Immutable.
    pub intent: String,
    pub status: JobStatus,
    pub iteration_count: u32,
    pub max_iterations: u32,
    /// Wall-clock budget for the whole job, all iterations combined.
    pub timeout: Duration,
    pub started_at: Option<DateTime<Utc>>,
    pub deadline: Option<DateTime<Utc>>,
    /// Attempts used within the current step; resets each iteration.
    pub retry_count: u32,
    pub best: Option<ScoredCandidate>,
    pub history: Vec<IterationRecord>,
    /// Cooperative cancel flag. Monotonic, observed at loop top, excluded
    /// from the CAS so a checkpoint cannot clobber it.
    pub cancel_requested: bool,
    /// Cause string for `Failed`; the only error detail that crosses the
    /// API boundary.
    pub failure_cause: Option<String>,
    /// Compare-and-swap marker; bumped on every gateway write of iteration
    /// state.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn new(intent: impl Into<String>, max_iterations: u32, timeout: Duration) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            intent: intent.into(),
            status: JobStatus::Pending,
            iteration_count: 0,
            max_iterations,
            timeout,
            started_at: None,
            deadline: None,
            retry_count: 0,
            best: None,
            history: Vec::new(),
            cancel_requested: false,
            failure_cause: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the best candidate on strict improvement only; ties keep the
    /// earlier candidate. Returns whether the candidate was accepted.
    pub fn observe_best(&mut self, candidate: Candidate, score: f64) -> bool {
        let improves = self.best.as_ref().map(|b| score > b.score).unwrap_or(true);
        if improves {
            self.best = Some(ScoredCandidate { candidate, score });
        }
        improves
    }

    /// Append one history entry and consume an iteration budget slot.
    pub fn record_iteration(&mut self, outcome: IterationOutcome, attempts: u32) {
        self.history.push(IterationRecord {
            iteration: self.iteration_count,
            outcome,
            attempts,
            recorded_at: Utc::now(),
        });
        self.iteration_count += 1;
        self.retry_count = 0;
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best.as_ref().map(|b| b.score)
    }
}

/// What happens to a job when one step exhausts its retry budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryExhaustedPolicy {
    /// Abandon the iteration, consume the budget slot, continue.
    ConsumeIteration,
    /// Terminate the whole job as failed.
    FailJob,
}

/// Configuration for the iteration engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub max_retries: u32,
    pub retry_exhausted: RetryExhaustedPolicy,
    /// How long a worker's exclusive claim on a job lives between renewals.
    pub lease_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_exhausted: RetryExhaustedPolicy::ConsumeIteration,
            lease_ttl: Duration::from_secs(60),
        }
    }
}

impl From<&crate::infra::config::BuildConfig> for EngineConfig {
    fn from(cfg: &crate::infra::config::BuildConfig) -> Self {
        Self {
            max_retries: cfg.max_retries,
            retry_exhausted: cfg.retry_exhausted,
            ..Self::default()
        }
    }
}
