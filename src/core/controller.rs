// src/core/controller.rs — Iteration controller

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::evaluator::Evaluator;
use super::retry::{RetryDecision, RetryPolicy};
use super::types::{
    Candidate, EngineConfig, IterationOutcome, JobRecord, JobStatus, RetryExhaustedPolicy,
};
use crate::infra::errors::ModelForgeError;
use crate::provider::{ProposeContext, Proposer};
use crate::store::JobStore;

/// Drives the bounded propose/evaluate loop for a single job.
///
/// One controller instance is shared by every worker; per-job exclusivity
/// comes from the store lease, not from the controller.
pub struct IterationController {
    proposer: Arc<dyn Proposer>,
    evaluator: Arc<dyn Evaluator>,
    store: Arc<dyn JobStore>,
    retry: RetryPolicy,
    config: EngineConfig,
}

enum StepResult {
    Scored {
        candidate: Candidate,
        score: f64,
        attempts: u32,
    },
    Exhausted {
        error: String,
        attempts: u32,
    },
    Fatal {
        error: String,
        attempts: u32,
    },
}

impl IterationController {
    pub fn new(
        proposer: Arc<dyn Proposer>,
        evaluator: Arc<dyn Evaluator>,
        store: Arc<dyn JobStore>,
        config: EngineConfig,
    ) -> Self {
        let retry = RetryPolicy::with_max_retries(config.max_retries);
        Self {
            proposer,
            evaluator,
            store,
            retry,
            config,
        }
    }

    /// Override the retry policy. Primarily useful in tests to drop the
    /// backoff delays.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Run the job to a terminal status.
    ///
    /// Safe to call again after a crash or queue redelivery: terminal jobs
    /// return immediately, interrupted jobs resume from the last
    /// checkpointed iteration and never replay a completed one.
    pub async fn run(&self, job_id: &str, owner: &str) -> Result<JobStatus, ModelForgeError> {
        let job = self.store.load(job_id).await?;
        if job.status.is_terminal() {
            tracing::debug!(job_id, status = %job.status, "Job already terminal, nothing to do");
            return Ok(job.status);
        }

        let mut job = self
            .store
            .claim(job_id, owner, self.config.lease_ttl)
            .await?;
        if job.status.is_terminal() {
            return Ok(job.status);
        }
        let deadline = job
            .deadline
            .ok_or_else(|| anyhow::anyhow!("claimed job '{job_id}' has no deadline"))?;

        if job.iteration_count > 0 {
            tracing::info!(
                job_id,
                iteration = job.iteration_count,
                "Resuming job from checkpoint"
            );
        }

        loop {
            // Cancellation and timeout are cooperative: observed at the top
            // of each iteration, acted on at a checkpoint boundary.
            if job.cancel_requested {
                return self.finalize(job, owner, JobStatus::Cancelled, None).await;
            }
            let now = Utc::now();
            if now >= deadline {
                return self.finalize(job, owner, JobStatus::TimedOut, None).await;
            }
            if job.iteration_count >= job.max_iterations {
                break;
            }

            // The step is bounded by the remaining wall-clock budget; a step
            // still in flight at the deadline is dropped at this boundary and
            // the job keeps whatever best candidate earlier iterations produced.
            let time_left = (deadline - now).to_std().unwrap_or(Duration::ZERO);
            let stepped = tokio::time::timeout(time_left, self.run_step(&job, deadline)).await;
            let step = match stepped {
                Ok(step) => step,
                Err(_) => {
                    return self.finalize(job, owner, JobStatus::TimedOut, None).await;
                }
            };

            match step {
                StepResult::Scored {
                    candidate,
                    score,
                    attempts,
                } => {
                    let improved = job.observe_best(candidate, score);
                    tracing::info!(
                        job_id = %job.id,
                        iteration = job.iteration_count,
                        score,
                        improved,
                        "Iteration complete"
                    );
                    let outcome = if improved {
                        IterationOutcome::Improved { score }
                    } else {
                        IterationOutcome::Rejected { score }
                    };
                    job.record_iteration(outcome, attempts);
                }
                StepResult::Exhausted { error, attempts } => {
                    tracing::warn!(
                        job_id = %job.id,
                        iteration = job.iteration_count,
                        attempts,
                        "Retries exhausted: {error}"
                    );
                    job.record_iteration(IterationOutcome::Abandoned { error: error.clone() }, attempts);
                    if self.config.retry_exhausted == RetryExhaustedPolicy::FailJob {
                        return self
                            .finalize(job, owner, JobStatus::Failed, Some(error))
                            .await;
                    }
                }
                StepResult::Fatal { error, attempts } => {
                    tracing::error!(
                        job_id = %job.id,
                        iteration = job.iteration_count,
                        "Fatal step failure: {error}"
                    );
                    job.record_iteration(IterationOutcome::Fatal { error: error.clone() }, attempts);
                    return self
                        .finalize(job, owner, JobStatus::Failed, Some(error))
                        .await;
                }
            }

            job = self.checkpoint(job, owner).await?;
        }

        // Iteration budget exhausted.
        if job.best.is_some() {
            self.finalize(job, owner, JobStatus::Succeeded, None).await
        } else {
            let cause = format!(
                "insufficient quality: no accepted candidate after {} iterations",
                job.iteration_count
            );
            self.finalize(job, owner, JobStatus::Failed, Some(cause))
                .await
        }
    }

    /// One propose/evaluate step, with transient failures retried under the
    /// policy. Only classification outcomes leave this function.
    async fn run_step(&self, job: &JobRecord, deadline: DateTime<Utc>) -> StepResult {
        let ctx = ProposeContext::for_job(job);
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match self.proposer.propose(&ctx).await {
                Ok(candidate) => match self.evaluator.evaluate(&candidate) {
                    Ok(score) => {
                        return StepResult::Scored {
                            candidate,
                            score,
                            attempts,
                        }
                    }
                    Err(e) => {
                        return StepResult::Fatal {
                            error: e.to_string(),
                            attempts,
                        }
                    }
                },
                Err(e) => {
                    let time_left = (deadline - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                    match self.retry.decide(attempts - 1, &e, time_left) {
                        RetryDecision::RetryAfter(delay) => {
                            tracing::warn!(
                                job_id = %job.id,
                                attempt = attempts,
                                delay_ms = delay.as_millis() as u64,
                                "Retrying propose after error: {e}"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        RetryDecision::GiveUp => {
                            return if e.is_retriable() {
                                StepResult::Exhausted {
                                    error: e.to_string(),
                                    attempts,
                                }
                            } else {
                                StepResult::Fatal {
                                    error: e.to_string(),
                                    attempts,
                                }
                            };
                        }
                    }
                }
            }
        }
    }

    /// Renew the lease, then durably write the updated record: exactly one
    /// CAS write per completed iteration. Returns the stored snapshot so the
    /// loop observes concurrently-set cancel flags.
    async fn checkpoint(
        &self,
        mut job: JobRecord,
        owner: &str,
    ) -> Result<JobRecord, ModelForgeError> {
        self.store
            .renew_lease(&job.id, owner, self.config.lease_ttl)
            .await?;
        job.updated_at = Utc::now();
        self.store.save(job).await
    }

    async fn finalize(
        &self,
        mut job: JobRecord,
        owner: &str,
        status: JobStatus,
        cause: Option<String>,
    ) -> Result<JobStatus, ModelForgeError> {
        self.store
            .renew_lease(&job.id, owner, self.config.lease_ttl)
            .await?;
        job.status = status;
        job.failure_cause = cause;
        job.updated_at = Utc::now();
        let saved = self.store.save(job).await?;
        self.store.release(&saved.id, owner).await?;

        tracing::info!(
            job_id = %saved.id,
            status = %saved.status,
            iterations = saved.iteration_count,
            best_score = ?saved.best_score(),
            "Job finalized"
        );
        Ok(saved.status)
    }
}
