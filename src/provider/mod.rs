// src/provider/mod.rs — Propose capability

pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::types::{Candidate, IterationOutcome, JobRecord};
use crate::infra::config::ProviderConfig;
use crate::infra::errors::ModelForgeError;

/// Everything the propose capability sees about a job: the intent, where the
/// loop stands, and brief feedback from previous iterations.
#[derive(Debug, Clone)]
pub struct ProposeContext {
    pub job_id: String,
    pub intent: String,
    pub iteration: u32,
    pub best_score: Option<f64>,
    pub feedback: Vec<String>,
}

impl ProposeContext {
    pub fn for_job(job: &JobRecord) -> Self {
        let feedback = job
            .history
            .iter()
            .map(|entry| match &entry.outcome {
                IterationOutcome::Improved { score } => {
                    format!("iteration {}: improved, score {score:.3}", entry.iteration)
                }
                IterationOutcome::Rejected { score } => {
                    format!("iteration {}: rejected, score {score:.3}", entry.iteration)
                }
                IterationOutcome::Abandoned { error } => {
                    format!("iteration {}: abandoned ({error})", entry.iteration)
                }
                IterationOutcome::Fatal { error } => {
                    format!("iteration {}: failed ({error})", entry.iteration)
                }
            })
            .collect();

        Self {
            job_id: job.id.clone(),
            intent: job.intent.clone(),
            iteration: job.iteration_count,
            best_score: job.best_score(),
            feedback,
        }
    }
}

/// Opaque LLM capability that proposes model candidates.
///
/// Failure modes are declared through the error taxonomy: transient errors
/// (timeouts, 5xx, rate limits) are retried by the controller's retry
/// policy, everything else fails the step.
#[async_trait]
pub trait Proposer: Send + Sync {
    fn id(&self) -> &str;

    async fn propose(&self, ctx: &ProposeContext) -> Result<Candidate, ModelForgeError>;
}

/// Resolve the configured "provider/model" string to a proposer.
pub fn resolve(config: &ProviderConfig) -> Result<Arc<dyn Proposer>, ModelForgeError> {
    let (provider, model) = config
        .llm_provider
        .split_once('/')
        .unwrap_or(("openai", config.llm_provider.as_str()));

    match provider {
        "openai" => {
            let api_key = config
                .openai_api_key
                .clone()
                .ok_or(ModelForgeError::NoProposer)?;
            Ok(Arc::new(openai::OpenAiProposer::new(
                api_key,
                model.to_string(),
            )))
        }
        other => Err(ModelForgeError::Config(format!(
            "unknown LLM provider '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::IterationRecord;
    use std::time::Duration;

    #[test]
    fn test_context_for_fresh_job() {
        let job = JobRecord::new("classify emails", 5, Duration::from_secs(60));
        let ctx = ProposeContext::for_job(&job);
        assert_eq!(ctx.intent, "classify emails");
        assert_eq!(ctx.iteration, 0);
        assert!(ctx.best_score.is_none());
        assert!(ctx.feedback.is_empty());
    }

    #[test]
    fn test_context_carries_history_feedback() {
        let mut job = JobRecord::new("classify emails", 5, Duration::from_secs(60));
        job.history.push(IterationRecord {
            iteration: 0,
            outcome: IterationOutcome::Improved { score: 0.61 },
            attempts: 1,
            recorded_at: chrono::Utc::now(),
        });
        job.history.push(IterationRecord {
            iteration: 1,
            outcome: IterationOutcome::Abandoned {
                error: "rate limited".into(),
            },
            attempts: 4,
            recorded_at: chrono::Utc::now(),
        });
        job.iteration_count = 2;

        let ctx = ProposeContext::for_job(&job);
        assert_eq!(ctx.feedback.len(), 2);
        assert!(ctx.feedback[0].contains("improved"));
        assert!(ctx.feedback[1].contains("abandoned"));
    }

    #[test]
    fn test_resolve_requires_api_key() {
        let config = ProviderConfig {
            llm_provider: "openai/gpt-4o-mini".into(),
            openai_api_key: None,
        };
        assert!(matches!(
            resolve(&config).err(),
            Some(ModelForgeError::NoProposer)
        ));
    }

    #[test]
    fn test_resolve_openai() {
        let config = ProviderConfig {
            llm_provider: "openai/gpt-4o-mini".into(),
            openai_api_key: Some("sk-test".into()),
        };
        let proposer = resolve(&config).unwrap();
        assert_eq!(proposer.id(), "openai");
    }

    #[test]
    fn test_resolve_unknown_provider() {
        let config = ProviderConfig {
            llm_provider: "acme/frontier-1".into(),
            openai_api_key: Some("sk-test".into()),
        };
        assert!(matches!(
            resolve(&config).err(),
            Some(ModelForgeError::Config(_))
        ));
    }
}
