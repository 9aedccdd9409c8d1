// src/core/evaluator.rs — Candidate scoring

use crate::core::types::Candidate;
use crate::infra::errors::ModelForgeError;

/// Scores candidates. Implementations must be deterministic and free of side
/// effects so that replaying an iteration yields the same score.
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, candidate: &Candidate) -> Result<f64, ModelForgeError>;
}

/// Default evaluator: trusts the validation metric reported with the
/// candidate, clamped to [0, 1]. A candidate with no source is malformed and
/// fails the step fatally.
#[derive(Debug, Default)]
pub struct MetricEvaluator;

impl Evaluator for MetricEvaluator {
    fn evaluate(&self, candidate: &Candidate) -> Result<f64, ModelForgeError> {
        if candidate.source.trim().is_empty() {
            return Err(ModelForgeError::Provider {
                provider: "evaluator".into(),
                message: format!("candidate {} has no model source", candidate.id),
                retriable: false,
            });
        }
        Ok(candidate.validation_score.unwrap_or(0.0).clamp(0.0, 1.0))
    }
}
