// src/infra/errors.rs — Error types for modelforge

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelForgeError {
    // Provider errors (retriable when flagged)
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    // Persistence errors
    #[error("Job '{id}' not found")]
    NotFound { id: String },

    #[error("Version conflict writing job '{id}': expected {expected}, found {found}")]
    Conflict {
        id: String,
        expected: u64,
        found: u64,
    },

    #[error("Lease on job '{id}' is held by another worker")]
    LeaseConflict { id: String },

    // Queue errors
    #[error("Queue error: {0}")]
    Queue(String),

    // User errors
    #[error("No proposer configured. Set OPENAI_API_KEY or LLM_PROVIDER.")]
    NoProposer,

    // Infra
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ModelForgeError {
    /// Transient errors are eligible for retry; everything else is fatal to
    /// the current step.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ModelForgeError::Provider {
                retriable: true,
                ..
            } | ModelForgeError::RateLimited { .. }
        )
    }
}
