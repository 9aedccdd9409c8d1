// src/provider/openai.rs — OpenAI-backed proposer

use async_trait::async_trait;

use super::{ProposeContext, Proposer};
use crate::core::types::Candidate;
use crate::infra::errors::ModelForgeError;

const SYSTEM_PROMPT: &str = "You are an expert ML engineer. Respond with a JSON object \
containing `source` (a complete Python training and inference script for the requested \
model) and `validation_score` (estimated validation quality in [0, 1]). Respond with \
JSON only.";

pub struct OpenAiProposer {
    api_key: String,
    model: String,
    client: reqwest::Client,
    base_url: String,
}

impl OpenAiProposer {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            api_key,
            model,
            client: reqwest::Client::new(),
            base_url: "https://api.openai.com/v1".into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn user_prompt(ctx: &ProposeContext) -> String {
        let mut prompt = format!(
            "Build a machine learning model for this intent:\n{}\n\nIteration {} of the build.",
            ctx.intent,
            ctx.iteration + 1
        );
        if let Some(best) = ctx.best_score {
            prompt.push_str(&format!(
                "\nBest score so far: {best:.3}. Propose something strictly better."
            ));
        }
        if !ctx.feedback.is_empty() {
            prompt.push_str("\nPrevious iterations:\n");
            for line in &ctx.feedback {
                prompt.push_str(line);
                prompt.push('\n');
            }
        }
        prompt
    }
}

#[async_trait]
impl Proposer for OpenAiProposer {
    fn id(&self) -> &str {
        "openai"
    }

    async fn propose(&self, ctx: &ProposeContext) -> Result<Candidate, ModelForgeError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": Self::user_prompt(ctx)},
            ],
            "response_format": {"type": "json_object"},
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelForgeError::Provider {
                provider: "openai".into(),
                message: e.to_string(),
                retriable: e.is_timeout() || e.is_connect(),
            })?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(5_000);
            return Err(ModelForgeError::RateLimited {
                provider: "openai".into(),
                retry_after_ms,
            });
        }

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ModelForgeError::Provider {
                provider: "openai".into(),
                message: format!("HTTP {status}: {error_body}"),
                retriable: status.is_server_error(),
            });
        }

        let resp: serde_json::Value =
            response.json().await.map_err(|e| ModelForgeError::Provider {
                provider: "openai".into(),
                message: format!("Failed to parse response: {e}"),
                retriable: false,
            })?;

        let content = resp["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("");

        // The model is instructed to answer with a JSON candidate payload;
        // anything else is a malformed candidate, not a transient failure.
        let payload: serde_json::Value =
            serde_json::from_str(content).map_err(|e| ModelForgeError::Provider {
                provider: "openai".into(),
                message: format!("Malformed candidate payload: {e}"),
                retriable: false,
            })?;

        Ok(Candidate {
            id: uuid::Uuid::new_v4().to_string(),
            iteration: ctx.iteration,
            source: payload["source"].as_str().unwrap_or("").to_string(),
            validation_score: payload["validation_score"].as_f64(),
        })
    }
}
