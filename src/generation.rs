//! Generation backend abstraction.
//!
//! Defines the [`TextGenerator`] trait and an OpenAI-compatible chat
//! completions client. The base URL is configurable so any compatible
//! provider (OpenAI, Groq, a local server) can be used.
//!
//! Failures are typed as [`GenerationError`] so the orchestrator can log
//! timeouts distinctly from provider errors; either way the chain
//! converts them to a user-facing apology, never a raw error.

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::config::GenerationConfig;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation request timed out after {0}s")]
    Timeout(u64),
    #[error("generation provider error: {0}")]
    Provider(String),
    #[error("generation is disabled; set [generation] provider in config")]
    Disabled,
}

/// Trait for text-completion backends.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete the prompt at the configured (low) temperature.
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Create the appropriate [`TextGenerator`] based on configuration.
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn TextGenerator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Box::new(DisabledGenerator)),
        "openai-chat" => Ok(Box::new(ChatCompletionGenerator::new(config)?)),
        other => anyhow::bail!("Unknown generation provider: {}", other),
    }
}

/// A no-op generator that always fails. Used when generation is not
/// configured (retrieval-only usage still works).
pub struct DisabledGenerator;

#[async_trait]
impl TextGenerator for DisabledGenerator {
    async fn complete(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::Disabled)
    }
}

/// Client for an OpenAI-compatible `POST {base_url}/chat/completions`
/// endpoint. Temperature is fixed from configuration (low by default,
/// for consistent factual answers). Retries server errors and rate
/// limits with exponential backoff; the request timeout converts to
/// [`GenerationError::Timeout`].
pub struct ChatCompletionGenerator {
    config: GenerationConfig,
    model: String,
    api_key: String,
    client: reqwest::Client,
}

impl ChatCompletionGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required"))?;

        let api_key = std::env::var("LLM_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .map_err(|_| anyhow::anyhow!("LLM_API_KEY or OPENAI_API_KEY must be set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            config: config.clone(),
            model,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl TextGenerator for ChatCompletionGenerator {
    async fn complete(&self, prompt: &str) -> Result<String, GenerationError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        });

        let mut last_err = GenerationError::Provider("no attempts made".to_string());

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(4));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response
                            .json()
                            .await
                            .map_err(|e| GenerationError::Provider(e.to_string()))?;
                        return extract_completion(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err =
                            GenerationError::Provider(format!("{}: {}", status, body_text));
                        continue;
                    }
                    // Client error — don't retry
                    return Err(GenerationError::Provider(format!(
                        "{}: {}",
                        status, body_text
                    )));
                }
                Err(e) if e.is_timeout() => {
                    last_err = GenerationError::Timeout(self.config.timeout_secs);
                    continue;
                }
                Err(e) => {
                    last_err = GenerationError::Provider(e.to_string());
                    continue;
                }
            }
        }

        Err(last_err)
    }
}

fn extract_completion(json: &serde_json::Value) -> Result<String, GenerationError> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| {
            GenerationError::Provider("invalid completion response: missing content".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_generator_errors() {
        let gen = DisabledGenerator;
        assert!(matches!(
            gen.complete("hello").await,
            Err(GenerationError::Disabled)
        ));
    }

    #[test]
    fn test_extract_completion() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "  Answer text.  "}}]
        });
        assert_eq!(extract_completion(&json).unwrap(), "Answer text.");
    }

    #[test]
    fn test_extract_completion_missing_content() {
        let json = serde_json::json!({"choices": []});
        assert!(extract_completion(&json).is_err());
    }
}
