//! The language-model boundary: send chat messages, get raw text back.
//!
//! [`ChatModel`] is the only seam the pipeline depends on. Two
//! implementations ship here:
//!
//! * [`HttpChatModel`]: talks to any OpenAI-compatible `/chat/completions`
//!   endpoint (NVIDIA NIM by default) and maps status codes exactly:
//!   401 → invalid credentials, 429 → upstream rate limit, other non-2xx →
//!   status + body.
//! * [`ProviderChatModel`]: adapts any `edgequake_llm` provider, for
//!   deployments that already configure one of its backends.
//!
//! Credentials are resolved per call, so a missing key surfaces as a
//! configuration error on the first request rather than at startup.

use crate::config::ModelConfig;
use crate::error::{ModelError, ReviewError};
use async_trait::async_trait;
use edgequake_llm::{CompletionOptions, LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One turn of a conversation. Order matters: system instructions first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// Sampling parameters for one call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: usize,
}

impl From<&ModelConfig> for ChatOptions {
    fn from(config: &ModelConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// Anything that can complete a chat.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Return the raw text content of the first choice.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<String, ModelError>;
}

/// OpenAI-compatible HTTP client.
#[derive(Debug, Clone)]
pub struct HttpChatModel {
    client: reqwest::Client,
    config: ModelConfig,
}

impl HttpChatModel {
    /// Build a client whose requests are aborted after `config.timeout`.
    pub fn new(config: ModelConfig) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ModelError::Transport(e.to_string()))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }
}

#[async_trait]
impl ChatModel for HttpChatModel {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<String, ModelError> {
        let (api_key, base_url, model) = self.config.resolve().map_err(|e| match e {
            ReviewError::Configuration(msg) => ModelError::NotConfigured(msg),
            other => ModelError::NotConfigured(other.to_string()),
        })?;

        let url = format!("{base_url}/chat/completions");
        debug!(
            "Model request: url={} model={} messages={}",
            url,
            model,
            messages.len()
        );

        let body = json!({
            "model": model,
            "messages": messages,
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(e, self.config.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 => ModelError::InvalidCredentials,
                429 => ModelError::RateLimited,
                code => ModelError::Status {
                    status: code,
                    body: if text.is_empty() {
                        status.canonical_reason().unwrap_or_default().to_string()
                    } else {
                        text
                    },
                },
            });
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| transport_error(e, self.config.timeout))?;

        json["choices"][0]["message"]["content"]
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or(ModelError::EmptyResponse)
    }
}

fn transport_error(e: reqwest::Error, timeout: Duration) -> ModelError {
    if e.is_timeout() {
        ModelError::Timeout {
            secs: timeout.as_secs(),
        }
    } else {
        ModelError::Transport(e.to_string())
    }
}

/// [`ChatModel`] backed by an `edgequake_llm` provider.
pub struct ProviderChatModel {
    provider: Arc<dyn LLMProvider>,
    timeout: Duration,
}

impl ProviderChatModel {
    pub fn new(provider: Arc<dyn LLMProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Instantiate a named provider (`"openai"`, `"anthropic"`, …) for `model`.
    /// The provider reads its own API key variable from the environment.
    pub fn from_name(provider: &str, model: &str, timeout: Duration) -> Result<Self, ModelError> {
        let provider = ProviderFactory::create_llm_provider(provider, model)
            .map_err(|e| ModelError::NotConfigured(format!("{provider}: {e}")))?;
        Ok(Self::new(provider, timeout))
    }
}

#[async_trait]
impl ChatModel for ProviderChatModel {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<String, ModelError> {
        let mut converted = Vec::with_capacity(messages.len());
        for m in messages {
            converted.push(match m.role {
                ChatRole::System => edgequake_llm::ChatMessage::system(m.content.as_str()),
                ChatRole::User => edgequake_llm::ChatMessage::user(m.content.as_str()),
                ChatRole::Assistant => {
                    return Err(ModelError::Transport(
                        "assistant turns are not supported by the provider adapter".into(),
                    ))
                }
            });
        }

        let completion = CompletionOptions {
            temperature: Some(options.temperature),
            max_tokens: Some(options.max_tokens),
            ..Default::default()
        };

        let response = tokio::time::timeout(
            self.timeout,
            self.provider.chat(&converted, Some(&completion)),
        )
        .await
        .map_err(|_| ModelError::Timeout {
            secs: self.timeout.as_secs(),
        })?
        .map_err(|e| ModelError::Transport(e.to_string()))?;

        if response.content.is_empty() {
            return Err(ModelError::EmptyResponse);
        }
        Ok(response.content)
    }
}
