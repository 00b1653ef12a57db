use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use super::ChatProvider;
use crate::config::OllamaConfig;
use crate::error::ChatError;
use crate::models::{ChatMessage, ChatResponse, Role};

const PROVIDER: &str = "ollama";

/// Chat provider backed by a local Ollama instance.
///
/// Calls `POST {url}/api/chat` with streaming disabled. Requires Ollama to be
/// running with the requested model pulled (e.g. `ollama pull llama3.2`).
pub struct OllamaProvider {
    client: reqwest::Client,
    url: String,
}

impl OllamaProvider {
    pub fn new(config: &OllamaConfig) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChatError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: format!("{}/api/chat", config.url.trim_end_matches('/')),
        })
    }
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: Option<bool>,
    #[serde(default)]
    total_duration: Option<u64>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

impl OllamaChatResponse {
    fn normalize(self, requested_model: &str) -> ChatResponse {
        let message = match self.message {
            Some(m) => {
                let role = match m.role.as_deref() {
                    Some("user") => Role::User,
                    Some("system") => Role::System,
                    _ => Role::Assistant,
                };
                ChatMessage::new(role, m.content.unwrap_or_default())
            }
            None => ChatMessage::assistant(""),
        };

        ChatResponse {
            message,
            done: self.done.unwrap_or(true),
            model: self.model.unwrap_or_else(|| requested_model.to_string()),
            provider: PROVIDER.to_string(),
            total_duration: self.total_duration,
        }
    }
}

#[async_trait]
impl ChatProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<ChatResponse, ChatError> {
        let body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": false,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(ChatError::transport)?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body_text, "Ollama API error");
            return Err(ChatError::Upstream {
                provider: PROVIDER,
                status: status.as_u16(),
                body: body_text,
            });
        }

        let parsed: OllamaChatResponse =
            response
                .json()
                .await
                .map_err(|e| ChatError::InvalidResponse {
                    provider: PROVIDER,
                    message: e.to_string(),
                })?;

        Ok(parsed.normalize(model))
    }
}
