//! Gemini `generateContent` adapter.
//!
//! Conversation mapping: `assistant` turns become role `model`, everything
//! else becomes role `user`. System messages are folded into user turns by
//! default (`[gemini].system_role = "user"`), which loses the distinction
//! between instructions and user text; with `system_role = "instruction"`
//! they are joined into a single `systemInstruction` instead.
//!
//! The API key is sent in the `x-goog-api-key` header and never logged.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use super::ChatProvider;
use crate::config::Config;
use crate::error::ChatError;
use crate::interpreter::CompletionClient;
use crate::models::{ChatMessage, ChatResponse, Role};

const PROVIDER: &str = "gemini";
const MODEL_PATH_PREFIX: &str = "models/";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemRole {
    /// Legacy mapping: system text is sent as a user turn.
    User,
    /// System text is sent as `systemInstruction`.
    Instruction,
}

impl SystemRole {
    fn from_config(value: &str) -> Self {
        match value {
            "instruction" => SystemRole::Instruction,
            _ => SystemRole::User,
        }
    }
}

pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    default_model: String,
    /// Model used when acting as a [`CompletionClient`].
    completion_model: String,
    system_role: SystemRole,
}

impl GeminiProvider {
    /// Chat adapter using the `[gemini]` settings.
    pub fn new(config: &Config) -> Result<Self, ChatError> {
        Self::build(config, config.gemini.timeout_secs, &config.gemini.default_model)
    }

    /// Completion client for query interpretation, using the `[interpreter]`
    /// model and its shorter timeout.
    pub fn for_interpreter(config: &Config) -> Result<Self, ChatError> {
        Self::build(config, config.interpreter.timeout_secs, &config.interpreter.model)
    }

    fn build(config: &Config, timeout_secs: u64, completion_model: &str) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| ChatError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.gemini.base_url.trim_end_matches('/').to_string(),
            api_key: config.gemini.api_key().map(str::to_string),
            default_model: strip_model_prefix(&config.gemini.default_model).to_string(),
            completion_model: strip_model_prefix(completion_model).to_string(),
            system_role: SystemRole::from_config(&config.gemini.system_role),
        })
    }

    fn api_key(&self) -> Result<&str, ChatError> {
        self.api_key.as_deref().ok_or_else(|| {
            ChatError::config("GEMINI_API_KEY is not set; Gemini requests need an API key")
        })
    }

    /// Calls `generateContent` and returns the first candidate's first text part.
    async fn generate(&self, model: &str, request: &GenerateRequest<'_>) -> Result<String, ChatError> {
        let api_key = self.api_key()?;
        let model = checked_model(model)?;
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(request)
            .send()
            .await
            .map_err(ChatError::transport)?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), %url, body = %body_text, "Gemini API error");
            return Err(ChatError::Upstream {
                provider: PROVIDER,
                status: status.as_u16(),
                body: body_text,
            });
        }

        let parsed: GenerateResponse =
            response
                .json()
                .await
                .map_err(|e| ChatError::InvalidResponse {
                    provider: PROVIDER,
                    message: e.to_string(),
                })?;

        Ok(parsed.first_text())
    }

    /// Lists upstream models that support `generateContent`.
    pub async fn list_models(&self) -> Result<Vec<RemoteModel>, ChatError> {
        let api_key = self.api_key()?;
        let url = format!("{}/models", self.base_url);

        let response = self
            .client
            .get(&url)
            .header("x-goog-api-key", api_key)
            .send()
            .await
            .map_err(ChatError::transport)?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(ChatError::Upstream {
                provider: PROVIDER,
                status: status.as_u16(),
                body: body_text,
            });
        }

        let listing: ModelListing =
            response
                .json()
                .await
                .map_err(|e| ChatError::InvalidResponse {
                    provider: PROVIDER,
                    message: e.to_string(),
                })?;

        Ok(listing
            .models
            .into_iter()
            .filter(|m| {
                m.supported_generation_methods
                    .iter()
                    .any(|method| method == "generateContent")
            })
            .map(|m| RemoteModel {
                name: m.name,
                display_name: m.display_name,
            })
            .collect())
    }

    /// The upstream model name for a requested model.
    ///
    /// A leading `models/` is stripped; anything that is then empty or does
    /// not start with a lowercase `gemini` falls back to the configured
    /// default.
    pub fn resolve_model<'a>(&'a self, requested: &'a str) -> &'a str {
        let stripped = strip_model_prefix(requested.trim());
        if stripped.is_empty() || !stripped.starts_with("gemini") {
            &self.default_model
        } else {
            stripped
        }
    }
}

fn strip_model_prefix(model: &str) -> &str {
    model.strip_prefix(MODEL_PATH_PREFIX).unwrap_or(model)
}

/// Model names become a URL path segment; anything that could leave it is
/// rejected before the request is built.
fn checked_model(model: &str) -> Result<&str, ChatError> {
    if model.contains(['/', '?', '#', '%', '\\']) || model.contains("..") {
        return Err(ChatError::InvalidModel(model.to_string()));
    }
    Ok(model)
}

#[async_trait]
impl ChatProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        PROVIDER
    }

    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<ChatResponse, ChatError> {
        // Fail on configuration before doing any work.
        self.api_key()?;

        let model = self.resolve_model(model);
        let request = GenerateRequest::from_messages(messages, self.system_role);
        let content = self.generate(model, &request).await?;

        Ok(ChatResponse {
            message: ChatMessage::assistant(content),
            done: true,
            model: model.to_string(),
            provider: PROVIDER.to_string(),
            total_duration: None,
        })
    }
}

#[async_trait]
impl CompletionClient for GeminiProvider {
    async fn complete(&self, prompt: &str) -> Result<String, ChatError> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
            system_instruction: None,
        };
        self.generate(&self.completion_model, &request).await
    }
}

// ============ Wire types ============

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<OwnedPart>,
}

#[derive(Debug, Serialize)]
struct OwnedPart {
    text: String,
}

impl<'a> GenerateRequest<'a> {
    fn from_messages(messages: &'a [ChatMessage], system_role: SystemRole) -> Self {
        let mut contents = Vec::with_capacity(messages.len());
        let mut system_texts: Vec<&str> = Vec::new();

        for m in messages.iter().filter(|m| !m.content.is_empty()) {
            let role = match (m.role, system_role) {
                (Role::Assistant, _) => "model",
                (Role::System, SystemRole::Instruction) => {
                    system_texts.push(m.content.as_str());
                    continue;
                }
                _ => "user",
            };
            contents.push(Content {
                role: Some(role),
                parts: vec![Part {
                    text: m.content.as_str(),
                }],
            });
        }

        let system_instruction = (!system_texts.is_empty()).then(|| SystemInstruction {
            parts: vec![OwnedPart {
                text: system_texts.join("\n\n"),
            }],
        });

        Self {
            contents,
            system_instruction,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateResponse {
    fn first_text(self) -> String {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .and_then(|p| p.text)
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct ModelListing {
    #[serde(default)]
    models: Vec<ListedModel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListedModel {
    #[serde(default)]
    name: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    supported_generation_methods: Vec<String>,
}

/// An upstream model as reported by `GET /models`.
#[derive(Debug, Clone, Serialize)]
pub struct RemoteModel {
    pub name: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
}
