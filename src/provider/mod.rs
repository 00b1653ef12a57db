//! LLM provider abstraction and routing.
//!
//! Defines the [`ChatProvider`] trait and its two implementations:
//! - **[`OllamaProvider`]**: a local Ollama server's `/api/chat` endpoint.
//! - **[`GeminiProvider`]**: the Gemini `generateContent` API.
//!
//! # Routing
//!
//! [`ProviderRouter`] sends a conversation to Gemini when the caller asks for
//! provider `"gemini"` or names a model starting with `gemini`
//! (case-insensitive); everything else goes to Ollama. Both replies are
//! normalized into a [`ChatResponse`].
//!
//! Messages with empty content are dropped before either provider sees them.
//! No call is ever retried.

pub mod gemini;
pub mod ollama;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;

use crate::config::Config;
use crate::error::ChatError;
use crate::models::{ChatMessage, ChatResponse, ModelInfo};

/// A chat backend.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider label reported in responses (`"ollama"`, `"gemini"`).
    fn name(&self) -> &'static str;

    async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<ChatResponse, ChatError>;
}

/// Which backend a request goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Local,
    Cloud,
}

pub fn select_backend(model: &str, provider: Option<&str>) -> Backend {
    let wants_gemini = provider.is_some_and(|p| p.eq_ignore_ascii_case("gemini"));
    if wants_gemini || model.to_lowercase().starts_with("gemini") {
        Backend::Cloud
    } else {
        Backend::Local
    }
}

pub struct ProviderRouter {
    local: Arc<dyn ChatProvider>,
    cloud: Arc<dyn ChatProvider>,
    default_model: String,
}

impl ProviderRouter {
    pub fn new(
        local: Arc<dyn ChatProvider>,
        cloud: Arc<dyn ChatProvider>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            local,
            cloud,
            default_model: default_model.into(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self, ChatError> {
        Ok(Self::new(
            Arc::new(OllamaProvider::new(&config.ollama)?),
            Arc::new(GeminiProvider::new(config)?),
            config.ollama.default_model.clone(),
        ))
    }

    /// Sends `messages` to the backend chosen by `model` and `provider`.
    ///
    /// `model` defaults to the configured local model when absent or blank.
    pub async fn dispatch(
        &self,
        model: Option<&str>,
        messages: &[ChatMessage],
        provider: Option<&str>,
    ) -> Result<ChatResponse, ChatError> {
        let model = model
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(&self.default_model);

        let backend = match select_backend(model, provider) {
            Backend::Local => &self.local,
            Backend::Cloud => &self.cloud,
        };

        let outgoing: Vec<ChatMessage> = messages
            .iter()
            .filter(|m| !m.content.is_empty())
            .cloned()
            .collect();

        info!(
            provider = backend.name(),
            model,
            messages = outgoing.len(),
            "dispatching chat"
        );
        backend.chat(model, &outgoing).await
    }
}

const MODELS: [ModelInfo; 4] = [
    ModelInfo {
        provider: "ollama",
        id: "llama3.2",
        label: "Llama 3.2 (Ollama - Local)",
    },
    ModelInfo {
        provider: "gemini",
        id: "gemini-2.5-flash",
        label: "Gemini 2.5 Flash (Fastest)",
    },
    ModelInfo {
        provider: "gemini",
        id: "gemini-2.5-pro",
        label: "Gemini 2.5 Pro (Most Capable)",
    },
    ModelInfo {
        provider: "gemini",
        id: "gemini-2.0-flash",
        label: "Gemini 2.0 Flash",
    },
];

/// Models offered to clients for selection.
pub fn available_models() -> Vec<ModelInfo> {
    MODELS.to_vec()
}
