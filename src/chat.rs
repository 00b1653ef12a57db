//! Chat orchestration: optional catalog augmentation, then provider dispatch.
//!
//! ```text
//! ChatRequest
//!   │ use_database && user utterance?
//!   ├── yes ─▶ QueryInterpreter ─▶ ContextBuilder ─▶ system messages (prepended)
//!   │            (bounded by augment.timeout_secs)
//!   ▼
//! ProviderRouter ─▶ Ollama | Gemini ─▶ ChatResponse
//! ```
//!
//! Augmentation never fails the request. Each stage degrades on its own, and
//! if the pipeline as a whole does not finish (deadline or task failure) a
//! single system message noting the failure is prepended instead.

use serde::Deserialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::context::ContextBuilder;
use crate::error::ChatError;
use crate::interpreter::QueryInterpreter;
use crate::models::{last_user_utterance, ChatMessage, ChatResponse};
use crate::provider::ProviderRouter;

/// Body of `POST /chat`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub model: Option<String>,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default = "default_use_database", alias = "useDatabase")]
    pub use_database: bool,
}

fn default_use_database() -> bool {
    true
}

pub struct ChatService {
    interpreter: Arc<QueryInterpreter>,
    context: Arc<ContextBuilder>,
    router: ProviderRouter,
    augment_timeout: Duration,
}

impl ChatService {
    pub fn new(
        interpreter: QueryInterpreter,
        context: ContextBuilder,
        router: ProviderRouter,
        augment_timeout: Duration,
    ) -> Self {
        Self {
            interpreter: Arc::new(interpreter),
            context: Arc::new(context),
            router,
            augment_timeout,
        }
    }

    pub fn from_config(config: &Config, pool: SqlitePool) -> Result<Self, ChatError> {
        Ok(Self::new(
            QueryInterpreter::from_config(config)?,
            ContextBuilder::new(pool, &config.augment),
            ProviderRouter::from_config(config)?,
            Duration::from_secs(config.augment.timeout_secs),
        ))
    }

    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ChatError> {
        let mut messages = request.messages;

        if request.use_database {
            if let Some(utterance) = last_user_utterance(&messages).map(str::to_string) {
                let mut augmented = self.augment(utterance).await;
                info!(context_messages = augmented.len(), "conversation augmented");
                augmented.append(&mut messages);
                messages = augmented;
            }
        }

        self.router
            .dispatch(
                request.model.as_deref(),
                &messages,
                request.provider.as_deref(),
            )
            .await
    }

    /// Interprets `utterance` and returns the catalog context messages.
    async fn augment(&self, utterance: String) -> Vec<ChatMessage> {
        let interpreter = self.interpreter.clone();
        let context = self.context.clone();

        let task = tokio::spawn(async move {
            let spec = interpreter.interpret(Some(&utterance)).await;
            context.build(&spec).await
        });
        let abort = task.abort_handle();

        match tokio::time::timeout(self.augment_timeout, task).await {
            Ok(Ok(messages)) => messages,
            Ok(Err(e)) => {
                warn!(error = %e, "augmentation task failed");
                vec![augmentation_failed(&e.to_string())]
            }
            Err(_) => {
                abort.abort();
                let reason = format!("timed out after {:?}", self.augment_timeout);
                warn!(%reason, "augmentation did not finish");
                vec![augmentation_failed(&reason)]
            }
        }
    }
}

fn augmentation_failed(reason: &str) -> ChatMessage {
    ChatMessage::system(format!(
        "Product database lookup failed ({}). Answer without catalog data.",
        reason
    ))
}
