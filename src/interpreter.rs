//! Natural-language to [`FilterSpec`] translation.
//!
//! The interpreter asks an auxiliary LLM to read the user's latest message
//! and answer with a small JSON object describing which products are
//! relevant. It never fails from the caller's point of view: a missing
//! credential, a failed or slow call, a malformed code fence, or invalid
//! JSON all produce [`FilterSpec::default`] (`{limit: 20}`), and the reason is
//! logged.
//!
//! ```text
//! utterance ──▶ prompt ──▶ CompletionClient ──▶ strip fence ──▶ serde_json ──▶ FilterSpec
//!                              │ error / timeout        │ fence error   │ json error
//!                              └────────────────────────┴───────────────┴──▶ default
//! ```

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ChatError, InterpretError};
use crate::models::FilterSpec;
use crate::provider::gemini::GeminiProvider;

const FENCE: &str = "```";

/// Description of the `products` table given to the model.
pub const SCHEMA_DESCRIPTION: &str = "\
Table `products`:
- id (integer, primary key)
- name (text), e.g. \"Gaming Graphics Card X3\"
- category (text), one of Electronics, Accessories, Components, Peripherals, \
Networking, Storage, Audio, Video, Tools
- price (decimal, US dollars)
- description (text)
- stock (integer, units available)";

/// Sends a single prompt to an LLM and returns its text answer.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, ChatError>;
}

pub struct QueryInterpreter {
    client: Option<Arc<dyn CompletionClient>>,
    timeout: Duration,
}

impl QueryInterpreter {
    /// `client` is `None` when no credential is configured; every
    /// interpretation then falls back to the default filter.
    pub fn new(client: Option<Arc<dyn CompletionClient>>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Interpreter backed by Gemini, using `[interpreter]` model and timeout.
    pub fn from_config(config: &Config) -> Result<Self, ChatError> {
        let client: Option<Arc<dyn CompletionClient>> = if config.gemini.api_key().is_some() {
            let gemini = GeminiProvider::for_interpreter(config)?;
            Some(Arc::new(gemini))
        } else {
            None
        };
        Ok(Self::new(
            client,
            Duration::from_secs(config.interpreter.timeout_secs),
        ))
    }

    /// Turns the utterance into a filter, or the default filter on any failure.
    ///
    /// A missing or blank utterance returns the default without a network call.
    pub async fn interpret(&self, utterance: Option<&str>) -> FilterSpec {
        let Some(utterance) = utterance.filter(|u| !u.trim().is_empty()) else {
            return FilterSpec::default();
        };

        match self.try_interpret(utterance).await {
            Ok(spec) => {
                debug!(?spec, "interpreted catalog filter");
                spec
            }
            Err(InterpretError::MissingCredential) => {
                debug!("no interpreter credential, using default filter");
                FilterSpec::default()
            }
            Err(e) => {
                warn!(error = %e, "query interpretation failed, using default filter");
                FilterSpec::default()
            }
        }
    }

    async fn try_interpret(&self, utterance: &str) -> Result<FilterSpec, InterpretError> {
        let client = self
            .client
            .as_ref()
            .ok_or(InterpretError::MissingCredential)?;

        let prompt = build_prompt(utterance);
        let raw = tokio::time::timeout(self.timeout, client.complete(&prompt))
            .await
            .map_err(|_| InterpretError::Timeout(self.timeout.as_secs()))??;

        debug!(response = %raw, "interpreter raw response");
        parse_filter_response(&raw)
    }
}

/// Builds the instruction prompt for `utterance`. Deterministic.
pub fn build_prompt(utterance: &str) -> String {
    format!(
        r#"You translate shopping questions into database filters.

Database schema:
{schema}

Answer with ONE JSON object and nothing else. Allowed fields (all optional):
- "categoryKeywords": array of strings matched against product category or name
- "searchTerms": array of strings matched against product name or description
- "minPrice": number, inclusive lower price bound
- "maxPrice": number, inclusive upper price bound
- "limit": positive integer, number of products to return (default 20)

Examples:
Question: "show me all items"
Answer: {{"limit": 50}}

Question: "graphics cards under $200"
Answer: {{"categoryKeywords": ["graphics card", "gpu"], "maxPrice": 200, "limit": 20}}

Question: "wireless headphones between 50 and 150 dollars"
Answer: {{"categoryKeywords": ["headphones"], "searchTerms": ["wireless"], "minPrice": 50, "maxPrice": 150, "limit": 20}}

Question: "anything for networking?"
Answer: {{"categoryKeywords": ["networking", "router"], "limit": 20}}

Question: {utterance:?}
Answer:"#,
        schema = SCHEMA_DESCRIPTION,
        utterance = utterance,
    )
}

/// Parses a model answer into a filter, unwrapping an optional code fence.
pub fn parse_filter_response(raw: &str) -> Result<FilterSpec, InterpretError> {
    let body = strip_fence(raw)?;
    Ok(serde_json::from_str(body)?)
}

/// Returns the interior of a fenced block (```` ```json ```` or bare
/// ```` ``` ````), or the trimmed text when it is not fenced.
pub fn strip_fence(raw: &str) -> Result<&str, InterpretError> {
    let trimmed = raw.trim();
    let Some(after_open) = trimmed.strip_prefix(FENCE) else {
        return Ok(trimmed);
    };

    // Optional language tag right after the opening fence.
    let body = after_open.trim_start_matches(|c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    let close = body
        .find(FENCE)
        .ok_or(InterpretError::Fence("missing closing fence"))?;
    let inner = body[..close].trim();
    if inner.is_empty() {
        return Err(InterpretError::Fence("empty fenced block"));
    }
    Ok(inner)
}
