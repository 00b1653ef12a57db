//! Core data models shared by the catalog, the augmentation pipeline, and
//! the provider adapters.

use serde::{Deserialize, Deserializer, Serialize};

/// A row of the `products` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub price: f64,
    pub description: String,
    pub stock: i64,
}

/// Speaker of a [`ChatMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

/// One turn of a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Content of the most recent user message, if it has any text.
pub fn last_user_utterance(messages: &[ChatMessage]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .filter(|c| !c.trim().is_empty())
}

pub const DEFAULT_FILTER_LIMIT: i64 = 20;

/// Structured catalog constraints derived from a free-text request.
///
/// The JSON shape is the one the interpreter prompt asks the model for:
/// `{"categoryKeywords": [...], "searchTerms": [...], "minPrice": n,
/// "maxPrice": n, "limit": n}`. Every field is optional and `null` counts as
/// absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub category_keywords: Vec<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub search_terms: Vec<String>,
    #[serde(default)]
    pub min_price: Option<f64>,
    #[serde(default)]
    pub max_price: Option<f64>,
    #[serde(default = "default_filter_limit", deserialize_with = "null_as_default_limit")]
    pub limit: i64,
}

impl Default for FilterSpec {
    fn default() -> Self {
        Self {
            category_keywords: Vec::new(),
            search_terms: Vec::new(),
            min_price: None,
            max_price: None,
            limit: DEFAULT_FILTER_LIMIT,
        }
    }
}

fn default_filter_limit() -> i64 {
    DEFAULT_FILTER_LIMIT
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_default_limit<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    // Models sometimes answer `"limit": 20.0`; accept any JSON number.
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value
        .filter(|v| v.is_finite())
        .map(|v| v as i64)
        .unwrap_or(DEFAULT_FILTER_LIMIT))
}

/// Normalized reply returned by either provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: ChatMessage,
    pub done: bool,
    pub model: String,
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<u64>,
}

/// An entry of the selectable model list.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub provider: &'static str,
    pub id: &'static str,
    pub label: &'static str,
}
