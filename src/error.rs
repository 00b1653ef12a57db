//! Typed errors for provider calls and query interpretation.

use thiserror::Error;

/// Failures of a call to an LLM provider.
#[derive(Debug, Error)]
pub enum ChatError {
    /// A credential or setting required for this request is missing.
    #[error("configuration error: {0}")]
    Config(String),

    /// The provider answered with a non-success status.
    #[error("{provider} API error {status}: {body}")]
    Upstream {
        provider: &'static str,
        status: u16,
        body: String,
    },

    /// The requested model name cannot be used as an upstream path segment.
    #[error("invalid model name: {0:?}")]
    InvalidModel(String),

    /// The request never got a response (connect error, timeout, ...).
    #[error("Request failed: {0}")]
    Transport(String),

    /// The provider answered 2xx but the body could not be decoded.
    #[error("invalid response from {provider}: {message}")]
    InvalidResponse {
        provider: &'static str,
        message: String,
    },
}

impl ChatError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport(format!("timed out: {}", err))
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Why the interpreter fell back to the default filter. Never leaves the
/// interpreter; it only decides what gets logged.
#[derive(Debug, Error)]
pub enum InterpretError {
    #[error("no API key configured for query interpretation")]
    MissingCredential,

    #[error("interpretation call failed: {0}")]
    Completion(#[from] ChatError),

    #[error("interpretation call timed out after {0}s")]
    Timeout(u64),

    #[error("malformed code fence: {0}")]
    Fence(&'static str),

    #[error("response is not a valid filter object: {0}")]
    Json(#[from] serde_json::Error),
}
