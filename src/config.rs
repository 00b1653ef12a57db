//! TOML configuration parsing.
//!
//! Configuration is read once at startup into an immutable [`Config`] that is
//! shared (behind an `Arc`) by every component. Every section has defaults, so
//! an empty file is a valid configuration for a local setup.
//!
//! Two environment variables override the file when loading through
//! [`load_config`] or [`load_config_or_default`]:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `DATABASE_URL` | `[db].url` |
//! | `GEMINI_API_KEY` (see `[gemini].api_key_env`) | `[gemini].api_key` |

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Where the CLI looks for its configuration when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "./config/catalog-chat.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub db: DbConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub interpreter: InterpreterConfig,
    #[serde(default)]
    pub augment: AugmentConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    #[serde(default = "default_db_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    #[serde(default = "default_max_lifetime_secs")]
    pub max_lifetime_secs: u64,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: default_db_url(),
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            max_lifetime_secs: default_max_lifetime_secs(),
        }
    }
}

fn default_db_url() -> String {
    "sqlite:./data/catalog.sqlite".to_string()
}
fn default_max_connections() -> u32 {
    5
}
fn default_acquire_timeout_secs() -> u64 {
    3
}
fn default_max_lifetime_secs() -> u64 {
    1800
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct OllamaConfig {
    #[serde(default = "default_ollama_url")]
    pub url: String,
    #[serde(default = "default_ollama_model")]
    pub default_model: String,
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            url: default_ollama_url(),
            default_model: default_ollama_model(),
            timeout_secs: default_provider_timeout_secs(),
        }
    }
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}
fn default_ollama_model() -> String {
    "llama3.2".to_string()
}
fn default_provider_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeminiConfig {
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,
    #[serde(default = "default_gemini_model")]
    pub default_model: String,
    #[serde(default = "default_provider_timeout_secs")]
    pub timeout_secs: u64,
    /// How system messages are sent: `"user"` folds them into user turns,
    /// `"instruction"` sends them as `systemInstruction`.
    #[serde(default = "default_system_role")]
    pub system_role: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Resolved API key. Normally filled from the environment by [`load_config`].
    #[serde(default)]
    pub api_key: Option<String>,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            base_url: default_gemini_base_url(),
            default_model: default_gemini_model(),
            timeout_secs: default_provider_timeout_secs(),
            system_role: default_system_role(),
            api_key_env: default_api_key_env(),
            api_key: None,
        }
    }
}

impl GeminiConfig {
    /// The API key, if one is configured and non-empty.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.is_empty())
    }
}

fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1".to_string()
}
fn default_gemini_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_system_role() -> String {
    "user".to_string()
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct InterpreterConfig {
    #[serde(default = "default_gemini_model")]
    pub model: String,
    #[serde(default = "default_interpreter_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            model: default_gemini_model(),
            timeout_secs: default_interpreter_timeout_secs(),
        }
    }
}

fn default_interpreter_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct AugmentConfig {
    #[serde(default = "default_limit")]
    pub default_limit: i64,
    #[serde(default = "default_max_limit")]
    pub max_limit: i64,
    #[serde(default = "default_augment_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for AugmentConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            max_limit: default_max_limit(),
            timeout_secs: default_augment_timeout_secs(),
        }
    }
}

fn default_limit() -> i64 {
    20
}
fn default_max_limit() -> i64 {
    100
}
fn default_augment_timeout_secs() -> u64 {
    30
}

/// Reads, overrides from the environment, and validates the configuration.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config =
        toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    finish(config)
}

/// Like [`load_config`], but a missing file means built-in defaults (still
/// subject to the environment overrides).
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        return load_config(path);
    }
    info!(path = %path.display(), "config file not found, using defaults");
    finish(Config::default())
}

fn finish(mut config: Config) -> Result<Config> {
    if let Ok(url) = std::env::var("DATABASE_URL") {
        if !url.is_empty() {
            config.db.url = url;
        }
    }
    if let Ok(key) = std::env::var(&config.gemini.api_key_env) {
        config.gemini.api_key = Some(key);
    }

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.db.max_connections == 0 {
        anyhow::bail!("db.max_connections must be >= 1");
    }

    if config.augment.default_limit < 1 {
        anyhow::bail!("augment.default_limit must be >= 1");
    }
    if config.augment.max_limit < config.augment.default_limit {
        anyhow::bail!("augment.max_limit must be >= augment.default_limit");
    }

    match config.gemini.system_role.as_str() {
        "user" | "instruction" => {}
        other => anyhow::bail!(
            "Unknown gemini.system_role: '{}'. Must be user or instruction.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("absent.toml");

        let config = load_config_or_default(&path).unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8000");
        assert_eq!(config.augment.max_limit, 100);

        // An explicit path that does not exist is still an error.
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn existing_file_is_read_by_fallback_loader() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("catalog-chat.toml");
        std::fs::write(&path, "[server]\nbind = \"0.0.0.0:9000\"\n").unwrap();

        let config = load_config_or_default(&path).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:9000");
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.db.max_connections, 5);
        assert_eq!(config.ollama.default_model, "llama3.2");
        assert_eq!(config.gemini.default_model, "gemini-2.5-flash");
        assert_eq!(config.interpreter.timeout_secs, 10);
        assert_eq!(config.augment.default_limit, 20);
        assert!(config.gemini.api_key().is_none());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config: Config = toml::from_str(
            r#"
[ollama]
url = "http://10.0.0.2:11434"
"#,
        )
        .unwrap();
        assert_eq!(config.ollama.url, "http://10.0.0.2:11434");
        assert_eq!(config.ollama.timeout_secs, 60);
    }

    #[test]
    fn empty_api_key_counts_as_missing() {
        let config: Config = toml::from_str(
            r#"
[gemini]
api_key = ""
"#,
        )
        .unwrap();
        assert!(config.gemini.api_key().is_none());
    }

    #[test]
    fn rejects_unknown_system_role() {
        let config: Config = toml::from_str(
            r#"
[gemini]
system_role = "developer"
"#,
        )
        .unwrap();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("system_role"));
    }

    #[test]
    fn rejects_max_limit_below_default() {
        let config: Config = toml::from_str(
            r#"
[augment]
default_limit = 20
max_limit = 5
"#,
        )
        .unwrap();
        assert!(validate(&config).is_err());
    }
}
