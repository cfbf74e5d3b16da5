//! Configuration loading and validation for CoursePilot.
//!
//! Loads configuration from a TOML file with `COURSEPILOT_*` environment
//! variable overrides. Validates all settings at load time. The transport
//! layer owns where the file lives; this crate only parses and checks it.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// The root configuration structure.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite database path (`sqlite::memory:` for ephemeral).
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Provider API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Provider base URL (OpenAI-compatible).
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Chat completion model.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Embedding model.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Embedding vector dimension.
    #[serde(default = "default_embedding_dimension")]
    pub embedding_dimension: usize,

    /// Per-user-per-course daily token cap.
    #[serde(default = "default_max_tokens_per_day")]
    pub max_tokens_per_user_per_day: u32,

    /// Maximum output tokens per generation request.
    #[serde(default = "default_max_tokens_per_request")]
    pub max_tokens_per_request: u32,

    /// Sampling temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// How many passages retrieval returns by default.
    #[serde(default = "default_retrieval_top_k")]
    pub retrieval_top_k: usize,

    /// Deadline for a single generation call, in seconds.
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,

    /// Course used when a request names none.
    #[serde(default = "default_course_id")]
    pub default_course_id: String,
}

fn default_database_path() -> String {
    "coursepilot.db".into()
}
fn default_api_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_chat_model() -> String {
    "gpt-4-turbo-preview".into()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".into()
}
fn default_embedding_dimension() -> usize {
    1536
}
fn default_max_tokens_per_day() -> u32 {
    50_000
}
fn default_max_tokens_per_request() -> u32 {
    4_000
}
fn default_temperature() -> f32 {
    0.7
}
fn default_retrieval_top_k() -> usize {
    5
}
fn default_generation_timeout_secs() -> u64 {
    120
}
fn default_course_id() -> String {
    "default-course-id".into()
}

impl Default for AppConfig {
    fn default() -> Self {
        // Field defaults match the serde default functions.
        toml::from_str("").expect("empty config must deserialize")
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_path", &self.database_path)
            .field("api_key", &redact(&self.api_key))
            .field("api_base_url", &self.api_base_url)
            .field("chat_model", &self.chat_model)
            .field("embedding_model", &self.embedding_model)
            .field("embedding_dimension", &self.embedding_dimension)
            .field(
                "max_tokens_per_user_per_day",
                &self.max_tokens_per_user_per_day,
            )
            .field("max_tokens_per_request", &self.max_tokens_per_request)
            .field("temperature", &self.temperature)
            .field("retrieval_top_k", &self.retrieval_top_k)
            .field("generation_timeout_secs", &self.generation_timeout_secs)
            .field("default_course_id", &self.default_course_id)
            .finish()
    }
}

impl AppConfig {
    /// Load from a TOML file, then apply environment overrides and
    /// validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&raw)?;
        config.apply_env_overrides();
        config.validate()?;
        debug!(?config, "Configuration loaded");
        Ok(config)
    }

    /// Defaults plus environment overrides, no file.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("COURSEPILOT_DATABASE_PATH") {
            self.database_path = v;
        }
        if let Ok(v) = std::env::var("COURSEPILOT_API_KEY") {
            self.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("COURSEPILOT_API_BASE_URL") {
            self.api_base_url = v;
        }
        if let Ok(v) = std::env::var("COURSEPILOT_CHAT_MODEL") {
            self.chat_model = v;
        }
        if let Ok(v) = std::env::var("COURSEPILOT_EMBEDDING_MODEL") {
            self.embedding_model = v;
        }
        if let Ok(v) = std::env::var("COURSEPILOT_MAX_TOKENS_PER_DAY")
            && let Ok(n) = v.parse()
        {
            self.max_tokens_per_user_per_day = n;
        }
        if let Ok(v) = std::env::var("COURSEPILOT_GENERATION_TIMEOUT_SECS")
            && let Ok(n) = v.parse()
        {
            self.generation_timeout_secs = n;
        }
    }

    /// Validate settings that would otherwise fail deep inside a turn.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database_path.is_empty() {
            return Err(ConfigError::Invalid("database_path must not be empty".into()));
        }
        if self.embedding_dimension == 0 {
            return Err(ConfigError::Invalid(
                "embedding_dimension must be positive".into(),
            ));
        }
        if self.max_tokens_per_user_per_day == 0 {
            return Err(ConfigError::Invalid(
                "max_tokens_per_user_per_day must be positive".into(),
            ));
        }
        if self.retrieval_top_k == 0 {
            return Err(ConfigError::Invalid("retrieval_top_k must be positive".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(
                "temperature must be within [0.0, 2.0]".into(),
            ));
        }
        if self.generation_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "generation_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.retrieval_top_k, 5);
        assert_eq!(config.embedding_dimension, 1536);
        assert_eq!(config.max_tokens_per_user_per_day, 50_000);
        assert_eq!(config.max_tokens_per_request, 4_000);
        assert_eq!(config.generation_timeout_secs, 120);
    }

    #[test]
    fn loads_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "chat_model = \"gpt-4o\"\nretrieval_top_k = 3").unwrap();
        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.chat_model, "gpt-4o");
        assert_eq!(config.retrieval_top_k, 3);
        // Untouched fields keep their defaults
        assert_eq!(config.embedding_model, "text-embedding-3-small");
    }

    #[test]
    fn rejects_zero_budget() {
        let mut config = AppConfig::default();
        config.max_tokens_per_user_per_day = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        let mut config = AppConfig::default();
        config.temperature = 3.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn debug_redacts_api_key() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk-secret".into());
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
