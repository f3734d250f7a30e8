//! LLM service configuration.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ConfigLoader;

/// Key for the provider API key.
pub const API_KEY_KEY: &str = "llm.api.key";
/// Key for the model name.
pub const MODEL_NAME_KEY: &str = "llm.model.name";
/// Key for the provider base URL.
pub const BASE_URL_KEY: &str = "llm.base.url";
/// Key for the request timeout in seconds.
pub const TIMEOUT_SECONDS_KEY: &str = "llm.timeout.seconds";
/// Key for the sampling temperature.
pub const TEMPERATURE_KEY: &str = "llm.temperature";
/// Key for the completion token limit.
pub const MAX_TOKENS_KEY: &str = "llm.max.tokens";

/// Default model name.
pub const DEFAULT_MODEL_NAME: &str = "gpt-3.5-turbo";
/// Default provider base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
/// Default completion token limit.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Settings for an [`LlmService`](super::LlmService).
///
/// The API key is never serialized and is redacted from `Debug` output.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider API key. Blank means not configured.
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Model identifier.
    pub model_name: String,
    /// Provider base URL.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Sampling temperature.
    pub temperature: f64,
    /// Completion token limit.
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model_name: DEFAULT_MODEL_NAME.into(),
            base_url: DEFAULT_BASE_URL.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

impl LlmConfig {
    /// Read every `llm.*` key from `loader`, falling back to the defaults.
    #[must_use]
    pub fn from_loader(loader: &ConfigLoader) -> Self {
        Self {
            api_key: loader.get_string(API_KEY_KEY, ""),
            model_name: loader.get_string(MODEL_NAME_KEY, DEFAULT_MODEL_NAME),
            base_url: loader.get_string(BASE_URL_KEY, DEFAULT_BASE_URL),
            timeout_secs: u64::try_from(loader.get_int(
                TIMEOUT_SECONDS_KEY,
                i64::try_from(DEFAULT_TIMEOUT_SECS).unwrap_or(i64::MAX),
            ))
            .unwrap_or(DEFAULT_TIMEOUT_SECS),
            temperature: loader.get_f64(TEMPERATURE_KEY, DEFAULT_TEMPERATURE),
            max_tokens: u32::try_from(loader.get_int(MAX_TOKENS_KEY, i64::from(DEFAULT_MAX_TOKENS)))
                .unwrap_or(DEFAULT_MAX_TOKENS),
        }
    }

    /// Set the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Set the model name.
    #[must_use]
    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    /// Whether an API key is configured.
    #[must_use]
    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// Request timeout as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &if self.has_api_key() { "<redacted>" } else { "" })
            .field("model_name", &self.model_name)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_loader() {
        let cfg = LlmConfig::from_loader(&ConfigLoader::default());
        assert_eq!(cfg.api_key, "");
        assert_eq!(cfg.model_name, "gpt-3.5-turbo");
        assert_eq!(cfg.base_url, "https://api.openai.com/v1");
        assert_eq!(cfg.timeout(), Duration::from_secs(30));
        assert!((cfg.temperature - 0.7).abs() < f64::EPSILON);
        assert_eq!(cfg.max_tokens, 1000);
        assert!(!cfg.has_api_key());
    }

    #[test]
    fn test_from_loader_reads_overrides() {
        let loader = ConfigLoader::from_pairs([
            ("llm.api.key", "sk-test"),
            ("llm.model.name", "local-model"),
            ("llm.timeout.seconds", "5"),
            ("llm.temperature", "0.2"),
            ("llm.max.tokens", "-1"),
        ]);
        let cfg = LlmConfig::from_loader(&loader);
        assert!(cfg.has_api_key());
        assert_eq!(cfg.model_name, "local-model");
        assert_eq!(cfg.timeout_secs, 5);
        assert!((cfg.temperature - 0.2).abs() < f64::EPSILON);
        assert_eq!(cfg.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_debug_redacts_key() {
        let cfg = LlmConfig::default().with_api_key("sk-secret");
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn test_key_is_not_serialized() {
        let cfg = LlmConfig::default().with_api_key("sk-secret");
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(!json.contains("sk-secret"));
    }
}
