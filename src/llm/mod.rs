//! Language-model service seam.
//!
//! [`LlmService`] is what the harness asks for summaries and answers.
//! [`RuleBasedLlmService`] is the only implementation: it validates its
//! configuration like a real provider client would, then answers from a
//! fixed rule table without any network access.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info};

pub mod config;

pub use config::LlmConfig;

use crate::config::ConfigLoader;

/// Errors raised by an [`LlmService`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LlmError {
    /// No API key is configured.
    #[error("LLM API key is not configured")]
    MissingApiKey,
    /// The prompt was empty or whitespace.
    #[error("prompt must not be empty")]
    EmptyPrompt,
}

/// Text generation backend.
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Generate a reply to `prompt`.
    ///
    /// # Errors
    ///
    /// [`LlmError::EmptyPrompt`] for a blank prompt.
    async fn generate_text(&self, prompt: &str) -> Result<String, LlmError>;

    /// Whether the service is configured well enough to answer.
    fn is_available(&self) -> bool;
}

const GREETING_REPLY: &str = "Hello! How can I help you today?";
const WEATHER_REPLY: &str = "I'm sorry, I don't have access to real-time weather information.";
const DEFAULT_REPLY: &str = "Thank you for your question. This is a mock response from the LLM service.";

/// Offline [`LlmService`] that answers from keyword rules.
#[derive(Debug, Clone)]
pub struct RuleBasedLlmService {
    config: LlmConfig,
}

impl RuleBasedLlmService {
    /// Build the service from `config`.
    ///
    /// # Errors
    ///
    /// [`LlmError::MissingApiKey`] when the key is blank.
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        if !config.has_api_key() {
            return Err(LlmError::MissingApiKey);
        }
        info!(
            model = %config.model_name,
            timeout_secs = config.timeout_secs,
            "LLM service initialized"
        );
        Ok(Self { config })
    }

    /// Build the service from the `llm.*` keys of `loader`.
    ///
    /// # Errors
    ///
    /// [`LlmError::MissingApiKey`] when `llm.api.key` is blank.
    pub fn from_loader(loader: &ConfigLoader) -> Result<Self, LlmError> {
        Self::new(LlmConfig::from_loader(loader))
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &LlmConfig {
        &self.config
    }
}

#[async_trait]
impl LlmService for RuleBasedLlmService {
    async fn generate_text(&self, prompt: &str) -> Result<String, LlmError> {
        if prompt.trim().is_empty() {
            return Err(LlmError::EmptyPrompt);
        }
        debug!(prompt_len = prompt.len(), "Generating text");

        let reply = rule_reply(prompt);
        debug!(reply_len = reply.len(), "Text generated");
        Ok(reply.to_string())
    }

    fn is_available(&self) -> bool {
        let available = self.config.has_api_key();
        if !available {
            info!("LLM API key not configured");
        }
        available
    }
}

fn rule_reply(prompt: &str) -> &'static str {
    let prompt = prompt.to_lowercase();
    if prompt.contains("hello") {
        GREETING_REPLY
    } else if prompt.contains("weather") {
        WEATHER_REPLY
    } else {
        DEFAULT_REPLY
    }
}
