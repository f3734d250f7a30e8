//! Integration tests for the rule-based LLM service

use browseruse::config::ConfigLoader;
use browseruse::llm::{LlmConfig, LlmError, LlmService, RuleBasedLlmService};

fn service() -> RuleBasedLlmService {
    RuleBasedLlmService::new(LlmConfig::default().with_api_key("sk-test")).unwrap()
}

#[test]
fn test_missing_key_is_rejected() {
    let err = RuleBasedLlmService::new(LlmConfig::default()).unwrap_err();
    assert_eq!(err, LlmError::MissingApiKey);
}

#[test]
fn test_from_loader() {
    let loader = ConfigLoader::from_pairs([("llm.api.key", "sk-file"), ("llm.model.name", "gpt-4o-mini")]);
    let service = RuleBasedLlmService::from_loader(&loader).unwrap();

    if std::env::var("LLM_MODEL_NAME").is_err() {
        assert_eq!(service.config().model_name, "gpt-4o-mini");
    }
    assert!(service.is_available());
}

#[tokio::test]
async fn test_greeting_reply() {
    let reply = service().generate_text("Hello there").await.unwrap();
    assert_eq!(reply, "Hello! How can I help you today?");
}

#[tokio::test]
async fn test_weather_reply_is_case_insensitive() {
    let reply = service().generate_text("What's the WEATHER like?").await.unwrap();
    assert_eq!(reply, "I'm sorry, I don't have access to real-time weather information.");
}

#[tokio::test]
async fn test_fallback_reply() {
    let reply = service().generate_text("Summarise this page").await.unwrap();
    assert_eq!(
        reply,
        "Thank you for your question. This is a mock response from the LLM service."
    );
}

#[tokio::test]
async fn test_blank_prompt_is_rejected() {
    assert_eq!(service().generate_text("").await, Err(LlmError::EmptyPrompt));
    assert_eq!(service().generate_text(" \n\t").await, Err(LlmError::EmptyPrompt));
}

#[tokio::test]
async fn test_usable_as_trait_object() {
    let service: Box<dyn LlmService> = Box::new(service());
    assert!(service.is_available());
    assert!(service.generate_text("hello").await.is_ok());
}
