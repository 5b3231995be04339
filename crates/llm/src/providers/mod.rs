pub mod openai;

use docaudit_core::config::LlmConfig;

use crate::provider::{LlmError, LlmProvider};

/// Build the chat-completions provider described by the config.
pub fn create_provider(config: &LlmConfig) -> Result<Box<dyn LlmProvider>, LlmError> {
    if config.url.trim().is_empty() {
        return Err(LlmError::NotConfigured("LLM_URL is empty".into()));
    }
    if config.model.trim().is_empty() {
        return Err(LlmError::NotConfigured("LLM_MODEL is empty".into()));
    }
    Ok(Box::new(openai::OpenAiCompatProvider::new(
        config.url.clone(),
        config.api_key.clone(),
        config.model.clone(),
        config.timeout_secs,
    )))
}
