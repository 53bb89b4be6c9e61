use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;

use super::core::{
    CompletionOptions, Message, completion, completion_content, completion_stream,
};
use crate::chat::backend::{BackendAdapter, FragmentStream};
use crate::chat::models::{Role, Turn};
use crate::chat::prompt;
use crate::core::AppConfig;

const SUMMARY_TEMPERATURE: f32 = 0.3;
const SUMMARY_MAX_TOKENS: u32 = 50;

/// `BackendAdapter` for any OpenAI compatible chat completions API
/// (OpenAI, OpenRouter, local servers).
pub struct OpenAiBackend {
    api_hostname: String,
    // Unavailable when no key is configured
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
}

impl OpenAiBackend {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            api_hostname: config.openai_api_hostname.clone(),
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }

    fn options(&self, temperature: f32, max_tokens: u32) -> Result<CompletionOptions, Error> {
        let api_key = self
            .api_key
            .clone()
            .ok_or(anyhow!("No API key configured for {}", self.api_hostname))?;
        Ok(CompletionOptions {
            api_hostname: self.api_hostname.clone(),
            api_key,
            model: self.model.clone(),
            temperature,
            max_tokens,
            timeout: self.timeout,
        })
    }
}

#[async_trait]
impl BackendAdapter for OpenAiBackend {
    fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    async fn generate(&self, context: &[Turn]) -> Result<FragmentStream, Error> {
        let options = self.options(self.temperature, self.max_tokens)?;
        let messages: Vec<Message> = context.iter().map(Message::from).collect();
        tracing::debug!(
            "Requesting completion from {} with {} messages",
            options.model,
            messages.len()
        );
        completion_stream(&messages, &options).await
    }

    async fn summarize(&self, history: &[Turn], max_len: usize) -> Result<String, Error> {
        let options = self.options(SUMMARY_TEMPERATURE, SUMMARY_MAX_TOKENS)?;
        let (system, transcript) = prompt::summary_messages(history, max_len)?;
        let messages = vec![
            Message::new(Role::System, &system),
            Message::new(Role::User, &transcript),
        ];
        let response = completion(&messages, &options).await?;
        completion_content(&response)
    }
}
