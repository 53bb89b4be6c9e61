use std::env;
use std::str::FromStr;

use crate::chat::ContextSource;

#[derive(Clone, Debug, PartialEq)]
pub enum LlmProvider {
    OpenAi,
    OpenRouter,
}

impl LlmProvider {
    fn default_hostname(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "https://api.openai.com",
            LlmProvider::OpenRouter => "https://openrouter.ai/api",
        }
    }

    fn api_key_var(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi => "OPENAI_API_KEY",
            LlmProvider::OpenRouter => "OPENROUTER_API_KEY",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAi),
            "openrouter" => Ok(LlmProvider::OpenRouter),
            other => Err(anyhow::anyhow!("Unknown LLM provider: {}", other)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub storage_path: String,
    pub db_path: String,
    pub llm_provider: LlmProvider,
    pub openai_api_hostname: String,
    // `None` means the backend is not configured and every turn takes
    // the apology path without calling out
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
    pub max_context_chars: usize,
    pub transcript_capacity: usize,
    pub context_source: ContextSource,
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(val) => val.parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid value for {}: {}", key, val);
            default
        }),
        Err(_) => default,
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        let storage_path = env::var("PERSONA_STORAGE_PATH").unwrap_or("./".to_string());
        let db_path = format!("{}/persona.db", storage_path.trim_end_matches('/'));
        let llm_provider = env_or("PERSONA_LLM_PROVIDER", LlmProvider::OpenAi);
        let openai_api_hostname = env::var("PERSONA_LLM_HOST")
            .unwrap_or_else(|_| llm_provider.default_hostname().to_string());
        let openai_api_key = env::var(llm_provider.api_key_var())
            .ok()
            .filter(|key| !key.trim().is_empty());
        let openai_model =
            env::var("PERSONA_LLM_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".to_string());

        Self {
            storage_path,
            db_path,
            llm_provider,
            openai_api_hostname,
            openai_api_key,
            openai_model,
            temperature: env_or("PERSONA_LLM_TEMPERATURE", 0.7),
            max_tokens: env_or("PERSONA_LLM_MAX_TOKENS", 1000),
            request_timeout_secs: env_or("PERSONA_LLM_TIMEOUT_SECS", 60 * 5),
            max_context_chars: env_or("PERSONA_MAX_CONTEXT_CHARS", 4000),
            transcript_capacity: env_or("PERSONA_TRANSCRIPT_CAPACITY", 1024),
            context_source: env_or("PERSONA_CONTEXT_SOURCE", ContextSource::History),
        }
    }
}
