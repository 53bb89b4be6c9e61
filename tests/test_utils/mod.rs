//! Test utilities for integration tests
#![allow(dead_code)]
use std::sync::{Arc, RwLock};

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use axum::{Router, body::Body};
use futures::stream;

use persona_chat::api::AppState;
use persona_chat::api::app;
use persona_chat::chat::{BackendAdapter, BoxedBackend, ContextSource, FragmentStream, Turn};
use persona_chat::core::db::initialize_db;
use persona_chat::core::{AppConfig, LlmProvider};

/// A backend that replies with a fixed list of fragments. An `Err`
/// entry fails the generation at that point.
pub struct ScriptedBackend {
    pub available: bool,
    pub fragments: Vec<Result<&'static str, &'static str>>,
    pub summary: Result<&'static str, &'static str>,
}

impl ScriptedBackend {
    pub fn replying(fragments: Vec<Result<&'static str, &'static str>>) -> Self {
        Self {
            available: true,
            fragments,
            summary: Ok("A pirate says hello"),
        }
    }
}

#[async_trait]
impl BackendAdapter for ScriptedBackend {
    fn is_available(&self) -> bool {
        self.available
    }

    async fn generate(&self, _context: &[Turn]) -> Result<FragmentStream, Error> {
        let items: Vec<Result<String, Error>> = self
            .fragments
            .iter()
            .map(|f| f.map(String::from).map_err(|e| anyhow!(e)))
            .collect();
        Ok(Box::pin(stream::iter(items)))
    }

    async fn summarize(&self, _history: &[Turn], _max_len: usize) -> Result<String, Error> {
        self.summary.map(String::from).map_err(|e| anyhow!(e))
    }
}

fn test_config() -> AppConfig {
    AppConfig {
        storage_path: String::from("./"),
        db_path: String::from(":memory:"),
        llm_provider: LlmProvider::OpenAi,
        openai_api_hostname: String::from("http://localhost:1"),
        openai_api_key: Some(String::from("test-api-key")),
        openai_model: String::from("gpt-3.5-turbo"),
        temperature: 0.7,
        max_tokens: 1000,
        request_timeout_secs: 5,
        max_context_chars: 4000,
        transcript_capacity: 16,
        context_source: ContextSource::History,
    }
}

/// Creates a test application router backed by an in-memory db and
/// the given backend.
pub async fn test_app(backend: ScriptedBackend) -> Router {
    let db = tokio_rusqlite::Connection::open_in_memory()
        .await
        .expect("Failed to connect to async db");
    db.call(|conn| {
        conn.pragma_update(None, "foreign_keys", true)?;
        initialize_db(conn)?;
        Ok(())
    })
    .await
    .expect("Failed to migrate db");

    let backend: BoxedBackend = Arc::new(backend);
    let app_state = AppState::new(db, test_config(), backend);
    app(Arc::new(RwLock::new(app_state)))
}

pub async fn body_to_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .expect("Failed to read body");
    String::from_utf8(bytes.to_vec()).expect("Body is not utf-8")
}

/// The `data:` payloads of an SSE body in order.
pub fn sse_data(body: &str) -> Vec<String> {
    body.split("\n\n")
        .filter_map(|event| {
            event
                .lines()
                .find_map(|line| line.strip_prefix("data: ").or(line.strip_prefix("data:")))
        })
        .map(String::from)
        .collect()
}
