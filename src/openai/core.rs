use std::time::Duration;

use anyhow::{Error, Result, anyhow};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::chat::backend::FragmentStream;
use crate::chat::models::{Role, Turn};

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: &str) -> Self {
        Message {
            role,
            content: content.to_string(),
        }
    }
}

impl From<&Turn> for Message {
    fn from(turn: &Turn) -> Self {
        Message::new(turn.role, &turn.content)
    }
}

/// Everything needed to reach an OpenAI compatible chat completions
/// endpoint.
#[derive(Clone, Debug)]
pub struct CompletionOptions {
    pub api_hostname: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl CompletionOptions {
    fn url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.api_hostname.trim_end_matches("/")
        )
    }

    fn payload(&self, messages: &[Message], stream: bool) -> Value {
        json!({
            "model": self.model,
            "messages": messages,
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": stream,
        })
    }
}

pub async fn completion(messages: &[Message], options: &CompletionOptions) -> Result<Value, Error> {
    let response = reqwest::Client::new()
        .post(options.url())
        .bearer_auth(&options.api_key)
        .header("Content-Type", "application/json")
        .timeout(options.timeout)
        .json(&options.payload(messages, false))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(response)
}

/// Text content of the first choice of a non-streaming completion.
pub fn completion_content(response: &Value) -> Result<String, Error> {
    response["choices"][0]["message"]["content"]
        .as_str()
        .map(String::from)
        .ok_or(anyhow!("Completion is missing content: {}", response))
}

// Some providers (e.g. OpenRouter) stream reasoning tokens before the
// content. Those are never shown to the user. A delta with neither
// (role only, or the last chunk) is `Empty`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Delta {
    Content { content: String },

    Reasoning { reasoning: String },

    Empty {},
}

#[derive(Debug, Deserialize)]
struct CompletionChunkChoice {
    delta: Delta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[allow(dead_code)]
    id: Option<String>,
    #[allow(dead_code)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<CompletionChunkChoice>,
}

/// Request a streaming completion and return the content deltas as
/// they arrive. Returns once the response headers are in so a refused
/// request fails before any fragment is produced.
pub async fn completion_stream(
    messages: &[Message],
    options: &CompletionOptions,
) -> Result<FragmentStream, Error> {
    let response = reqwest::Client::new()
        .post(options.url())
        .bearer_auth(&options.api_key)
        .header("Content-Type", "application/json")
        .timeout(options.timeout)
        .json(&options.payload(messages, true))
        .send()
        .await?
        .error_for_status()?;

    let mut stream = response.bytes_stream();

    let fragments: FragmentStream = Box::pin(async_stream::try_stream! {
        // Raw bytes: a frame boundary can split a multi-byte character
        let mut buffer: Vec<u8> = Vec::new();
        let mut reasoning_chars = 0;
        let mut finished = false;

        'outer: while let Some(chunk) = stream.next().await {
            let chunk = chunk?;

            // Append new data to buffer. This is necessary to handle SSE
            // fragmentation over HTTP/2 frames.
            buffer.extend_from_slice(&chunk);

            // Process all complete SSE events from the buffer
            while let Some(event_end) = buffer.windows(2).position(|w| w == b"\n\n") {
                let event: Vec<u8> = buffer.drain(..event_end + 2).collect();
                let event_data = std::str::from_utf8(&event[..event_end])?;

                let event_data = event_data.trim();
                if !event_data.starts_with("data: ") {
                    continue;
                }

                let data = event_data[6..].trim();

                // Data can sometimes be empty
                if data.is_empty() {
                    continue;
                }

                if data == "[DONE]" {
                    finished = true;
                    break 'outer;
                }

                let chunk = serde_json::from_str::<CompletionChunk>(data).inspect_err(|e| {
                    tracing::error!("Parsing completion chunk failed for {}\nError:{}", data, e)
                })?;

                // Usage-only chunks have no choices
                let Some(choice) = chunk.choices.first() else {
                    continue;
                };

                match &choice.delta {
                    Delta::Content { content } => {
                        if !content.is_empty() {
                            yield content.clone();
                        }
                    }
                    Delta::Reasoning { reasoning } => {
                        reasoning_chars += reasoning.chars().count();
                    }
                    Delta::Empty {} => {}
                }

                if choice.finish_reason.is_some() {
                    finished = true;
                    break 'outer;
                }
            }
        }

        if reasoning_chars > 0 {
            tracing::debug!("Skipped {} chars of reasoning", reasoning_chars);
        }

        // A body that stops before either terminator was cut off. The
        // sentinel may be missing its trailing blank line.
        let trailing = String::from_utf8_lossy(&buffer);
        if !finished && trailing.trim() != "data: [DONE]" {
            Err::<(), Error>(anyhow!("Completion stream ended before it finished"))?;
        }
    });

    Ok(fragments)
}
