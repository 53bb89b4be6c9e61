//! Client for OpenAI compatible chat completion APIs.
mod chat;
mod core;

pub use chat::OpenAiBackend;
pub use self::core::{CompletionOptions, Message, completion, completion_content, completion_stream};
