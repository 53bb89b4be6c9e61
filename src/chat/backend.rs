//! The narrow contract between the conversation engine and an LLM
//! provider.
use std::pin::Pin;

use anyhow::{Error, Result};
use async_trait::async_trait;
use futures::Stream;

use super::models::Turn;

/// Fragments of generated text in the order the provider produced
/// them. An `Err` item ends the generation.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, Error>> + Send>>;

#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Whether the backend is configured (e.g. has credentials). When
    /// this is false no call is attempted.
    fn is_available(&self) -> bool;

    /// Start generating a reply for `context`. Dropping the returned
    /// stream abandons the generation.
    async fn generate(&self, context: &[Turn]) -> Result<FragmentStream, Error>;

    /// Summarize `history` in at most `max_len` characters.
    async fn summarize(&self, history: &[Turn], max_len: usize) -> Result<String, Error>;
}

pub type BoxedBackend = std::sync::Arc<dyn BackendAdapter>;
