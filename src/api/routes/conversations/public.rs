//! Public types for the conversation API
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::StoredMessage;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Conversation {
    pub id: String,
    pub persona_id: String,
    pub summary: Option<String>,
    // Appended to the persona's system prompt for this conversation only
    pub session_prompt: Option<String>,
    pub last_message_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
pub struct CreateConversationRequest {
    pub persona_id: String,
    pub session_prompt: Option<String>,
}

#[derive(Deserialize)]
pub struct ConversationsQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
    pub persona_id: Option<String>,
}

#[derive(Serialize)]
pub struct ConversationsResponse {
    pub conversations: Vec<Conversation>,
    pub total: i64,
    pub page: usize,
    pub limit: usize,
}

#[derive(Deserialize)]
pub struct MessagesQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<StoredMessage>,
    pub total: i64,
    pub page: usize,
    pub limit: usize,
}

#[derive(Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Deserialize, Default)]
pub struct SummaryRequest {
    pub max_length: Option<usize>,
}

#[derive(Serialize, Deserialize)]
pub struct SummaryResponse {
    pub summary: String,
}

#[derive(Deserialize)]
pub struct UpdateSummaryRequest {
    pub summary: String,
}

#[derive(Serialize)]
pub struct MessageResponse {
    message: String,
}

impl MessageResponse {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.into(),
        }
    }
}
