//! Core models for a persona conversation.
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Role::System),
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(anyhow!("Unknown role: {}", other)),
        }
    }
}

/// A single turn in a conversation as it is sent to the backend.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(role: Role, content: &str) -> Self {
        Self {
            role,
            content: content.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn system(content: &str) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: &str) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: &str) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Length in characters, which is what the context budget counts.
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }
}

/// A turn as it is stored in the durable log.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct StoredMessage {
    pub id: String,
    pub conversation_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<StoredMessage> for Turn {
    fn from(msg: StoredMessage) -> Self {
        Turn {
            role: msg.role,
            content: msg.content,
            created_at: msg.created_at,
        }
    }
}

/// The fixed part of a persona that goes into every prompt.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct PersonaPrompt {
    pub system_prompt: String,
    pub greeting: String,
}

impl PersonaPrompt {
    pub fn new(system_prompt: &str, greeting: &str) -> Self {
        Self {
            system_prompt: system_prompt.to_string(),
            greeting: greeting.to_string(),
        }
    }
}
