//! Public types for the persona API
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chat::PersonaPrompt;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Persona {
    pub id: String,
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    pub greeting: String,
    pub created_at: DateTime<Utc>,
}

impl Persona {
    /// The parts of the persona the conversation engine needs.
    pub fn prompt(&self) -> PersonaPrompt {
        PersonaPrompt::new(&self.system_prompt, &self.greeting)
    }
}

#[derive(Deserialize)]
pub struct CreatePersonaRequest {
    pub name: String,
    pub description: Option<String>,
    pub system_prompt: String,
    pub greeting: String,
}

#[derive(Deserialize)]
pub struct UpdatePersonaRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub system_prompt: Option<String>,
    pub greeting: Option<String>,
}

impl UpdatePersonaRequest {
    /// Apply the fields that were given to `persona`.
    pub fn apply(self, persona: &mut Persona) {
        if let Some(name) = self.name {
            persona.name = name;
        }
        if let Some(description) = self.description {
            persona.description = description;
        }
        if let Some(system_prompt) = self.system_prompt {
            persona.system_prompt = system_prompt;
        }
        if let Some(greeting) = self.greeting {
            persona.greeting = greeting;
        }
    }
}

#[derive(Deserialize)]
pub struct PersonasQuery {
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Serialize)]
pub struct PersonasResponse {
    pub personas: Vec<Persona>,
    pub total: i64,
    pub page: usize,
    pub limit: usize,
}
