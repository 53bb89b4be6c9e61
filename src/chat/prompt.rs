//! Reusable prompts using Handlebars for templating. Strict mode makes
//! a missing variable an error instead of silently rendering nothing.

use std::fmt;

use anyhow::{Error, Result};
use handlebars::Handlebars;
use serde_json::json;

use super::models::Turn;

#[derive(Debug)]
pub enum Prompt {
    ConversationSummary,
    SummaryTranscript,
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

const CONVERSATION_SUMMARY_PROMPT: &str =
    "请为以下对话生成一个简洁的摘要，不超过{{max_length}}个字符。只返回摘要内容，不要其他说明。";

// One "role: content" line per turn
const SUMMARY_TRANSCRIPT_PROMPT: &str =
    "{{#each turns}}{{#if @index}}\n{{/if}}{{role}}: {{content}}{{/each}}";

pub fn templates<'a>() -> Handlebars<'a> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    // Prompts are plain text, not HTML
    registry.register_escape_fn(handlebars::no_escape);
    registry
        .register_template_string(
            &Prompt::ConversationSummary.to_string(),
            CONVERSATION_SUMMARY_PROMPT,
        )
        .expect("Failed to register template");
    registry
        .register_template_string(
            &Prompt::SummaryTranscript.to_string(),
            SUMMARY_TRANSCRIPT_PROMPT,
        )
        .expect("Failed to register template");
    registry
}

/// Render the system and user messages for a summary request.
pub fn summary_messages(history: &[Turn], max_length: usize) -> Result<(String, String), Error> {
    let registry = templates();
    let system = registry.render(
        &Prompt::ConversationSummary.to_string(),
        &json!({ "max_length": max_length }),
    )?;
    let transcript = registry.render(
        &Prompt::SummaryTranscript.to_string(),
        &json!({ "turns": history }),
    )?;
    Ok((system, transcript))
}
