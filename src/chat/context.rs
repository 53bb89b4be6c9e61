//! Builds the bounded context window sent to the backend for a single
//! generation.
use super::models::{PersonaPrompt, Turn};

/// Default context budget in characters.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 4000;

/// Compose the system turn from the persona prompt and the optional
/// per-conversation override.
pub fn system_turn(persona: &PersonaPrompt, session_override: Option<&str>) -> Turn {
    let mut content = persona.system_prompt.clone();
    if let Some(session_prompt) = session_override.filter(|s| !s.is_empty()) {
        content.push_str("\n\n");
        content.push_str(session_prompt);
    }
    Turn::system(&content)
}

/// Build the context window for the next generation.
///
/// Walks `history` from newest to oldest and keeps messages until the
/// next one would push the running character count over `max_chars`.
/// The walk stops at the first message that doesn't fit, even if older
/// and smaller messages would. The system turn is always included and
/// counts against the budget. An empty history is seeded with the
/// persona's greeting instead.
pub fn build(
    persona: &PersonaPrompt,
    session_override: Option<&str>,
    history: &[Turn],
    max_chars: usize,
) -> Vec<Turn> {
    let system = system_turn(persona, session_override);

    if history.is_empty() {
        return vec![system, Turn::assistant(&persona.greeting)];
    }

    let mut total = system.char_len();
    let mut start = history.len();
    for (idx, turn) in history.iter().enumerate().rev() {
        let len = turn.char_len();
        if total + len > max_chars {
            break;
        }
        total += len;
        start = idx;
    }

    let mut context = Vec::with_capacity(history.len() - start + 1);
    context.push(system);
    context.extend_from_slice(&history[start..]);
    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::models::Role;

    fn persona() -> PersonaPrompt {
        PersonaPrompt::new("You are a pirate.", "Ahoy!")
    }

    fn total_chars(context: &[Turn]) -> usize {
        context.iter().map(Turn::char_len).sum()
    }

    #[test]
    fn test_system_turn_with_override() {
        let turn = system_turn(&persona(), Some("Speak softly."));
        assert_eq!(turn.role, Role::System);
        assert_eq!(turn.content, "You are a pirate.\n\nSpeak softly.");

        let turn = system_turn(&persona(), None);
        assert_eq!(turn.content, "You are a pirate.");
    }

    #[test]
    fn test_empty_history_seeds_greeting() {
        let context = build(&persona(), None, &[], 4000);
        assert_eq!(context.len(), 2);
        assert_eq!(context[0].role, Role::System);
        assert_eq!(context[1].role, Role::Assistant);
        assert_eq!(context[1].content, "Ahoy!");
    }

    #[test]
    fn test_small_history_is_included_in_order() {
        let history = vec![
            Turn::user("m1"),
            Turn::assistant("m2"),
            Turn::user("m3"),
        ];
        let context = build(&persona(), None, &history, 4000);

        assert_eq!(context.len(), 4);
        let contents: Vec<&str> = context[1..].iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["m1", "m2", "m3"]);
        assert!(!context.iter().any(|t| t.content == "Ahoy!"));
    }

    #[test]
    fn test_stops_at_first_overflow() {
        // System turn is 17 characters, leaving 13 in a budget of 30
        let history = vec![
            Turn::user("tiny"),
            Turn::assistant("tiny"),
            Turn::user("this newest message is too long"),
        ];
        let context = build(&persona(), None, &history, 30);

        assert_eq!(context.len(), 1);
        assert_eq!(context[0].role, Role::System);
    }

    #[test]
    fn test_keeps_newest_messages_that_fit() {
        let history = vec![
            Turn::user("an older message that will not fit"),
            Turn::assistant("12345"),
            Turn::user("67890"),
        ];
        let context = build(&persona(), None, &history, 27);

        let contents: Vec<&str> = context[1..].iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["12345", "67890"]);
        assert_eq!(total_chars(&context), 27);
    }

    #[test]
    fn test_never_exceeds_budget() {
        let history: Vec<Turn> = (0..50)
            .map(|i| Turn::user(&"x".repeat(i * 7 % 23 + 1)))
            .collect();
        let system_len = system_turn(&persona(), Some("override")).char_len();

        for max_chars in system_len..system_len + 200 {
            let context = build(&persona(), Some("override"), &history, max_chars);
            assert!(total_chars(&context) <= max_chars);
        }
    }

    #[test]
    fn test_oversized_system_turn_is_kept_whole() {
        let history = vec![Turn::user("hi")];
        let context = build(&persona(), Some("a long override"), &history, 5);

        assert_eq!(context.len(), 1);
        assert_eq!(context[0].content, "You are a pirate.\n\na long override");
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        // 17 + 10 = 27 characters, but well over 27 bytes
        let history = vec![Turn::user("你好你好你好你好你好")];
        let context = build(&persona(), None, &history, 27);
        assert_eq!(context.len(), 2);
    }
}
