//! Events streamed to the client while a reply is generated.
use serde::Serialize;

/// Payload of the terminal sentinel closing every stream.
pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageStart { message_id: String },
    Content { content: String },
    MessageEnd { message_id: String },
    Error { message: String },
    // Not JSON on the wire, see `data`
    #[serde(skip)]
    Done,
}

impl StreamEvent {
    /// The `data:` payload for this event.
    pub fn data(&self) -> String {
        match self {
            StreamEvent::Done => DONE_SENTINEL.to_string(),
            event => serde_json::to_string(event)
                .unwrap_or_else(|_| r#"{"type":"error","message":""}"#.to_string()),
        }
    }
}
