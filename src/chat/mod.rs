//! The conversation engine: turn orchestration, context construction,
//! language detection and the in-memory transcript store.
pub mod backend;
pub mod context;
pub mod coordinator;
pub mod db;
pub mod events;
pub mod language;
pub mod memory;
pub mod models;
pub mod prompt;

pub use backend::{BackendAdapter, BoxedBackend, FragmentStream};
pub use coordinator::{
    APOLOGY, ContextSource, CoordinatorBuilder, ResponseStreamCoordinator, SUMMARY_PLACEHOLDER,
    TurnFailure, TurnOutcome, TurnState,
};
pub use db::Persistence;
pub use events::StreamEvent;
pub use memory::ConversationMemoryStore;
pub use models::{PersonaPrompt, Role, StoredMessage, Turn};
