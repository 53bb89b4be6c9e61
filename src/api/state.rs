use std::sync::Arc;

use tokio_rusqlite::Connection;

use crate::chat::{BoxedBackend, ConversationMemoryStore};
use crate::core::AppConfig;

pub struct AppState {
    pub db: Connection,
    pub config: AppConfig,
    // Built once at startup and shared by every turn
    pub backend: BoxedBackend,
    pub memory: Arc<ConversationMemoryStore>,
}

impl AppState {
    pub fn new(db: Connection, config: AppConfig, backend: BoxedBackend) -> Self {
        let memory = Arc::new(ConversationMemoryStore::new(config.transcript_capacity));
        Self {
            db,
            config,
            backend,
            memory,
        }
    }
}
