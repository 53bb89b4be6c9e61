mod config;
pub mod db;

pub use config::{AppConfig, LlmProvider};

/// Generate a short random identifier for personas, conversations and
/// messages: the first 16 hex characters of a v4 UUID.
pub fn generate_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(16);
    id
}
