//! API routes module

pub mod conversations;
mod health;
pub mod messages;
pub mod personas;

use std::sync::{Arc, RwLock};

use crate::api::state::AppState;
use axum::Router;

type SharedState = Arc<RwLock<AppState>>;

/// Create the combined API router
pub fn router() -> Router<SharedState> {
    Router::new()
        // Liveness check
        .nest("/health", health::router())
        // Persona routes
        .nest("/personas", personas::router())
        // Conversation and message routes
        .nest("/conversations", conversations::router())
        // Single message routes
        .nest("/messages", messages::router())
}
