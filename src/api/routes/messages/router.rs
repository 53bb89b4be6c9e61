//! Router for individual messages

use std::sync::{Arc, RwLock};

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::delete,
};

use super::db;
use crate::api::public::ApiError;
use crate::api::routes::conversations::public::MessageResponse;
use crate::api::state::AppState;

type SharedState = Arc<RwLock<AppState>>;

/// Delete a message from its conversation
async fn delete_message(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (db, memory) = {
        let shared_state = state.read().expect("Unable to read share state");
        (shared_state.db.clone(), Arc::clone(&shared_state.memory))
    };

    let Some(conversation_id) = db::delete_message(&db, &id).await? else {
        return Ok((StatusCode::NOT_FOUND, format!("Message {} not found", id)).into_response());
    };
    // The cached transcript still has the message
    memory.forget(&conversation_id);

    Ok(axum::Json(MessageResponse::new("Message deleted")).into_response())
}

pub fn router() -> Router<SharedState> {
    Router::new().route("/{id}", delete(delete_message))
}
