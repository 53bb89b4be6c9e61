//! Router for the health check

use std::sync::{Arc, RwLock};

use axum::{Json, Router, routing::get};
use serde_json::{Value, json};

use crate::api::state::AppState;

type SharedState = Arc<RwLock<AppState>>;

async fn health() -> Json<Value> {
    Json(json!({"status": "healthy"}))
}

pub fn router() -> Router<SharedState> {
    Router::new().route("/", get(health))
}
