//! Router for the persona API

use std::sync::{Arc, RwLock};

use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use axum_extra::extract::Query;

use super::{db, public};
use crate::api::public::{ApiError, Page};
use crate::api::routes::conversations::db::conversation_count_for_persona;
use crate::api::routes::conversations::public::MessageResponse;
use crate::api::state::AppState;

type SharedState = Arc<RwLock<AppState>>;

const DEFAULT_PAGE_SIZE: usize = 20;

fn not_found(id: &str) -> axum::response::Response {
    (StatusCode::NOT_FOUND, format!("Persona {} not found", id)).into_response()
}

/// List personas, newest first
async fn list_personas(
    State(state): State<SharedState>,
    Query(params): Query<public::PersonasQuery>,
) -> Result<axum::Json<public::PersonasResponse>, ApiError> {
    let db = state.read().expect("Unable to read share state").db.clone();
    let page = Page::new(params.page, params.limit, DEFAULT_PAGE_SIZE);
    let (personas, total) = db::persona_page(&db, page).await?;

    Ok(axum::Json(public::PersonasResponse {
        personas,
        total,
        page: page.page,
        limit: page.limit,
    }))
}

/// Create a persona
async fn create_persona(
    State(state): State<SharedState>,
    axum::Json(payload): axum::Json<public::CreatePersonaRequest>,
) -> Result<axum::Json<public::Persona>, ApiError> {
    let db = state.read().expect("Unable to read share state").db.clone();
    let persona = db::insert_persona(
        &db,
        &payload.name,
        payload.description.as_deref().unwrap_or_default(),
        &payload.system_prompt,
        &payload.greeting,
    )
    .await?;
    tracing::info!("Created persona {} ({})", persona.name, persona.id);
    Ok(axum::Json(persona))
}

/// Get a persona by ID
async fn get_persona(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.read().expect("Unable to read share state").db.clone();
    match db::find_persona_by_id(&db, &id).await? {
        Some(persona) => Ok(axum::Json(persona).into_response()),
        None => Ok(not_found(&id)),
    }
}

/// Update some or all of a persona's fields
async fn update_persona(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    axum::Json(payload): axum::Json<public::UpdatePersonaRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.read().expect("Unable to read share state").db.clone();
    let Some(mut persona) = db::find_persona_by_id(&db, &id).await? else {
        return Ok(not_found(&id));
    };

    payload.apply(&mut persona);
    db::update_persona(&db, &persona).await?;
    Ok(axum::Json(persona).into_response())
}

/// Delete a persona that no conversation refers to
async fn delete_persona(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.read().expect("Unable to read share state").db.clone();
    if db::find_persona_by_id(&db, &id).await?.is_none() {
        return Ok(not_found(&id));
    }

    let conversations = conversation_count_for_persona(&db, &id).await?;
    if conversations > 0 {
        return Ok((
            StatusCode::CONFLICT,
            format!("Persona {} has {} conversations", id, conversations),
        )
            .into_response());
    }

    db::delete_persona(&db, &id).await?;
    tracing::info!("Deleted persona {}", id);
    Ok(axum::Json(MessageResponse::new("Persona deleted")).into_response())
}

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_personas).post(create_persona))
        .route(
            "/{id}",
            get(get_persona).put(update_persona).delete(delete_persona),
        )
}
