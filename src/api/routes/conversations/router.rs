//! Router for the conversation API

use std::convert::Infallible;
use std::sync::{Arc, RwLock};

use anyhow::anyhow;
use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, sse::Event, sse::KeepAlive, sse::Sse},
    routing::{get, post},
};
use axum_extra::extract::Query;
use tokio::sync::mpsc;
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use super::{db, public};
use crate::api::public::{ApiError, Page};
use crate::api::routes::personas::db::find_persona_by_id;
use crate::api::state::AppState;
use crate::chat::{CoordinatorBuilder, ResponseStreamCoordinator, StreamEvent};

type SharedState = Arc<RwLock<AppState>>;

const DEFAULT_PAGE_SIZE: usize = 50;
const DEFAULT_CONVERSATIONS_PAGE_SIZE: usize = 20;
const DEFAULT_SUMMARY_LENGTH: usize = 100;

fn not_found(id: &str) -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        format!("Conversation {} not found", id),
    )
        .into_response()
}

/// Start a conversation with a persona
async fn create_conversation(
    State(state): State<SharedState>,
    axum::Json(payload): axum::Json<public::CreateConversationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.read().expect("Unable to read share state").db.clone();

    let Some(persona) = find_persona_by_id(&db, &payload.persona_id).await? else {
        return Ok((
            StatusCode::NOT_FOUND,
            format!("Persona {} not found", payload.persona_id),
        )
            .into_response());
    };

    let conversation =
        db::start_conversation(&db, &persona, payload.session_prompt.as_deref()).await?;

    tracing::info!(
        "Created conversation {} with persona {}",
        conversation.id,
        persona.id
    );
    Ok(axum::Json(conversation).into_response())
}

/// List conversations, most recently messaged first
async fn list_conversations(
    State(state): State<SharedState>,
    Query(params): Query<public::ConversationsQuery>,
) -> Result<axum::Json<public::ConversationsResponse>, ApiError> {
    let db = state.read().expect("Unable to read share state").db.clone();
    let page = Page::new(params.page, params.limit, DEFAULT_CONVERSATIONS_PAGE_SIZE);
    let (conversations, total) =
        db::conversation_page(&db, params.persona_id.as_deref(), page).await?;

    Ok(axum::Json(public::ConversationsResponse {
        conversations,
        total,
        page: page.page,
        limit: page.limit,
    }))
}

/// Get a conversation by ID
async fn get_conversation(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.read().expect("Unable to read share state").db.clone();
    match db::find_conversation_by_id(&db, &id).await? {
        Some(conversation) => Ok(axum::Json(conversation).into_response()),
        None => Ok(not_found(&id)),
    }
}

/// Get a page of messages in a conversation, oldest first
async fn list_messages(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(params): Query<public::MessagesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.read().expect("Unable to read share state").db.clone();
    if db::find_conversation_by_id(&db, &id).await?.is_none() {
        return Ok(not_found(&id));
    }

    let page = Page::new(params.page, params.limit, DEFAULT_PAGE_SIZE);
    let total = db::message_count(&db, &id).await?;
    let messages = db::message_page(&db, &id, page).await?;

    Ok(axum::Json(public::MessagesResponse {
        messages,
        total,
        page: page.page,
        limit: page.limit,
    })
    .into_response())
}

/// Delete a conversation and all of its messages
async fn delete_conversation(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let (db, memory) = {
        let shared_state = state.read().expect("Unable to read share state");
        (shared_state.db.clone(), Arc::clone(&shared_state.memory))
    };

    if !db::delete_conversation(&db, &id).await? {
        return Ok(not_found(&id));
    }
    memory.forget(&id);

    tracing::info!("Deleted conversation {}", id);
    Ok(axum::Json(public::MessageResponse::new("Conversation deleted")).into_response())
}

/// Send a message and stream the persona's reply
async fn send_message(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    axum::Json(payload): axum::Json<public::SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    use crate::api::utils::DetectDisconnect;

    let (db, config, backend, memory) = {
        let shared_state = state.read().expect("Unable to read share state");
        (
            shared_state.db.clone(),
            shared_state.config.clone(),
            Arc::clone(&shared_state.backend),
            Arc::clone(&shared_state.memory),
        )
    };

    let Some(conversation) = db::find_conversation_by_id(&db, &id).await? else {
        return Ok(not_found(&id));
    };
    let persona = find_persona_by_id(&db, &conversation.persona_id)
        .await?
        .ok_or(anyhow!(
            "Persona {} for conversation {} not found",
            conversation.persona_id,
            conversation.id
        ))?;

    let (tx, rx) = mpsc::unbounded_channel::<StreamEvent>();
    let sse_stream = UnboundedReceiverStream::new(rx)
        .map(|event| Ok::<Event, Infallible>(Event::default().data(event.data())));
    // Cancelled when the response body is dropped
    let disconnect = CancellationToken::new();
    let wrapped_sse_stream = DetectDisconnect::new(sse_stream, disconnect.clone());

    let coordinator = CoordinatorBuilder::new(Arc::new(db), backend, memory, tx)
        .max_context_chars(config.max_context_chars)
        .context_source(config.context_source)
        .cancellation(disconnect)
        .build();

    tokio::spawn(async move {
        let outcome = coordinator
            .handle_turn(
                &conversation.id,
                &persona.prompt(),
                conversation.session_prompt.as_deref(),
                &payload.content,
            )
            .await;
        tracing::debug!(
            "Turn for conversation {} ended in {:?}",
            conversation.id,
            outcome.state
        );
    });

    Ok(Sse::new(wrapped_sse_stream)
        .keep_alive(KeepAlive::default())
        .into_response())
}

/// Generate, store and return a summary of the conversation
async fn generate_summary(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    payload: Option<axum::Json<public::SummaryRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let (db, backend) = {
        let shared_state = state.read().expect("Unable to read share state");
        (shared_state.db.clone(), Arc::clone(&shared_state.backend))
    };
    if db::find_conversation_by_id(&db, &id).await?.is_none() {
        return Ok(not_found(&id));
    }

    let max_length = payload
        .and_then(|axum::Json(req)| req.max_length)
        .unwrap_or(DEFAULT_SUMMARY_LENGTH);
    let summary = ResponseStreamCoordinator::summarize(&db, backend.as_ref(), &id, max_length).await;
    db::update_summary(&db, &id, &summary).await?;

    Ok(axum::Json(public::SummaryResponse { summary }).into_response())
}

/// Replace the conversation's summary
async fn update_summary(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    axum::Json(payload): axum::Json<public::UpdateSummaryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.read().expect("Unable to read share state").db.clone();
    if db::find_conversation_by_id(&db, &id).await?.is_none() {
        return Ok(not_found(&id));
    }

    db::update_summary(&db, &id, &payload.summary).await?;
    Ok(axum::Json(public::MessageResponse::new("Summary updated")).into_response())
}

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_conversations).post(create_conversation))
        .route("/{id}", get(get_conversation).delete(delete_conversation))
        .route("/{id}/messages", get(list_messages).post(send_message))
        .route("/{id}/summary", post(generate_summary).put(update_summary))
}
