//! Conversation and message handlers.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderName, StatusCode};
use axum::response::sse::{Event, KeepAlive};
use axum::response::{IntoResponse, Response, Sse};
use axum::Json;
use futures::StreamExt;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use lifelens_core::defaults::{PAGE_LIMIT, PAGE_LIMIT_MAX, SSE_KEEPALIVE_SECS};

use crate::error::ApiError;
use crate::middleware::Owner;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CreateConversationRequest {
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListConversationsParams {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_page_limit")]
    pub limit: i64,
}

fn default_page_limit() -> i64 {
    PAGE_LIMIT
}

#[derive(Debug, Deserialize)]
pub struct ListMessagesParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageParams {
    #[serde(default = "default_stream")]
    pub stream: bool,
}

fn default_stream() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub title: String,
}

pub async fn create_conversation(
    State(state): State<AppState>,
    Owner(owner): Owner,
    body: Option<Json<CreateConversationRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let conversation = state
        .chat
        .create_conversation(owner, request.title.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

pub async fn list_conversations(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Query(params): Query<ListConversationsParams>,
) -> Result<impl IntoResponse, ApiError> {
    if params.skip < 0 {
        return Err(ApiError::BadRequest("skip must not be negative".to_string()));
    }
    if !(1..=PAGE_LIMIT_MAX).contains(&params.limit) {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {}",
            PAGE_LIMIT_MAX
        )));
    }
    let conversations = state
        .chat
        .list_conversations(owner, params.skip, params.limit)
        .await?;
    Ok(Json(conversations))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(conversation_id): Path<Uuid>,
    Query(params): Query<ListMessagesParams>,
) -> Result<impl IntoResponse, ApiError> {
    let turns = state
        .chat
        .list_turns(owner, conversation_id, params.limit)
        .await?;
    Ok(Json(turns))
}

/// Answer a message, as SSE frames by default or as one JSON body with
/// `?stream=false`.
pub async fn send_message(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(conversation_id): Path<Uuid>,
    Query(params): Query<SendMessageParams>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Response, ApiError> {
    if request.message.trim().is_empty() {
        return Err(ApiError::BadRequest("message must not be empty".to_string()));
    }

    if !params.stream {
        let reply = state
            .chat
            .run_query(owner, conversation_id, &request.message)
            .await?;
        return Ok(Json(reply).into_response());
    }

    info!(conversation_id = %conversation_id, "Streaming reply");
    let events = state
        .chat
        .run_query_stream(owner, conversation_id, request.message)
        .map(|event| {
            Ok::<_, Infallible>(
                Event::default()
                    .event(event.event_type())
                    .data(event.to_json().to_string()),
            )
        });

    let sse = Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(SSE_KEEPALIVE_SECS))
            .text("keepalive"),
    );

    Ok((
        [
            (header::CACHE_CONTROL, "no-cache"),
            (HeaderName::from_static("x-accel-buffering"), "no"),
        ],
        sse,
    )
        .into_response())
}

pub async fn rename_conversation(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(conversation_id): Path<Uuid>,
    Json(request): Json<RenameRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let conversation = state
        .chat
        .rename(owner, conversation_id, &request.title)
        .await?;
    Ok(Json(conversation))
}

pub async fn delete_conversation(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Path(conversation_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.chat.delete(owner, conversation_id).await? {
        return Err(ApiError::NotFound("Conversation not found".to_string()));
    }
    Ok(Json(serde_json::json!({
        "message": "Conversation deleted successfully",
    })))
}
