//! Stateless single-shot questions.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::middleware::Owner;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub query: String,
    pub response: String,
}

/// Answer without a conversation. Nothing is persisted.
pub async fn run_query(
    State(state): State<AppState>,
    Owner(owner): Owner,
    Json(request): Json<QueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::BadRequest("query must not be empty".to_string()));
    }
    let response = state.chat.answer(owner, &request.query).await?;
    Ok(Json(QueryResponse {
        query: request.query,
        response,
    }))
}
