use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

/// Error returned by handlers, rendered as `{"error": message}`.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unauthorized(String),
    Upstream(String),
    Internal(lifelens_core::Error),
}

impl From<lifelens_core::Error> for ApiError {
    fn from(err: lifelens_core::Error) -> Self {
        match err {
            lifelens_core::Error::NotFound(msg) => ApiError::NotFound(msg),
            lifelens_core::Error::ConversationNotFound(_) => {
                ApiError::NotFound("Conversation not found".to_string())
            }
            lifelens_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            e if e.is_upstream() => ApiError::Upstream(e.to_string()),
            e => ApiError::Internal(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Internal(err) => {
                error!(error = %err, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
