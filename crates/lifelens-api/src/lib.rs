//! # lifelens-api
//!
//! HTTP surface for lifelens: conversations, streamed answers over SSE, and
//! stateless queries. Requests are scoped to the owner named in the
//! `X-Owner-Id` header.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod state;

use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub use config::ServerConfig;
pub use error::ApiError;
pub use state::{build_state, AppState};

use handlers::{chat, health_check, query};

/// All routes with request tracing.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/chat/conversations",
            post(chat::create_conversation).get(chat::list_conversations),
        )
        .route(
            "/api/chat/conversations/:id",
            axum::routing::patch(chat::rename_conversation).delete(chat::delete_conversation),
        )
        .route(
            "/api/chat/conversations/:id/messages",
            get(chat::list_messages).post(chat::send_message),
        )
        .route("/api/query", post(query::run_query))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// CORS policy for the configured origins.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("Invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static(middleware::OWNER_HEADER),
        ])
        .max_age(std::time::Duration::from_secs(3600))
}
