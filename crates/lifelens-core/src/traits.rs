//! Core traits for lifelens abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability. Every
//! repository method takes the requesting owner and must never return
//! another owner's rows.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::chat::{EmbedRole, ModelRequest, ModelResponse, ModelStream};
use crate::error::Result;
use crate::models::*;

// =============================================================================
// MEDIA REPOSITORY
// =============================================================================

/// Owner-scoped read access to media records and their metadata.
#[async_trait]
pub trait MediaRepository: Send + Sync {
    /// Media whose metadata timestamp falls in `range`, newest first.
    async fn list_in_range(
        &self,
        owner_id: Uuid,
        range: TimeRange,
        limit: i64,
    ) -> Result<Vec<MediaDetails>>;

    /// Full records for `ids`. Ids not owned by `owner_id` are omitted.
    async fn get_details(&self, owner_id: Uuid, ids: &[Uuid]) -> Result<Vec<MediaDetails>>;

    /// Count of the owner's media, optionally restricted to one type.
    async fn count(&self, owner_id: Uuid, media_type: Option<MediaType>) -> Result<i64>;

    /// Most recent media that have OCR text, newest first.
    async fn recent_with_text(&self, owner_id: Uuid, limit: i64) -> Result<Vec<MediaDetails>>;

    /// Media where any term is a case-insensitive substring of the caption
    /// or extracted text. Newest first.
    async fn keyword_search(
        &self,
        owner_id: Uuid,
        terms: &[String],
        limit: i64,
    ) -> Result<Vec<MediaDetails>>;

    /// Nearest neighbours by cosine similarity using the vector index.
    /// Ordered by similarity descending.
    async fn find_similar(
        &self,
        owner_id: Uuid,
        query: &Vector,
        limit: i64,
    ) -> Result<Vec<SimilarMedia>>;

    /// Every stored embedding for the owner, for brute-force ranking.
    async fn embeddings_for_owner(&self, owner_id: Uuid) -> Result<Vec<MediaEmbedding>>;
}

// =============================================================================
// CONVERSATION REPOSITORY
// =============================================================================

/// Owner-scoped conversation and turn persistence.
#[async_trait]
pub trait ConversationRepository: Send + Sync {
    async fn create(&self, owner_id: Uuid, title: &str) -> Result<Conversation>;

    /// `None` when missing or owned by someone else.
    async fn get(&self, owner_id: Uuid, id: Uuid) -> Result<Option<Conversation>>;

    /// Most recently updated first.
    async fn list(&self, owner_id: Uuid, skip: i64, limit: i64) -> Result<Vec<Conversation>>;

    /// Append a turn with the next ordinal and bump `updated_at`.
    async fn append_turn(
        &self,
        owner_id: Uuid,
        conversation_id: Uuid,
        turn: NewTurn,
    ) -> Result<ConversationTurn>;

    /// Turns in ordinal order. With `limit`, the most recent `limit` turns.
    async fn list_turns(
        &self,
        owner_id: Uuid,
        conversation_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<ConversationTurn>>;

    /// Returns false when the conversation is not found for this owner.
    async fn update_title(&self, owner_id: Uuid, id: Uuid, title: &str) -> Result<bool>;

    /// Deletes the conversation and its turns. Returns false when not found.
    async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<bool>;
}

// =============================================================================
// INFERENCE BACKEND TRAITS
// =============================================================================

/// Backend for generating embeddings.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for a batch of texts.
    async fn embed_texts(&self, texts: &[String], role: EmbedRole) -> Result<Vec<Vector>>;

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;

    /// Get the model name.
    fn model_name(&self) -> &str;
}

/// Backend for chat generation with tool calling.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// One complete response.
    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse>;

    /// Incremental response. Tool calls arrive whole, once their arguments
    /// are complete.
    async fn generate_stream(&self, request: &ModelRequest) -> Result<ModelStream>;

    fn model_name(&self) -> &str;
}

/// Time source, injectable so temporal resolution is testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
