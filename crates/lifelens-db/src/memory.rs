//! In-memory implementation of the media and conversation repositories.
//!
//! Uses `Vec` and `HashMap` behind a `tokio::sync::RwLock`. Ranking for
//! [`MediaRepository::find_similar`] is exact cosine similarity over every
//! stored vector, so it matches the brute-force search path. Intended for
//! tests and for running the server without PostgreSQL.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use pgvector::Vector;
use tokio::sync::RwLock;
use uuid::Uuid;

use lifelens_core::{
    cosine_similarity, Conversation, ConversationRepository, ConversationTurn, Error,
    MediaDetails, MediaEmbedding, MediaRepository, MediaType, NewTurn, Result, SimilarMedia,
    TimeRange,
};

struct StoredMedia {
    details: MediaDetails,
    embedding: Option<Vector>,
    embedding_source: Option<String>,
}

#[derive(Default)]
struct State {
    media: Vec<StoredMedia>,
    conversations: HashMap<Uuid, Conversation>,
    turns: HashMap<Uuid, Vec<ConversationTurn>>,
    next_turn_id: i64,
}

/// In-memory store for tests and local runs.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<State>,
    unavailable: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a media record, optionally with its embedding.
    pub async fn insert_media(&self, details: MediaDetails, embedding: Option<Vec<f32>>) {
        let embedding_source = embedding
            .as_ref()
            .map(|_| details.file_type.content_field().to_string());
        self.state.write().await.media.push(StoredMedia {
            details,
            embedding: embedding.map(Vector::from),
            embedding_source,
        });
    }

    /// Make every repository call fail with a database error until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(Error::Database(sqlx::Error::PoolTimedOut))
        } else {
            Ok(())
        }
    }
}

fn newest_first(media: &mut [MediaDetails]) {
    media.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}

fn clamp_limit(limit: i64) -> usize {
    usize::try_from(limit).unwrap_or(0)
}

fn matches_any(text: Option<&str>, terms: &[String]) -> bool {
    text.map(|t| {
        let lowered = t.to_lowercase();
        terms.iter().any(|term| lowered.contains(term.as_str()))
    })
    .unwrap_or(false)
}

#[async_trait]
impl MediaRepository for InMemoryStore {
    async fn list_in_range(
        &self,
        owner_id: Uuid,
        range: TimeRange,
        limit: i64,
    ) -> Result<Vec<MediaDetails>> {
        self.check_available()?;
        let state = self.state.read().await;
        let mut found: Vec<MediaDetails> = state
            .media
            .iter()
            .map(|m| &m.details)
            .filter(|d| d.owner_id == owner_id && range.contains(d.created_at))
            .cloned()
            .collect();
        newest_first(&mut found);
        found.truncate(clamp_limit(limit));
        Ok(found)
    }

    async fn get_details(&self, owner_id: Uuid, ids: &[Uuid]) -> Result<Vec<MediaDetails>> {
        self.check_available()?;
        let state = self.state.read().await;
        let mut seen = Vec::new();
        let mut found = Vec::new();
        for id in ids {
            if seen.contains(id) {
                continue;
            }
            seen.push(*id);
            if let Some(m) = state
                .media
                .iter()
                .find(|m| m.details.media_id == *id && m.details.owner_id == owner_id)
            {
                found.push(m.details.clone());
            }
        }
        Ok(found)
    }

    async fn count(&self, owner_id: Uuid, media_type: Option<MediaType>) -> Result<i64> {
        self.check_available()?;
        let state = self.state.read().await;
        let n = state
            .media
            .iter()
            .filter(|m| m.details.owner_id == owner_id)
            .filter(|m| media_type.map_or(true, |t| m.details.file_type == t))
            .count();
        Ok(n as i64)
    }

    async fn recent_with_text(&self, owner_id: Uuid, limit: i64) -> Result<Vec<MediaDetails>> {
        self.check_available()?;
        let state = self.state.read().await;
        let mut found: Vec<MediaDetails> = state
            .media
            .iter()
            .map(|m| &m.details)
            .filter(|d| d.owner_id == owner_id)
            .filter(|d| d.ocr_text.as_deref().is_some_and(|t| !t.is_empty()))
            .cloned()
            .collect();
        newest_first(&mut found);
        found.truncate(clamp_limit(limit));
        Ok(found)
    }

    async fn keyword_search(
        &self,
        owner_id: Uuid,
        terms: &[String],
        limit: i64,
    ) -> Result<Vec<MediaDetails>> {
        self.check_available()?;
        let terms: Vec<String> = terms
            .iter()
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let state = self.state.read().await;
        let mut found: Vec<MediaDetails> = state
            .media
            .iter()
            .map(|m| &m.details)
            .filter(|d| d.owner_id == owner_id)
            .filter(|d| {
                matches_any(d.caption.as_deref(), &terms)
                    || matches_any(d.ocr_text.as_deref(), &terms)
                    || matches_any(d.transcript.as_deref(), &terms)
                    || matches_any(d.summary.as_deref(), &terms)
            })
            .cloned()
            .collect();
        newest_first(&mut found);
        found.truncate(clamp_limit(limit));
        Ok(found)
    }

    async fn find_similar(
        &self,
        owner_id: Uuid,
        query: &Vector,
        limit: i64,
    ) -> Result<Vec<SimilarMedia>> {
        self.check_available()?;
        let state = self.state.read().await;
        let mut scored: Vec<SimilarMedia> = state
            .media
            .iter()
            .filter(|m| m.details.owner_id == owner_id)
            .filter_map(|m| {
                m.embedding.as_ref().map(|v| SimilarMedia {
                    media: m.details.clone(),
                    similarity: cosine_similarity(query.as_slice(), v.as_slice()),
                })
            })
            .collect();
        scored.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        scored.truncate(clamp_limit(limit));
        Ok(scored)
    }

    async fn embeddings_for_owner(&self, owner_id: Uuid) -> Result<Vec<MediaEmbedding>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .media
            .iter()
            .filter(|m| m.details.owner_id == owner_id)
            .filter_map(|m| {
                m.embedding.as_ref().map(|v| MediaEmbedding {
                    media: m.details.clone(),
                    vector: v.clone(),
                    source_field: m.embedding_source.clone(),
                })
            })
            .collect())
    }
}

#[async_trait]
impl ConversationRepository for InMemoryStore {
    async fn create(&self, owner_id: Uuid, title: &str) -> Result<Conversation> {
        self.check_available()?;
        let now = Utc::now();
        let conversation = Conversation {
            id: Uuid::now_v7(),
            owner_id,
            title: title.to_string(),
            created_at: now,
            updated_at: now,
        };
        let mut state = self.state.write().await;
        state.conversations.insert(conversation.id, conversation.clone());
        state.turns.insert(conversation.id, Vec::new());
        Ok(conversation)
    }

    async fn get(&self, owner_id: Uuid, id: Uuid) -> Result<Option<Conversation>> {
        self.check_available()?;
        let state = self.state.read().await;
        Ok(state
            .conversations
            .get(&id)
            .filter(|c| c.owner_id == owner_id)
            .cloned())
    }

    async fn list(&self, owner_id: Uuid, skip: i64, limit: i64) -> Result<Vec<Conversation>> {
        self.check_available()?;
        let state = self.state.read().await;
        let mut owned: Vec<Conversation> = state
            .conversations
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(owned
            .into_iter()
            .skip(clamp_limit(skip))
            .take(clamp_limit(limit))
            .collect())
    }

    async fn append_turn(
        &self,
        owner_id: Uuid,
        conversation_id: Uuid,
        turn: NewTurn,
    ) -> Result<ConversationTurn> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let now = Utc::now();

        match state.conversations.get_mut(&conversation_id) {
            Some(c) if c.owner_id == owner_id => c.updated_at = now,
            _ => return Err(Error::ConversationNotFound(conversation_id)),
        }

        state.next_turn_id += 1;
        let id = state.next_turn_id;
        let turns = state.turns.entry(conversation_id).or_default();
        let ordinal = turns.last().map_or(1, |t| t.ordinal + 1);
        let stored = ConversationTurn {
            id,
            conversation_id,
            role: turn.role,
            content: turn.content,
            ordinal,
            created_at: now,
            tool_calls: turn.tool_calls,
        };
        turns.push(stored.clone());
        Ok(stored)
    }

    async fn list_turns(
        &self,
        owner_id: Uuid,
        conversation_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<ConversationTurn>> {
        self.check_available()?;
        let state = self.state.read().await;
        let owned = state
            .conversations
            .get(&conversation_id)
            .is_some_and(|c| c.owner_id == owner_id);
        if !owned {
            return Ok(Vec::new());
        }

        let turns = state.turns.get(&conversation_id).cloned().unwrap_or_default();
        let keep = limit.map_or(turns.len(), clamp_limit);
        let skip = turns.len().saturating_sub(keep);
        Ok(turns.into_iter().skip(skip).collect())
    }

    async fn update_title(&self, owner_id: Uuid, id: Uuid, title: &str) -> Result<bool> {
        self.check_available()?;
        let mut state = self.state.write().await;
        match state.conversations.get_mut(&id) {
            Some(c) if c.owner_id == owner_id => {
                c.title = title.to_string();
                c.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<bool> {
        self.check_available()?;
        let mut state = self.state.write().await;
        let owned = state
            .conversations
            .get(&id)
            .is_some_and(|c| c.owner_id == owner_id);
        if owned {
            state.conversations.remove(&id);
            state.turns.remove(&id);
        }
        Ok(owned)
    }
}
