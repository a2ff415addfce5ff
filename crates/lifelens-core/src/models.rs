//! Core data models for lifelens.
//!
//! These types are shared across all lifelens crates and represent
//! the core domain entities: media records, conversations, search results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::chat::ToolCall;
use crate::error::{Error, Result};

/// Embedding vector type (re-exported from pgvector).
pub use pgvector::Vector;

// =============================================================================
// MEDIA TYPES
// =============================================================================

/// Kind of uploaded media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Audio,
    Text,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Audio => "audio",
            MediaType::Text => "text",
        }
    }

    /// Name of the metadata field holding the extracted text for this type.
    pub fn content_field(&self) -> &'static str {
        match self {
            MediaType::Image => "ocr_text",
            MediaType::Audio => "transcript",
            MediaType::Text => "summary",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "image" => Ok(MediaType::Image),
            "audio" => Ok(MediaType::Audio),
            "text" => Ok(MediaType::Text),
            other => Err(Error::InvalidInput(format!("Unknown media type: {}", other))),
        }
    }
}

/// A media record joined with its extracted metadata.
///
/// `created_at` is the metadata timestamp, which is what temporal queries
/// filter on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaDetails {
    pub media_id: Uuid,
    #[serde(skip)]
    pub owner_id: Uuid,
    pub file_name: String,
    pub file_type: MediaType,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
    pub caption: Option<String>,
    pub ocr_text: Option<String>,
    pub transcript: Option<String>,
    pub summary: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
}

impl MediaDetails {
    /// Extracted text appropriate to the media type, with its field name.
    pub fn content(&self) -> (Option<&str>, &'static str) {
        let field = self.file_type.content_field();
        let text = match self.file_type {
            MediaType::Image => self.ocr_text.as_deref(),
            MediaType::Audio => self.transcript.as_deref(),
            MediaType::Text => self.summary.as_deref(),
        };
        (text, field)
    }
}

/// A media record paired with its cosine similarity to a query vector.
#[derive(Debug, Clone)]
pub struct SimilarMedia {
    pub media: MediaDetails,
    pub similarity: f32,
}

/// A stored embedding with the media it belongs to.
#[derive(Debug, Clone)]
pub struct MediaEmbedding {
    pub media: MediaDetails,
    pub vector: Vector,
    /// Which text field was embedded ("caption", "ocr_text", ...).
    pub source_field: Option<String>,
}

// =============================================================================
// CONVERSATION TYPES
// =============================================================================

/// Author of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
    System,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::User => "user",
            TurnRole::Assistant => "assistant",
            TurnRole::System => "system",
        }
    }
}

impl FromStr for TurnRole {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(TurnRole::User),
            "assistant" => Ok(TurnRole::Assistant),
            "system" => Ok(TurnRole::System),
            other => Err(Error::InvalidInput(format!("Unknown turn role: {}", other))),
        }
    }
}

/// Default title for a conversation before one is generated.
pub const DEFAULT_CONVERSATION_TITLE: &str = "New Conversation";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A persisted conversation turn. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: i64,
    pub conversation_id: Uuid,
    pub role: TurnRole,
    pub content: String,
    /// Per-conversation sequence number, starting at 1.
    pub ordinal: i64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

/// Request to append a turn to a conversation.
#[derive(Debug, Clone)]
pub struct NewTurn {
    pub role: TurnRole,
    pub content: String,
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl NewTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
            tool_calls: None,
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(tool_calls)
            },
        }
    }
}

// =============================================================================
// TIME RANGE
// =============================================================================

/// Absolute UTC time range with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Create a range, rejecting `start > end`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidInput(format!(
                "Time range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Inclusive on both ends.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}

// =============================================================================
// SEARCH TYPES
// =============================================================================

/// Which retrieval path produced a search result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Semantic,
    Keyword,
    Hybrid,
}

/// A fused hybrid search hit. Request-scoped, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub media_id: Uuid,
    pub file_name: String,
    pub file_type: MediaType,
    pub created_at: DateTime<Utc>,
    pub caption: Option<String>,
    pub excerpt: Option<String>,
    pub content_type: String,
    pub combined_score: f32,
    pub provenance: Provenance,
}

/// Filter for counting media, as exposed to the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaCountFilter {
    Image,
    Audio,
    Document,
    #[default]
    All,
}

impl MediaCountFilter {
    /// Stored media type this filter selects; `None` means every type.
    pub fn media_type(&self) -> Option<MediaType> {
        match self {
            MediaCountFilter::Image => Some(MediaType::Image),
            MediaCountFilter::Audio => Some(MediaType::Audio),
            MediaCountFilter::Document => Some(MediaType::Text),
            MediaCountFilter::All => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaCountFilter::Image => "image",
            MediaCountFilter::Audio => "audio",
            MediaCountFilter::Document => "document",
            MediaCountFilter::All => "all",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_media_type_round_trip_str() {
        for t in [MediaType::Image, MediaType::Audio, MediaType::Text] {
            assert_eq!(t.as_str().parse::<MediaType>().unwrap(), t);
        }
        assert!("video".parse::<MediaType>().is_err());
    }

    #[test]
    fn test_media_type_content_field() {
        assert_eq!(MediaType::Image.content_field(), "ocr_text");
        assert_eq!(MediaType::Audio.content_field(), "transcript");
        assert_eq!(MediaType::Text.content_field(), "summary");
    }

    #[test]
    fn test_media_details_content_follows_type() {
        let details = MediaDetails {
            media_id: Uuid::nil(),
            owner_id: Uuid::nil(),
            file_name: "memo.m4a".into(),
            file_type: MediaType::Audio,
            mime_type: "audio/mp4".into(),
            created_at: Utc::now(),
            caption: None,
            ocr_text: Some("ignored".into()),
            transcript: Some("call the dentist".into()),
            summary: None,
            topics: vec![],
        };
        assert_eq!(details.content(), (Some("call the dentist"), "transcript"));
    }

    #[test]
    fn test_media_details_hides_owner() {
        let details = MediaDetails {
            media_id: Uuid::nil(),
            owner_id: Uuid::new_v4(),
            file_name: "a.png".into(),
            file_type: MediaType::Image,
            mime_type: "image/png".into(),
            created_at: Utc::now(),
            caption: None,
            ocr_text: None,
            transcript: None,
            summary: None,
            topics: vec![],
        };
        let json = serde_json::to_value(&details).unwrap();
        assert!(json.get("owner_id").is_none());
        assert_eq!(json["file_type"], "image");
    }

    #[test]
    fn test_time_range_rejects_inverted() {
        let now = Utc::now();
        assert!(TimeRange::new(now, now - Duration::seconds(1)).is_err());
        let range = TimeRange::new(now - Duration::hours(1), now).unwrap();
        assert!(range.contains(now));
        assert!(range.contains(now - Duration::hours(1)));
        assert!(!range.contains(now + Duration::seconds(1)));
    }

    #[test]
    fn test_count_filter_maps_document_to_text() {
        assert_eq!(MediaCountFilter::Document.media_type(), Some(MediaType::Text));
        assert_eq!(MediaCountFilter::All.media_type(), None);
        assert_eq!(MediaCountFilter::default(), MediaCountFilter::All);
    }

    #[test]
    fn test_provenance_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Provenance::Hybrid).unwrap(),
            "\"hybrid\""
        );
    }

    #[test]
    fn test_new_turn_assistant_drops_empty_tool_calls() {
        let turn = NewTurn::assistant("hello", vec![]);
        assert!(turn.tool_calls.is_none());
        assert_eq!(turn.role, TurnRole::Assistant);
    }
}
