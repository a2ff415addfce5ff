//! Events emitted to clients while a query is answered.
//!
//! A streamed answer is a sequence of non-terminal events (`function_call`,
//! `text`) followed by exactly one terminal event (`done` or `error`).
//! Each event serializes to a self-contained JSON object tagged by `type`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::ToolArguments;

/// Message used when the model finished without producing any text.
pub const NO_RESPONSE_MESSAGE: &str = "No response generated";

/// Message used when the event source ended without a terminal event.
pub const STREAM_ENDED_MESSAGE: &str = "Stream ended unexpectedly";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// The model requested a tool call.
    FunctionCall { name: String, args: ToolArguments },
    /// A fragment of answer text.
    Text { content: String },
    /// The answer is complete and persisted as `message_id`.
    Done { message_id: i64 },
    /// The request failed.
    Error { message: String },
}

impl StreamEvent {
    pub fn text(content: impl Into<String>) -> Self {
        StreamEvent::Text {
            content: content.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            message: message.into(),
        }
    }

    /// `done` and `error` end a stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }

    /// Wire name of the event kind.
    pub fn event_type(&self) -> &'static str {
        match self {
            StreamEvent::FunctionCall { .. } => "function_call",
            StreamEvent::Text { .. } => "text",
            StreamEvent::Done { .. } => "done",
            StreamEvent::Error { .. } => "error",
        }
    }

    /// JSON body of the event, including its `type` tag.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({"type": "error", "message": e.to_string()})
        })
    }
}
