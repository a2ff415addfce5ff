//! Error types for lifelens.

use thiserror::Error;

/// Result type alias using lifelens's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for lifelens operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Conversation not found or not owned by the caller
    #[error("Conversation not found: {0}")]
    ConversationNotFound(uuid::Uuid),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Embedding vector has the wrong number of dimensions
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Inference/generation failed
    #[error("Inference error: {0}")]
    Inference(String),

    /// Search operation failed
    #[error("Search error: {0}")]
    Search(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input (malformed tool arguments, bad request fields)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True for failures of the model backend (unreachable, timeout, bad
    /// status). These end an orchestration run instead of being absorbed.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Error::Inference(_) | Error::Request(_) | Error::Embedding(_)
        )
    }

    /// True when the failure came from the persistent store.
    pub fn is_data_access(&self) -> bool {
        matches!(self, Error::Database(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("test resource".to_string());
        assert_eq!(err.to_string(), "Not found: test resource");
    }

    #[test]
    fn test_error_display_conversation_not_found() {
        let id = Uuid::nil();
        let err = Error::ConversationNotFound(id);
        assert_eq!(err.to_string(), format!("Conversation not found: {}", id));
    }

    #[test]
    fn test_error_display_dimension_mismatch() {
        let err = Error::DimensionMismatch {
            expected: 1536,
            actual: 768,
        };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 1536, got 768");
    }

    #[test]
    fn test_error_display_inference() {
        let err = Error::Inference("model timeout".to_string());
        assert_eq!(err.to_string(), "Inference error: model timeout");
    }

    #[test]
    fn test_error_display_invalid_input() {
        let err = Error::InvalidInput("missing relative_time".to_string());
        assert_eq!(err.to_string(), "Invalid input: missing relative_time");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number");
        assert!(json_err.is_err());

        let err: Error = json_err.unwrap_err().into();
        match err {
            Error::Serialization(msg) => {
                assert!(!msg.is_empty());
            }
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_upstream_classification() {
        assert!(Error::Inference("timeout".into()).is_upstream());
        assert!(Error::Request("connection refused".into()).is_upstream());
        assert!(Error::Embedding("503".into()).is_upstream());
        assert!(!Error::InvalidInput("bad".into()).is_upstream());
        assert!(!Error::NotFound("x".into()).is_upstream());
    }

    #[test]
    fn test_data_access_classification() {
        let err = Error::Database(sqlx::Error::PoolTimedOut);
        assert!(err.is_data_access());
        assert!(!err.is_upstream());
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn test_error_debug_format() {
        let err = Error::NotFound("test".to_string());
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("NotFound"));
    }
}
