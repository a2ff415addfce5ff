//! Mapping of provider error responses onto [`lifelens_core::Error`].
//!
//! Chat failures become `Inference` errors so the orchestration loop treats
//! them as terminal. Embedding failures become `Embedding` errors, which the
//! semantic search path absorbs into an empty result. Credential and model
//! problems are `Config` errors on either endpoint.

use lifelens_core::{Error, Result};

/// Which API produced the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Chat,
    Embeddings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenAIErrorCode {
    AuthenticationError,
    RateLimitExceeded,
    ModelNotFound,
    /// Prompt or embedding input longer than the model accepts.
    ContextLengthExceeded,
    /// The embedding model rejected the requested `dimensions`.
    UnsupportedDimensions,
    ServerError,
    Unknown,
}

impl OpenAIErrorCode {
    /// Classify from HTTP status, provider error type and message.
    pub fn from_response(status: u16, error_type: &str, message: &str) -> Self {
        let message = message.to_lowercase();
        match (status, error_type) {
            (401 | 403, _) => Self::AuthenticationError,
            (429, _) => Self::RateLimitExceeded,
            (404, _) | (_, "model_not_found") => Self::ModelNotFound,
            (400 | 413, _)
                if error_type.contains("context_length")
                    || message.contains("maximum context length")
                    || message.contains("too many tokens") =>
            {
                Self::ContextLengthExceeded
            }
            (400, _) if message.contains("dimensions") => Self::UnsupportedDimensions,
            (500..=599, _) => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimitExceeded | Self::ServerError)
    }
}

pub fn to_lifelens_error(code: OpenAIErrorCode, endpoint: Endpoint, message: &str) -> Error {
    match code {
        OpenAIErrorCode::AuthenticationError => {
            return Error::Config(format!("Authentication failed: {}", message))
        }
        OpenAIErrorCode::ModelNotFound => {
            return Error::Config(format!("Model not found: {}", message))
        }
        OpenAIErrorCode::UnsupportedDimensions => {
            return Error::Config(format!("Embedding dimension not supported: {}", message))
        }
        _ => {}
    }

    let detail = match code {
        OpenAIErrorCode::RateLimitExceeded => format!("Rate limit exceeded: {}", message),
        OpenAIErrorCode::ContextLengthExceeded => match endpoint {
            Endpoint::Chat => format!("Conversation exceeds the model context: {}", message),
            Endpoint::Embeddings => format!("Input too long to embed: {}", message),
        },
        OpenAIErrorCode::ServerError => format!("Server error: {}", message),
        _ => message.to_string(),
    };
    match endpoint {
        Endpoint::Chat => Error::Inference(detail),
        Endpoint::Embeddings => Error::Embedding(detail),
    }
}

/// Every returned vector must have the requested dimension.
pub fn check_dimensions(expected: usize, lengths: impl IntoIterator<Item = usize>) -> Result<()> {
    match lengths.into_iter().find(|&len| len != expected) {
        Some(actual) => Err(Error::DimensionMismatch { expected, actual }),
        None => Ok(()),
    }
}
