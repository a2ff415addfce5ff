//! OpenAI-compatible inference backend.
//!
//! Works with any endpoint that speaks the OpenAI chat completions and
//! embeddings APIs, including:
//!
//! - OpenAI cloud API
//! - Azure OpenAI
//! - OpenRouter
//! - Ollama (in OpenAI compatibility mode)
//! - vLLM / LM Studio
//!
//! # Example
//!
//! ```rust,no_run
//! use lifelens_inference::openai::{OpenAIBackend, OpenAIConfig};
//! use lifelens_core::{EmbedRole, EmbeddingBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = OpenAIConfig {
//!         base_url: "http://localhost:11434/v1".to_string(),
//!         embed_query_prefix: Some("search_query: ".to_string()),
//!         ..OpenAIConfig::from_env()
//!     };
//!     let backend = OpenAIBackend::new(config).unwrap();
//!
//!     let texts = vec!["beach trip photos".to_string()];
//!     let vectors = backend.embed_texts(&texts, EmbedRole::Query).await.unwrap();
//! }
//! ```

mod backend;
mod error;
mod streaming;
mod types;

pub use backend::{
    to_wire_messages, OpenAIBackend, OpenAIConfig, DEFAULT_DIMENSION, DEFAULT_EMBED_MODEL,
    DEFAULT_GEN_MODEL, DEFAULT_OPENAI_URL, DEFAULT_TIMEOUT_SECS,
};
pub use error::{check_dimensions, to_lifelens_error, Endpoint, OpenAIErrorCode};
pub use streaming::{parse_sse_stream, ToolCallAccumulator};
pub use types::*;
