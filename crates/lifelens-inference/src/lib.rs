//! # lifelens-inference
//!
//! Model and embedding backends for lifelens.
//!
//! This crate provides:
//! - An OpenAI-compatible backend (feature `openai`, default): chat
//!   completions with tool calling, SSE streaming, and embeddings with
//!   role prefixes and dimension checks
//! - Scripted and deterministic mock backends (feature `mock`)
//!
//! Both implement the `ModelBackend` / `EmbeddingBackend` traits from
//! `lifelens-core`, so the agent and search layers never see wire formats.

#[cfg(feature = "openai")]
pub mod openai;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use lifelens_core::*;

#[cfg(feature = "openai")]
pub use openai::{OpenAIBackend, OpenAIConfig};
