//! # lifelens-core
//!
//! Core types, traits, and abstractions for lifelens.
//!
//! This crate provides the foundational data structures and trait definitions
//! that other lifelens crates depend on: media and conversation models, the
//! model-facing chat types, repository and backend traits, the relative time
//! parser, and the client stream event type.

pub mod chat;
pub mod defaults;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod similarity;
pub mod temporal;
pub mod text;
pub mod traits;

// Re-export commonly used types at crate root
pub use chat::*;
pub use error::{Error, Result};
pub use events::StreamEvent;
pub use models::*;
pub use similarity::cosine_similarity;
pub use temporal::{parse_relative_time, RelativeExpression, TimeOfDay, TimeUnit};
pub use traits::*;
