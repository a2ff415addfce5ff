//! # lifelens-agent
//!
//! Agentic retrieval over a personal media library.
//!
//! This crate provides:
//! - The tool catalog with typed, validated arguments
//! - A dispatcher that runs tool calls against owner-scoped data
//! - The bounded tool-calling loop, buffered or streamed
//! - Conversation sessions that persist turns and generate titles
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use lifelens_agent::{ChatService, Orchestrator, ToolDispatcher};
//!
//! let dispatcher = ToolDispatcher::new(db.media.clone(), search);
//! let orchestrator = Arc::new(Orchestrator::new(model, dispatcher));
//! let chat = Arc::new(ChatService::new(db.conversations.clone(), orchestrator));
//!
//! let reply = chat.run_query(owner_id, conversation.id, "What did I photograph yesterday?").await?;
//! println!("{}", reply.response);
//! ```

pub mod analyze;
pub mod dispatcher;
pub mod orchestrator;
pub mod prompt;
pub mod session;
pub mod stream;
pub mod tools;

pub use analyze::{find_items, SearchType};
pub use dispatcher::ToolDispatcher;
pub use orchestrator::{LoopOutcome, Orchestrator, OrchestratorConfig, QueryContext};
pub use prompt::SYSTEM_PROMPT;
pub use session::{ChatReply, ChatService};
pub use stream::{seal, EventStream};
pub use tools::{catalog, ToolError, ToolInvocation, ToolName};
