//! Structured logging schema and field name constants for lifelens.
//!
//! All crates use these names for structured `tracing` fields so that log
//! aggregation can query the same field across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Terminal failure of a request (model backend down, stream aborted) |
//! | WARN  | Recoverable issue, fallback applied (tool failed, index query failed) |
//! | INFO  | Lifecycle events (startup, request completion, conversation created) |
//! | DEBUG | Decision points, per-round orchestration state, retrieval counts |
//! | TRACE | Per-item iteration (individual search hits, stream deltas) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "api", "agent", "search", "db", "inference", "core"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "orchestrator", "dispatcher", "hybrid_search", "openai", "pool"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "run_query", "dispatch", "search", "generate", "embed"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Owner (tenant) the request is scoped to.
pub const OWNER_ID: &str = "owner_id";

/// Conversation being operated on.
pub const CONVERSATION_ID: &str = "conversation_id";

/// Tool name being dispatched.
pub const TOOL: &str = "tool";

/// Search query text.
pub const QUERY: &str = "query";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of results returned by a search, query, or tool.
pub const RESULT_COUNT: &str = "result_count";

/// Model round-trip number within one request (1-based).
pub const ITERATION: &str = "iteration";

/// Number of tool calls requested in a round.
pub const TOOL_CALLS: &str = "tool_calls";

/// Byte length of accumulated response text.
pub const RESPONSE_LEN: &str = "response_len";

// ─── Search-specific fields ────────────────────────────────────────────────

/// Number of semantic results before fusion.
pub const SEMANTIC_HITS: &str = "semantic_hits";

/// Number of keyword results before fusion.
pub const KEYWORD_HITS: &str = "keyword_hits";

/// Vector strategy used ("index", "brute_force").
pub const STRATEGY: &str = "strategy";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
