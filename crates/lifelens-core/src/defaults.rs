//! Centralized default constants for the lifelens system.
//!
//! **This module is the single source of truth** for shared default values.
//! Crates reference these constants instead of defining their own magic
//! numbers. Organized by domain area.

// =============================================================================
// EMBEDDING
// =============================================================================

/// Embedding vector dimension. Stored and query vectors must match exactly.
pub const EMBED_DIMENSION: usize = 1536;

// =============================================================================
// ORCHESTRATION
// =============================================================================

/// Hard ceiling on model round-trips per request.
pub const MAX_ITERATIONS: usize = 5;

/// Number of prior conversation turns sent to the model as context.
pub const HISTORY_WINDOW: usize = 10;

/// Maximum characters of a generated conversation title.
pub const TITLE_MAX_CHARS: usize = 50;

/// Characters of the first message shown to the title prompt.
pub const TITLE_PROMPT_CHARS: usize = 200;

/// Words kept by the fallback title.
pub const TITLE_FALLBACK_WORDS: usize = 5;

// =============================================================================
// SEARCH
// =============================================================================

/// Minimum cosine similarity for a semantic hit to enter fusion.
pub const SIMILARITY_THRESHOLD: f32 = 0.6;

/// Default number of fused results returned by hybrid search.
pub const SEARCH_LIMIT: usize = 10;

/// Score multiplier for keyword-only hits (keyword relevance is 1.0).
pub const KEYWORD_WEIGHT: f32 = 0.7;

/// Bonus added to a semantic hit that keyword search also found.
pub const HYBRID_BONUS: f32 = 0.3;

// =============================================================================
// TOOLS
// =============================================================================

/// Preview/excerpt length in characters for tool rows and search results.
pub const SNIPPET_LENGTH: usize = 200;

/// Excerpt length for `analyze_text` with `search_type = general`.
pub const GENERAL_EXCERPT_LENGTH: usize = 300;

/// Most recent media scanned by `analyze_text`.
pub const ANALYZE_SCAN_LIMIT: i64 = 20;

/// Maximum rows returned by `analyze_text`.
pub const ANALYZE_MAX_RESULTS: usize = 10;

/// Maximum rows returned by `temporal_filter`.
pub const TEMPORAL_RESULT_LIMIT: i64 = 50;

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for conversation listing.
pub const PAGE_LIMIT: i64 = 10;

/// Largest page size accepted by list endpoints.
pub const PAGE_LIMIT_MAX: i64 = 100;

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 8000;

/// SSE keep-alive interval in seconds.
pub const SSE_KEEPALIVE_SECS: u64 = 15;
