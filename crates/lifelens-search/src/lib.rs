//! # lifelens-search
//!
//! Hybrid retrieval over a personal media library.
//!
//! This crate provides:
//! - Semantic search by cosine similarity, through the pgvector index or an
//!   exact in-memory scan
//! - Keyword search over captions and extracted text
//! - Score fusion with semantic, keyword and hybrid provenance
//!
//! ## Example
//!
//! ```ignore
//! use lifelens_search::{HybridSearch, HybridSearchConfig, HybridSearchEngine, VectorStrategy};
//!
//! let engine = HybridSearchEngine::new(db.media.clone(), embedder)
//!     .with_config(HybridSearchConfig::default().with_strategy(VectorStrategy::BruteForce));
//! let results = engine.search(owner_id, "coffee receipts").await?;
//! ```

pub mod fusion;
pub mod hybrid;

pub use lifelens_core::cosine_similarity;

pub use fusion::{fuse, to_search_result};
pub use hybrid::{keyword_terms, HybridSearch, HybridSearchConfig, HybridSearchEngine, VectorStrategy};
