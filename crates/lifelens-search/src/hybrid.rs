//! Hybrid search combining semantic vector ranking and keyword matching.
//!
//! The semantic path embeds the query, ranks the owner's stored embeddings by
//! cosine similarity and drops hits below the similarity threshold. It can run
//! on the pgvector index or as an exact in-memory scan; an index failure falls
//! back to the scan. The keyword path matches lowercased query terms against
//! captions and extracted text. Both feed [`fuse`].
//!
//! Semantic failures (embedding errors, wrong vector dimension, store errors)
//! leave that path empty rather than failing the search.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use pgvector::Vector;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use lifelens_core::defaults::{EMBED_DIMENSION, SEARCH_LIMIT, SIMILARITY_THRESHOLD};
use lifelens_core::{
    cosine_similarity, EmbedRole, EmbeddingBackend, Error, MediaDetails, MediaRepository, Result,
    SearchResult, SimilarMedia,
};

use crate::fusion::fuse;

/// How semantic candidates are ranked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum VectorStrategy {
    /// Approximate nearest neighbours through the vector index.
    #[default]
    Index,
    /// Exact cosine similarity over every stored embedding.
    BruteForce,
}

impl VectorStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            VectorStrategy::Index => "index",
            VectorStrategy::BruteForce => "brute_force",
        }
    }
}

impl fmt::Display for VectorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VectorStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "index" => Ok(VectorStrategy::Index),
            "brute_force" | "bruteforce" | "brute-force" => Ok(VectorStrategy::BruteForce),
            other => Err(Error::Config(format!("Unknown vector strategy: {}", other))),
        }
    }
}

/// Configuration for hybrid search.
#[derive(Debug, Clone)]
pub struct HybridSearchConfig {
    /// Semantic hits below this cosine similarity are dropped before fusion.
    pub similarity_threshold: f32,
    /// Maximum fused results.
    pub limit: usize,
    pub strategy: VectorStrategy,
    /// Neighbours fetched from the index before thresholding.
    pub index_candidates: i64,
}

impl Default for HybridSearchConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: SIMILARITY_THRESHOLD,
            limit: SEARCH_LIMIT,
            strategy: VectorStrategy::default(),
            index_candidates: 100,
        }
    }
}

impl HybridSearchConfig {
    pub fn with_similarity_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_strategy(mut self, strategy: VectorStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_index_candidates(mut self, n: i64) -> Self {
        self.index_candidates = n.max(1);
        self
    }
}

/// Owner-scoped hybrid retrieval.
#[async_trait]
pub trait HybridSearch: Send + Sync {
    /// Fused results for `query`, best first. Never returns another owner's
    /// media.
    async fn search(&self, owner_id: Uuid, query: &str) -> Result<Vec<SearchResult>>;
}

/// Hybrid search engine over a media repository and an embedding backend.
pub struct HybridSearchEngine {
    media: Arc<dyn MediaRepository>,
    embedder: Arc<dyn EmbeddingBackend>,
    config: HybridSearchConfig,
}

impl HybridSearchEngine {
    pub fn new(media: Arc<dyn MediaRepository>, embedder: Arc<dyn EmbeddingBackend>) -> Self {
        Self {
            media,
            embedder,
            config: HybridSearchConfig::default(),
        }
    }

    pub fn with_config(mut self, config: HybridSearchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &HybridSearchConfig {
        &self.config
    }

    /// Embed a query and check the vector dimension.
    async fn embed_query(&self, query: &str) -> Result<Vector> {
        let mut vectors = self
            .embedder
            .embed_texts(&[query.to_string()], EmbedRole::Query)
            .await?;
        let vector = vectors
            .pop()
            .ok_or_else(|| Error::Embedding("Backend returned no embedding".to_string()))?;

        let actual = vector.as_slice().len();
        if actual != EMBED_DIMENSION {
            return Err(Error::DimensionMismatch {
                expected: EMBED_DIMENSION,
                actual,
            });
        }
        Ok(vector)
    }

    /// Semantic hits at or above the threshold, most similar first.
    pub async fn semantic(&self, owner_id: Uuid, query: &str) -> Result<Vec<SimilarMedia>> {
        let vector = self.embed_query(query).await?;

        let ranked = match self.config.strategy {
            VectorStrategy::Index => match self.rank_with_index(owner_id, &vector).await {
                Ok(ranked) => ranked,
                Err(e) => {
                    warn!(
                        subsystem = "search",
                        component = "hybrid_search",
                        error = %e,
                        "Vector index query failed, falling back to brute force"
                    );
                    self.rank_brute_force(owner_id, &vector).await?
                }
            },
            VectorStrategy::BruteForce => self.rank_brute_force(owner_id, &vector).await?,
        };

        let threshold = self.config.similarity_threshold;
        Ok(ranked
            .into_iter()
            .filter(|hit| hit.similarity >= threshold)
            .collect())
    }

    async fn rank_with_index(&self, owner_id: Uuid, vector: &Vector) -> Result<Vec<SimilarMedia>> {
        let mut hits = self
            .media
            .find_similar(owner_id, vector, self.config.index_candidates)
            .await?;
        for hit in &mut hits {
            hit.similarity = if hit.similarity.is_nan() {
                0.0
            } else {
                hit.similarity.clamp(0.0, 1.0)
            };
        }
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        Ok(hits)
    }

    async fn rank_brute_force(&self, owner_id: Uuid, vector: &Vector) -> Result<Vec<SimilarMedia>> {
        let stored = self.media.embeddings_for_owner(owner_id).await?;
        let query = vector.as_slice();

        let mut hits: Vec<SimilarMedia> = stored
            .into_iter()
            .map(|e| SimilarMedia {
                similarity: cosine_similarity(query, e.vector.as_slice()),
                media: e.media,
            })
            .collect();
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        Ok(hits)
    }

    /// Keyword hits, newest first.
    pub async fn keyword(&self, owner_id: Uuid, query: &str) -> Result<Vec<MediaDetails>> {
        let terms = keyword_terms(query);
        if terms.is_empty() {
            return Ok(Vec::new());
        }
        self.media
            .keyword_search(owner_id, &terms, self.config.limit as i64)
            .await
    }
}

/// Lowercased whitespace-separated query terms.
pub fn keyword_terms(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

#[async_trait]
impl HybridSearch for HybridSearchEngine {
    #[instrument(
        skip(self, query),
        fields(subsystem = "search", component = "hybrid_search", op = "search", strategy = %self.config.strategy)
    )]
    async fn search(&self, owner_id: Uuid, query: &str) -> Result<Vec<SearchResult>> {
        let start = Instant::now();
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let semantic = match self.semantic(owner_id, query).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "Semantic search failed, continuing with keyword results");
                Vec::new()
            }
        };

        let keyword = self.keyword(owner_id, query).await?;

        for hit in &semantic {
            debug!(media_id = %hit.media.media_id, similarity = hit.similarity, "Semantic hit");
        }

        let results = fuse(&semantic, &keyword, self.config.limit);

        info!(
            semantic_hits = semantic.len(),
            keyword_hits = keyword.len(),
            result_count = results.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Hybrid search complete"
        );

        Ok(results)
    }
}
