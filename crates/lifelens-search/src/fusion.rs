//! Score fusion for semantic and keyword results.
//!
//! A semantic hit scores its similarity. A keyword hit for an id not yet seen
//! scores `KEYWORD_WEIGHT` (keyword relevance is always 1.0). A keyword hit
//! for an id already found semantically adds `HYBRID_BONUS` once and marks the
//! result hybrid. Output is sorted by score descending with a stable sort, so
//! ties keep retrieval order: semantic hits first, then keyword-only hits.

use std::collections::HashMap;

use tracing::debug;
use uuid::Uuid;

use lifelens_core::defaults::{HYBRID_BONUS, KEYWORD_WEIGHT, SNIPPET_LENGTH};
use lifelens_core::text::truncate_chars;
use lifelens_core::{MediaDetails, Provenance, SearchResult, SimilarMedia};

/// Build a search result row from a media record.
pub fn to_search_result(media: &MediaDetails, score: f32, provenance: Provenance) -> SearchResult {
    let (content, content_type) = media.content();
    SearchResult {
        media_id: media.media_id,
        file_name: media.file_name.clone(),
        file_type: media.file_type,
        created_at: media.created_at,
        caption: media.caption.clone(),
        excerpt: content.map(|c| truncate_chars(c, SNIPPET_LENGTH).to_string()),
        content_type: content_type.to_string(),
        combined_score: score,
        provenance,
    }
}

/// Merge semantic and keyword hits by media id and keep the top `limit`.
pub fn fuse(semantic: &[SimilarMedia], keyword: &[MediaDetails], limit: usize) -> Vec<SearchResult> {
    let mut results: Vec<SearchResult> = Vec::with_capacity(semantic.len() + keyword.len());
    let mut index: HashMap<Uuid, usize> = HashMap::new();

    for hit in semantic {
        if index.contains_key(&hit.media.media_id) {
            continue;
        }
        index.insert(hit.media.media_id, results.len());
        results.push(to_search_result(&hit.media, hit.similarity, Provenance::Semantic));
    }

    for media in keyword {
        match index.get(&media.media_id) {
            Some(&pos) => {
                let existing = &mut results[pos];
                if existing.provenance == Provenance::Semantic {
                    existing.combined_score += HYBRID_BONUS;
                    existing.provenance = Provenance::Hybrid;
                }
            }
            None => {
                index.insert(media.media_id, results.len());
                results.push(to_search_result(media, KEYWORD_WEIGHT, Provenance::Keyword));
            }
        }
    }

    results.sort_by(|a, b| b.combined_score.total_cmp(&a.combined_score));
    results.truncate(limit);

    debug!(
        semantic_hits = semantic.len(),
        keyword_hits = keyword.len(),
        result_count = results.len(),
        "Fusion complete"
    );

    results
}
