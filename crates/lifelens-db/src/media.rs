//! Media repository implementation.
//!
//! Every query joins `media` to `media_metadata` and filters on
//! `media.owner_id`. The metadata timestamp is the one exposed as
//! `created_at`.

use std::collections::HashMap;

use async_trait::async_trait;
use pgvector::Vector;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

use lifelens_core::{
    Error, MediaDetails, MediaEmbedding, MediaRepository, MediaType, Result, SimilarMedia,
    TimeRange,
};

use crate::escape_like;

const MEDIA_SELECT: &str = "SELECT m.id AS media_id, m.owner_id, m.file_name, m.file_type, \
     m.mime_type, mm.created_at, mm.caption, mm.ocr_text, mm.transcript, mm.summary, mm.topics";

const MEDIA_FROM: &str = "FROM media m JOIN media_metadata mm ON mm.media_id = m.id";

/// PostgreSQL implementation of MediaRepository.
pub struct PgMediaRepository {
    pool: Pool<Postgres>,
}

impl PgMediaRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn media_from_row(row: &PgRow) -> Result<MediaDetails> {
    let file_type: String = row.get("file_type");
    Ok(MediaDetails {
        media_id: row.get("media_id"),
        owner_id: row.get("owner_id"),
        file_name: row.get("file_name"),
        file_type: file_type.parse::<MediaType>()?,
        mime_type: row.get("mime_type"),
        created_at: row.get("created_at"),
        caption: row.get("caption"),
        ocr_text: row.get("ocr_text"),
        transcript: row.get("transcript"),
        summary: row.get("summary"),
        topics: row.get("topics"),
    })
}

#[async_trait]
impl MediaRepository for PgMediaRepository {
    #[instrument(skip(self), fields(subsystem = "db", component = "media", op = "list_in_range"))]
    async fn list_in_range(
        &self,
        owner_id: Uuid,
        range: TimeRange,
        limit: i64,
    ) -> Result<Vec<MediaDetails>> {
        let query = format!(
            "{MEDIA_SELECT} {MEDIA_FROM}
             WHERE m.owner_id = $1 AND mm.created_at >= $2 AND mm.created_at <= $3
             ORDER BY mm.created_at DESC
             LIMIT $4"
        );
        let rows = sqlx::query(&query)
            .bind(owner_id)
            .bind(range.start)
            .bind(range.end)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        rows.iter().map(media_from_row).collect()
    }

    async fn get_details(&self, owner_id: Uuid, ids: &[Uuid]) -> Result<Vec<MediaDetails>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!("{MEDIA_SELECT} {MEDIA_FROM} WHERE m.owner_id = $1 AND m.id = ANY($2)");
        let rows = sqlx::query(&query)
            .bind(owner_id)
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        let mut by_id: HashMap<Uuid, MediaDetails> = rows
            .iter()
            .map(|row| media_from_row(row).map(|m| (m.media_id, m)))
            .collect::<Result<_>>()?;

        // Requested order, first occurrence wins.
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn count(&self, owner_id: Uuid, media_type: Option<MediaType>) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM media
             WHERE owner_id = $1 AND ($2::text IS NULL OR file_type = $2)",
        )
        .bind(owner_id)
        .bind(media_type.map(|t| t.as_str()))
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(count)
    }

    async fn recent_with_text(&self, owner_id: Uuid, limit: i64) -> Result<Vec<MediaDetails>> {
        let query = format!(
            "{MEDIA_SELECT} {MEDIA_FROM}
             WHERE m.owner_id = $1 AND mm.ocr_text IS NOT NULL AND mm.ocr_text <> ''
             ORDER BY mm.created_at DESC
             LIMIT $2"
        );
        let rows = sqlx::query(&query)
            .bind(owner_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        rows.iter().map(media_from_row).collect()
    }

    #[instrument(skip(self), fields(subsystem = "db", component = "media", op = "keyword_search"))]
    async fn keyword_search(
        &self,
        owner_id: Uuid,
        terms: &[String],
        limit: i64,
    ) -> Result<Vec<MediaDetails>> {
        let patterns: Vec<String> = terms
            .iter()
            .filter(|t| !t.is_empty())
            .map(|t| format!("%{}%", escape_like(t)))
            .collect();
        if patterns.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!(
            "{MEDIA_SELECT} {MEDIA_FROM}
             WHERE m.owner_id = $1
               AND (mm.caption ILIKE ANY($2)
                    OR mm.ocr_text ILIKE ANY($2)
                    OR mm.transcript ILIKE ANY($2)
                    OR mm.summary ILIKE ANY($2))
             ORDER BY mm.created_at DESC
             LIMIT $3"
        );
        let rows = sqlx::query(&query)
            .bind(owner_id)
            .bind(&patterns)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        debug!(result_count = rows.len(), "Keyword query complete");
        rows.iter().map(media_from_row).collect()
    }

    #[instrument(skip(self, query), fields(subsystem = "db", component = "media", op = "find_similar"))]
    async fn find_similar(
        &self,
        owner_id: Uuid,
        query: &Vector,
        limit: i64,
    ) -> Result<Vec<SimilarMedia>> {
        let sql = format!(
            "{MEDIA_SELECT}, 1.0 - (mm.embedding <=> $2) AS similarity {MEDIA_FROM}
             WHERE m.owner_id = $1 AND mm.embedding IS NOT NULL
             ORDER BY mm.embedding <=> $2
             LIMIT $3"
        );
        let rows = sqlx::query(&sql)
            .bind(owner_id)
            .bind(query)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        rows.iter()
            .map(|row| {
                Ok(SimilarMedia {
                    media: media_from_row(row)?,
                    similarity: row.get::<f64, _>("similarity") as f32,
                })
            })
            .collect()
    }

    async fn embeddings_for_owner(&self, owner_id: Uuid) -> Result<Vec<MediaEmbedding>> {
        let sql = format!(
            "{MEDIA_SELECT}, mm.embedding, mm.embedding_source {MEDIA_FROM}
             WHERE m.owner_id = $1 AND mm.embedding IS NOT NULL
             ORDER BY mm.created_at DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        rows.iter()
            .map(|row| {
                Ok(MediaEmbedding {
                    media: media_from_row(row)?,
                    vector: row.get("embedding"),
                    source_field: row.get("embedding_source"),
                })
            })
            .collect()
    }
}
