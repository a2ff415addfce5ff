//! Conversation and turn repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use tracing::{debug, instrument};
use uuid::Uuid;

use lifelens_core::{
    Conversation, ConversationRepository, ConversationTurn, Error, NewTurn, Result, ToolCall,
    TurnRole,
};

/// PostgreSQL implementation of ConversationRepository.
pub struct PgConversationRepository {
    pool: Pool<Postgres>,
}

impl PgConversationRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn conversation_from_row(row: &PgRow) -> Conversation {
    Conversation {
        id: row.get("id"),
        owner_id: row.get("owner_id"),
        title: row.get("title"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn turn_from_row(row: &PgRow) -> Result<ConversationTurn> {
    let role: String = row.get("role");
    let tool_calls = row
        .get::<Option<serde_json::Value>, _>("tool_calls")
        .map(serde_json::from_value::<Vec<ToolCall>>)
        .transpose()?;

    Ok(ConversationTurn {
        id: row.get("id"),
        conversation_id: row.get("conversation_id"),
        role: role.parse::<TurnRole>()?,
        content: row.get("content"),
        ordinal: row.get("ordinal"),
        created_at: row.get("created_at"),
        tool_calls,
    })
}

#[async_trait]
impl ConversationRepository for PgConversationRepository {
    async fn create(&self, owner_id: Uuid, title: &str) -> Result<Conversation> {
        let now = Utc::now();
        let row = sqlx::query(
            "INSERT INTO conversation (id, owner_id, title, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $4)
             RETURNING id, owner_id, title, created_at, updated_at",
        )
        .bind(Uuid::now_v7())
        .bind(owner_id)
        .bind(title)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(conversation_from_row(&row))
    }

    async fn get(&self, owner_id: Uuid, id: Uuid) -> Result<Option<Conversation>> {
        let row = sqlx::query(
            "SELECT id, owner_id, title, created_at, updated_at
             FROM conversation
             WHERE id = $1 AND owner_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.as_ref().map(conversation_from_row))
    }

    async fn list(&self, owner_id: Uuid, skip: i64, limit: i64) -> Result<Vec<Conversation>> {
        let rows = sqlx::query(
            "SELECT id, owner_id, title, created_at, updated_at
             FROM conversation
             WHERE owner_id = $1
             ORDER BY updated_at DESC
             OFFSET $2 LIMIT $3",
        )
        .bind(owner_id)
        .bind(skip)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.iter().map(conversation_from_row).collect())
    }

    #[instrument(
        skip(self, turn),
        fields(subsystem = "db", component = "conversations", op = "append_turn", role = turn.role.as_str())
    )]
    async fn append_turn(
        &self,
        owner_id: Uuid,
        conversation_id: Uuid,
        turn: NewTurn,
    ) -> Result<ConversationTurn> {
        let tool_calls = turn
            .tool_calls
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        // Row lock serializes ordinal assignment per conversation.
        let owned = sqlx::query(
            "SELECT id FROM conversation WHERE id = $1 AND owner_id = $2 FOR UPDATE",
        )
        .bind(conversation_id)
        .bind(owner_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(Error::Database)?;
        if owned.is_none() {
            return Err(Error::ConversationNotFound(conversation_id));
        }

        let row = sqlx::query(
            "INSERT INTO conversation_turn (conversation_id, ordinal, role, content, tool_calls, created_at)
             VALUES (
                 $1,
                 (SELECT COALESCE(MAX(ordinal), 0) + 1 FROM conversation_turn WHERE conversation_id = $1),
                 $2, $3, $4, $5
             )
             RETURNING id, conversation_id, ordinal, role, content, tool_calls, created_at",
        )
        .bind(conversation_id)
        .bind(turn.role.as_str())
        .bind(&turn.content)
        .bind(tool_calls)
        .bind(now)
        .fetch_one(&mut *tx)
        .await
        .map_err(Error::Database)?;

        sqlx::query("UPDATE conversation SET updated_at = $2 WHERE id = $1")
            .bind(conversation_id)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;

        let stored = turn_from_row(&row)?;
        debug!(ordinal = stored.ordinal, "Turn appended");
        Ok(stored)
    }

    async fn list_turns(
        &self,
        owner_id: Uuid,
        conversation_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<ConversationTurn>> {
        // LIMIT NULL means no limit.
        let rows = sqlx::query(
            "SELECT t.id, t.conversation_id, t.ordinal, t.role, t.content, t.tool_calls, t.created_at
             FROM conversation_turn t
             JOIN conversation c ON c.id = t.conversation_id
             WHERE c.id = $1 AND c.owner_id = $2
             ORDER BY t.ordinal DESC
             LIMIT $3",
        )
        .bind(conversation_id)
        .bind(owner_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        let mut turns = rows.iter().map(turn_from_row).collect::<Result<Vec<_>>>()?;
        turns.reverse();
        Ok(turns)
    }

    async fn update_title(&self, owner_id: Uuid, id: Uuid, title: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE conversation SET title = $3, updated_at = now()
             WHERE id = $1 AND owner_id = $2",
        )
        .bind(id)
        .bind(owner_id)
        .bind(title)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<bool> {
        // Turns go with the conversation (ON DELETE CASCADE).
        let result = sqlx::query("DELETE FROM conversation WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(result.rows_affected() > 0)
    }
}
