//! # lifelens-db
//!
//! PostgreSQL database layer for lifelens.
//!
//! This crate provides:
//! - Connection pool management
//! - Owner-scoped media queries (time range, keyword, pgvector similarity)
//! - Conversation and turn persistence
//! - An in-memory store implementing the same repository traits
//!
//! ## Example
//!
//! ```rust,ignore
//! use lifelens_db::{Database, ConversationRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/lifelens").await?;
//!     let owner = uuid::Uuid::new_v4();
//!     let conversation = db.conversations.create(owner, "New Conversation").await?;
//!     println!("Created conversation: {}", conversation.id);
//!     Ok(())
//! }
//! ```

pub mod conversations;
pub mod media;
pub mod memory;
pub mod pool;

// Always compiled so integration tests (in tests/) can use the fixtures.
pub mod test_fixtures;

// Re-export core types
pub use lifelens_core::*;

pub use conversations::PgConversationRepository;
pub use media::PgMediaRepository;
pub use memory::InMemoryStore;
pub use pool::{create_pool, create_pool_with_config, vector_extension_version, PoolConfig};

/// Escape LIKE/ILIKE wildcard characters (`%`, `_`, `\`) in user input.
pub fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Combined database context with all repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    pub media: std::sync::Arc<PgMediaRepository>,
    pub conversations: std::sync::Arc<PgConversationRepository>,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            media: std::sync::Arc::new(PgMediaRepository::new(pool.clone())),
            conversations: std::sync::Arc::new(PgConversationRepository::new(pool.clone())),
            pool,
        }
    }

    /// Connect with the default pool configuration.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Connect with a custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}
