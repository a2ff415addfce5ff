//! Shared handler state and its construction from configuration.

use std::sync::Arc;

use tracing::{info, warn};

use lifelens_agent::{ChatService, Orchestrator, OrchestratorConfig, ToolDispatcher};
use lifelens_core::{ConversationRepository, EmbeddingBackend, MediaRepository, ModelBackend};
use lifelens_db::{vector_extension_version, Database, InMemoryStore, PoolConfig};
use lifelens_inference::OpenAIBackend;
use lifelens_search::{HybridSearchConfig, HybridSearchEngine};

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
}

impl AppState {
    pub fn new(chat: Arc<ChatService>) -> Self {
        Self { chat }
    }

    /// Wire the chat service from its parts.
    pub fn assemble(
        config: &ServerConfig,
        media: Arc<dyn MediaRepository>,
        conversations: Arc<dyn ConversationRepository>,
        model: Arc<dyn ModelBackend>,
        embedder: Arc<dyn EmbeddingBackend>,
    ) -> Self {
        let search = HybridSearchEngine::new(media.clone(), embedder).with_config(
            HybridSearchConfig::default()
                .with_strategy(config.vector_strategy)
                .with_similarity_threshold(config.similarity_threshold),
        );
        let dispatcher = ToolDispatcher::new(media, Arc::new(search));
        let orchestrator = Orchestrator::new(model, dispatcher).with_config(
            OrchestratorConfig::default().with_max_iterations(config.max_iterations),
        );
        let chat = ChatService::new(conversations, Arc::new(orchestrator))
            .with_history_window(config.history_window);
        Self::new(Arc::new(chat))
    }
}

/// Connect the store and the model backend described by `config` and the
/// `OPENAI_*` environment.
pub async fn build_state(config: &ServerConfig) -> anyhow::Result<AppState> {
    let backend = Arc::new(OpenAIBackend::from_env()?);
    info!(
        model = %backend.config().gen_model,
        embed_model = %backend.config().embed_model,
        "Model backend configured"
    );

    let media: Arc<dyn MediaRepository>;
    let conversations: Arc<dyn ConversationRepository>;
    match &config.database_url {
        Some(url) => {
            let db = Database::connect_with_config(
                url,
                PoolConfig::new().with_max_connections(config.db_max_connections),
            )
            .await?;
            db.migrate().await?;
            vector_extension_version(&db.pool).await?;
            info!("Connected to database");
            media = db.media.clone();
            conversations = db.conversations.clone();
        }
        None => {
            warn!("DATABASE_URL not set, using the in-memory store");
            let store = Arc::new(InMemoryStore::new());
            media = store.clone();
            conversations = store;
        }
    }

    Ok(AppState::assemble(
        config,
        media,
        conversations,
        backend.clone(),
        backend,
    ))
}
