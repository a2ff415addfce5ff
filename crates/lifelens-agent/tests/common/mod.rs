//! Shared setup for agent integration tests: in-memory store, scripted
//! model, mock embeddings.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use lifelens_agent::{ChatService, Orchestrator, OrchestratorConfig, ToolDispatcher};
use lifelens_core::{
    Clock, MediaDetails, MediaType, ModelMessage, ModelRole, SystemClock, ToolArguments, ToolCall,
};
use lifelens_db::InMemoryStore;
use lifelens_inference::mock::{MockEmbeddingBackend, ScriptedModelBackend};
use lifelens_search::HybridSearchEngine;

pub struct Harness {
    pub owner: Uuid,
    pub store: Arc<InMemoryStore>,
    pub model: Arc<ScriptedModelBackend>,
    pub orchestrator: Arc<Orchestrator>,
    pub chat: Arc<ChatService>,
}

pub struct HarnessBuilder {
    model: ScriptedModelBackend,
    embedder: MockEmbeddingBackend,
    config: OrchestratorConfig,
    clock: Arc<dyn Clock>,
    history_window: Option<usize>,
}

impl HarnessBuilder {
    pub fn new(model: ScriptedModelBackend) -> Self {
        Self {
            model,
            embedder: MockEmbeddingBackend::new(),
            config: OrchestratorConfig::default(),
            clock: Arc::new(SystemClock),
            history_window: None,
        }
    }

    pub fn embedder(mut self, embedder: MockEmbeddingBackend) -> Self {
        self.embedder = embedder;
        self
    }

    pub fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn history_window(mut self, window: usize) -> Self {
        self.history_window = Some(window);
        self
    }

    pub fn build(self) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let model = Arc::new(self.model);
        let search = Arc::new(HybridSearchEngine::new(store.clone(), Arc::new(self.embedder)));
        let dispatcher = ToolDispatcher::new(store.clone(), search).with_clock(self.clock);
        let orchestrator =
            Arc::new(Orchestrator::new(model.clone(), dispatcher).with_config(self.config));
        let mut chat = ChatService::new(store.clone(), orchestrator.clone());
        if let Some(window) = self.history_window {
            chat = chat.with_history_window(window);
        }
        Harness {
            owner: Uuid::new_v4(),
            store,
            model,
            orchestrator,
            chat: Arc::new(chat),
        }
    }
}

pub fn harness(model: ScriptedModelBackend) -> Harness {
    HarnessBuilder::new(model).build()
}

pub fn call(name: &str, args: Value) -> ToolCall {
    let arguments = match args {
        Value::Object(map) => map,
        _ => ToolArguments::new(),
    };
    ToolCall::new("", name, arguments)
}

pub fn call_with_id(id: &str, name: &str, args: Value) -> ToolCall {
    let mut call = call(name, args);
    call.id = id.to_string();
    call
}

pub fn image(owner: Uuid, name: &str, at: DateTime<Utc>, ocr: Option<&str>) -> MediaDetails {
    MediaDetails {
        media_id: Uuid::new_v4(),
        owner_id: owner,
        file_name: name.to_string(),
        file_type: MediaType::Image,
        mime_type: "image/jpeg".to_string(),
        created_at: at,
        caption: None,
        ocr_text: ocr.map(str::to_string),
        transcript: None,
        summary: None,
        topics: Vec::new(),
    }
}

/// Tool messages of a request, in order.
pub fn tool_messages(messages: &[ModelMessage]) -> Vec<&ModelMessage> {
    messages.iter().filter(|m| m.role == ModelRole::Tool).collect()
}

/// Parsed payload of a tool message.
pub fn payload(message: &ModelMessage) -> Value {
    serde_json::from_str(&message.content).unwrap()
}
