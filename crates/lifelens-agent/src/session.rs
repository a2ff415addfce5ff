//! Conversation sessions: history, persistence and titles around the
//! orchestration loop.
//!
//! A message is answered in four steps. Prior turns are loaded (the most
//! recent window), the user turn is persisted, the loop runs, and the
//! assistant turn is persisted if the answer has text. The first exchange
//! of a conversation also sets its title.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use lifelens_core::defaults::{
    HISTORY_WINDOW, PAGE_LIMIT_MAX, TITLE_FALLBACK_WORDS, TITLE_MAX_CHARS,
};
use lifelens_core::events::NO_RESPONSE_MESSAGE;
use lifelens_core::text::truncate_chars;
use lifelens_core::{
    Conversation, ConversationRepository, ConversationTurn, Error, ModelMessage, ModelRequest,
    NewTurn, Result, StreamEvent, ToolCall, TurnRole, DEFAULT_CONVERSATION_TITLE,
};

use crate::orchestrator::{Orchestrator, QueryContext};
use crate::prompt::title_prompt;
use crate::stream::{seal, EventStream};

const EVENT_BUFFER: usize = 64;

/// Answer to a persisted message.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    pub conversation_id: Uuid,
    pub message_id: i64,
    pub response: String,
    pub function_calls: Vec<ToolCall>,
}

/// Conversation-level operations over a repository and an orchestrator.
pub struct ChatService {
    conversations: Arc<dyn ConversationRepository>,
    orchestrator: Arc<Orchestrator>,
    history_window: usize,
}

impl ChatService {
    pub fn new(conversations: Arc<dyn ConversationRepository>, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            conversations,
            orchestrator,
            history_window: HISTORY_WINDOW,
        }
    }

    /// Number of prior turns sent to the model with a new message.
    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub async fn create_conversation(&self, owner_id: Uuid, title: Option<&str>) -> Result<Conversation> {
        let title = title
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_CONVERSATION_TITLE);
        let conversation = self.conversations.create(owner_id, title).await?;
        info!(owner_id = %owner_id, conversation_id = %conversation.id, "Conversation created");
        Ok(conversation)
    }

    pub async fn get_conversation(&self, owner_id: Uuid, id: Uuid) -> Result<Option<Conversation>> {
        self.conversations.get(owner_id, id).await
    }

    /// Most recently updated first. `limit` is clamped to 1..=100.
    pub async fn list_conversations(&self, owner_id: Uuid, skip: i64, limit: i64) -> Result<Vec<Conversation>> {
        self.conversations
            .list(owner_id, skip.max(0), limit.clamp(1, PAGE_LIMIT_MAX))
            .await
    }

    /// Turns in order. Fails with `ConversationNotFound` for conversations
    /// the owner cannot see.
    pub async fn list_turns(
        &self,
        owner_id: Uuid,
        conversation_id: Uuid,
        limit: Option<i64>,
    ) -> Result<Vec<ConversationTurn>> {
        self.require_conversation(owner_id, conversation_id).await?;
        self.conversations
            .list_turns(owner_id, conversation_id, limit.map(|l| l.max(1)))
            .await
    }

    pub async fn rename(&self, owner_id: Uuid, id: Uuid, title: &str) -> Result<Conversation> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::InvalidInput("Title must not be empty".to_string()));
        }
        if !self.conversations.update_title(owner_id, id, title).await? {
            return Err(Error::ConversationNotFound(id));
        }
        self.require_conversation(owner_id, id).await
    }

    /// Returns false when there was nothing to delete.
    pub async fn delete(&self, owner_id: Uuid, id: Uuid) -> Result<bool> {
        let deleted = self.conversations.delete(owner_id, id).await?;
        if deleted {
            info!(owner_id = %owner_id, conversation_id = %id, "Conversation deleted");
        }
        Ok(deleted)
    }

    /// Answer `message` in a conversation and persist both turns.
    #[instrument(
        skip(self, message),
        fields(subsystem = "agent", component = "session", op = "run_query")
    )]
    pub async fn run_query(&self, owner_id: Uuid, conversation_id: Uuid, message: &str) -> Result<ChatReply> {
        let (ctx, first_exchange) = self.begin(owner_id, conversation_id, message).await?;
        let outcome = self.orchestrator.run(ctx).await?;

        if outcome.text.is_empty() {
            warn!("Model produced no answer text");
            return Err(Error::Inference(NO_RESPONSE_MESSAGE.to_string()));
        }

        let turn = self
            .conversations
            .append_turn(
                owner_id,
                conversation_id,
                NewTurn::assistant(outcome.text.clone(), outcome.tool_calls.clone()),
            )
            .await?;

        if first_exchange {
            self.set_title(owner_id, conversation_id, message).await;
        }

        Ok(ChatReply {
            conversation_id,
            message_id: turn.id,
            response: outcome.text,
            function_calls: outcome.tool_calls,
        })
    }

    /// Answer `message` as a stream of events.
    ///
    /// The exchange runs in its own task. Dropping the returned stream cancels
    /// the in-flight model call, and nothing is persisted for the unfinished
    /// answer.
    pub fn run_query_stream(
        self: &Arc<Self>,
        owner_id: Uuid,
        conversation_id: Uuid,
        message: String,
    ) -> EventStream {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let service = Arc::clone(self);

        tokio::spawn(async move {
            let exchange = service.stream_exchange(owner_id, conversation_id, &message, &tx);
            let terminal = tokio::select! {
                result = exchange => match result {
                    Ok(Some(message_id)) => StreamEvent::Done { message_id },
                    Ok(None) => StreamEvent::error(NO_RESPONSE_MESSAGE),
                    Err(Error::ConversationNotFound(_)) => StreamEvent::error("Conversation not found"),
                    Err(e) => {
                        error!(conversation_id = %conversation_id, error = %e, "Streaming query failed");
                        StreamEvent::error(e.to_string())
                    }
                },
                _ = tx.closed() => {
                    info!(conversation_id = %conversation_id, "Client disconnected, query cancelled");
                    return;
                }
            };
            // The receiver may already be gone; nothing else to do then.
            let _ = tx.send(terminal).await;
        });

        seal(ReceiverStream::new(rx))
    }

    /// Single-shot answer with no history and nothing persisted.
    #[instrument(skip(self, query), fields(subsystem = "agent", component = "session", op = "answer"))]
    pub async fn answer(&self, owner_id: Uuid, query: &str) -> Result<String> {
        let outcome = self.orchestrator.run(QueryContext::new(owner_id, query)).await?;
        if outcome.text.is_empty() {
            return Err(Error::Inference(NO_RESPONSE_MESSAGE.to_string()));
        }
        Ok(outcome.text)
    }

    /// `Some(message_id)` once the assistant turn is stored, `None` when the
    /// model produced no text.
    async fn stream_exchange(
        &self,
        owner_id: Uuid,
        conversation_id: Uuid,
        message: &str,
        events: &mpsc::Sender<StreamEvent>,
    ) -> Result<Option<i64>> {
        let (ctx, first_exchange) = self.begin(owner_id, conversation_id, message).await?;
        let outcome = self.orchestrator.run_stream(ctx, events).await?;

        if outcome.text.is_empty() {
            warn!(conversation_id = %conversation_id, "Model produced no answer text");
            return Ok(None);
        }

        let turn = self
            .conversations
            .append_turn(
                owner_id,
                conversation_id,
                NewTurn::assistant(outcome.text, outcome.tool_calls),
            )
            .await?;

        if first_exchange {
            self.set_title(owner_id, conversation_id, message).await;
        }
        Ok(Some(turn.id))
    }

    /// Load history and persist the user turn. Returns the loop input and
    /// whether this is the conversation's first exchange.
    async fn begin(&self, owner_id: Uuid, conversation_id: Uuid, message: &str) -> Result<(QueryContext, bool)> {
        let message = message.trim();
        if message.is_empty() {
            return Err(Error::InvalidInput("Message must not be empty".to_string()));
        }
        self.require_conversation(owner_id, conversation_id).await?;

        let prior = if self.history_window == 0 {
            Vec::new()
        } else {
            self.conversations
                .list_turns(owner_id, conversation_id, Some(self.history_window as i64))
                .await?
        };
        // The window can be empty even when turns exist.
        let first_exchange = prior.is_empty()
            && self
                .conversations
                .list_turns(owner_id, conversation_id, Some(1))
                .await?
                .is_empty();
        let history: Vec<ModelMessage> = prior.iter().filter_map(to_model_message).collect();
        debug!(history = history.len(), "Loaded conversation history");

        self.conversations
            .append_turn(owner_id, conversation_id, NewTurn::user(message))
            .await?;

        let ctx = QueryContext::new(owner_id, message).with_history(history);
        Ok((ctx, first_exchange))
    }

    async fn require_conversation(&self, owner_id: Uuid, id: Uuid) -> Result<Conversation> {
        self.conversations
            .get(owner_id, id)
            .await?
            .ok_or(Error::ConversationNotFound(id))
    }

    async fn set_title(&self, owner_id: Uuid, conversation_id: Uuid, first_message: &str) {
        let title = self.generate_title(first_message).await;
        match self.conversations.update_title(owner_id, conversation_id, &title).await {
            Ok(_) => debug!(conversation_id = %conversation_id, title = %title, "Conversation titled"),
            Err(e) => warn!(conversation_id = %conversation_id, error = %e, "Failed to store title"),
        }
    }

    /// Title from the model, or the first words of the message when the
    /// model fails or returns nothing usable.
    pub async fn generate_title(&self, first_message: &str) -> String {
        let request = ModelRequest {
            system: None,
            messages: vec![ModelMessage::user(title_prompt(first_message))],
            tools: Vec::new(),
        };

        match self.orchestrator.model().generate(&request).await {
            Ok(response) => {
                let title = clean_title(response.text.as_deref().unwrap_or_default());
                if !title.is_empty() {
                    return title;
                }
            }
            Err(e) => warn!(error = %e, "Title generation failed"),
        }
        fallback_title(first_message)
    }
}

fn to_model_message(turn: &ConversationTurn) -> Option<ModelMessage> {
    match turn.role {
        TurnRole::User => Some(ModelMessage::user(turn.content.clone())),
        TurnRole::Assistant => Some(ModelMessage::assistant(turn.content.clone())),
        TurnRole::System => None,
    }
}

fn clean_title(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches(|c| c == '"' || c == '\'').trim();
    truncate_chars(trimmed, TITLE_MAX_CHARS).to_string()
}

fn fallback_title(message: &str) -> String {
    let words: Vec<&str> = message.split_whitespace().collect();
    if words.is_empty() {
        return DEFAULT_CONVERSATION_TITLE.to_string();
    }
    let head = words[..words.len().min(TITLE_FALLBACK_WORDS)].join(" ");
    if words.len() > TITLE_FALLBACK_WORDS {
        format!("{}...", head)
    } else {
        head
    }
}
