//! Conversation sessions: persistence, titles, streaming and cancellation.

mod common;

use std::time::Duration;

use futures::StreamExt;
use serde_json::json;
use uuid::Uuid;

use lifelens_core::events::{NO_RESPONSE_MESSAGE, STREAM_ENDED_MESSAGE};
use lifelens_core::{
    ConversationRepository, Error, ModelResponse, NewTurn, StreamEvent, TurnRole,
    DEFAULT_CONVERSATION_TITLE,
};
use lifelens_inference::mock::ScriptedModelBackend;

use common::{call, harness, HarnessBuilder};

/// Poll `check` until it holds or a second has passed.
async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}

#[tokio::test]
async fn test_first_exchange_persists_user_then_assistant() {
    let model = ScriptedModelBackend::new()
        .with_text("You have no photos yet.")
        .with_text("Photo Count");
    let h = harness(model);
    let conversation = h.chat.create_conversation(h.owner, None).await.unwrap();
    assert_eq!(conversation.title, DEFAULT_CONVERSATION_TITLE);

    let reply = h
        .chat
        .run_query(h.owner, conversation.id, "How many photos do I have?")
        .await
        .unwrap();
    assert_eq!(reply.response, "You have no photos yet.");
    assert_eq!(reply.conversation_id, conversation.id);
    assert!(reply.function_calls.is_empty());

    let turns = h.chat.list_turns(h.owner, conversation.id, None).await.unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, TurnRole::User);
    assert_eq!(turns[0].content, "How many photos do I have?");
    assert_eq!(turns[1].role, TurnRole::Assistant);
    assert_eq!(turns[1].id, reply.message_id);
    assert!(turns[0].ordinal < turns[1].ordinal);

    let titled = h.chat.get_conversation(h.owner, conversation.id).await.unwrap().unwrap();
    assert_eq!(titled.title, "Photo Count");
}

#[tokio::test]
async fn test_title_generated_only_on_first_exchange() {
    let model = ScriptedModelBackend::new()
        .with_text("first answer")
        .with_text("\"Trip Photos\"")
        .with_text("second answer")
        .with_text("Should Not Be Used");
    let h = harness(model);
    let conversation = h.chat.create_conversation(h.owner, None).await.unwrap();

    h.chat.run_query(h.owner, conversation.id, "first").await.unwrap();
    h.chat.run_query(h.owner, conversation.id, "second").await.unwrap();

    let conversation = h.chat.get_conversation(h.owner, conversation.id).await.unwrap().unwrap();
    assert_eq!(conversation.title, "Trip Photos");
    assert_eq!(h.model.call_count(), 3);
}

#[tokio::test]
async fn test_title_falls_back_to_first_words() {
    let model = ScriptedModelBackend::new()
        .with_text("Here is what I found.")
        .with_failure("title model offline");
    let h = harness(model);
    let conversation = h.chat.create_conversation(h.owner, None).await.unwrap();

    h.chat
        .run_query(h.owner, conversation.id, "what receipts did I scan last week")
        .await
        .unwrap();

    let conversation = h.chat.get_conversation(h.owner, conversation.id).await.unwrap().unwrap();
    assert_eq!(conversation.title, "what receipts did I scan...");
}

#[tokio::test]
async fn test_zero_history_window_titles_once() {
    let model = ScriptedModelBackend::new()
        .with_text("first answer")
        .with_text("First Title")
        .with_text("second answer")
        .with_text("Second Title");
    let h = HarnessBuilder::new(model).history_window(0).build();
    let conversation = h.chat.create_conversation(h.owner, None).await.unwrap();

    h.chat.run_query(h.owner, conversation.id, "first").await.unwrap();
    h.chat.run_query(h.owner, conversation.id, "second").await.unwrap();

    let conversation = h.chat.get_conversation(h.owner, conversation.id).await.unwrap().unwrap();
    assert_eq!(conversation.title, "First Title");
    assert_eq!(h.model.call_count(), 3);

    // No prior turns reach the model.
    let request = h.model.requests()[2].clone();
    let contents: Vec<_> = request.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["second"]);
}

#[tokio::test]
async fn test_history_window_limits_prior_turns() {
    let model = ScriptedModelBackend::new().with_text("ok");
    let h = HarnessBuilder::new(model).history_window(4).build();
    let conversation = h.chat.create_conversation(h.owner, Some("Existing")).await.unwrap();
    for i in 0..6 {
        h.store
            .append_turn(h.owner, conversation.id, NewTurn::user(format!("q{}", i)))
            .await
            .unwrap();
        h.store
            .append_turn(h.owner, conversation.id, NewTurn::assistant(format!("a{}", i), vec![]))
            .await
            .unwrap();
    }

    h.chat.run_query(h.owner, conversation.id, "latest").await.unwrap();

    let request = h.model.requests()[0].clone();
    let contents: Vec<_> = request.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["q4", "a4", "q5", "a5", "latest"]);

    // Not a first exchange, so no title call and the title is kept.
    assert_eq!(h.model.call_count(), 1);
    let conversation = h.chat.get_conversation(h.owner, conversation.id).await.unwrap().unwrap();
    assert_eq!(conversation.title, "Existing");
}

#[tokio::test]
async fn test_assistant_turn_keeps_tool_calls() {
    let model = ScriptedModelBackend::new()
        .with_tool_calls(vec![call("count_media", json!({"media_type": "audio"}))])
        .with_text("You have no voice notes.");
    let h = harness(model);
    let conversation = h.chat.create_conversation(h.owner, Some("Audio")).await.unwrap();
    h.store
        .append_turn(h.owner, conversation.id, NewTurn::user("earlier"))
        .await
        .unwrap();

    let reply = h.chat.run_query(h.owner, conversation.id, "voice notes?").await.unwrap();
    assert_eq!(reply.function_calls.len(), 1);
    assert_eq!(reply.function_calls[0].name, "count_media");

    let turns = h.chat.list_turns(h.owner, conversation.id, None).await.unwrap();
    let stored = turns.last().unwrap().tool_calls.clone().unwrap();
    assert_eq!(stored[0].name, "count_media");
    assert_eq!(stored[0].arguments["media_type"], "audio");
}

#[tokio::test]
async fn test_empty_answer_is_an_error_and_not_persisted() {
    let model = ScriptedModelBackend::new().with_response(ModelResponse::default());
    let h = harness(model);
    let conversation = h.chat.create_conversation(h.owner, None).await.unwrap();

    let err = h.chat.run_query(h.owner, conversation.id, "hello").await.unwrap_err();
    assert!(err.to_string().contains(NO_RESPONSE_MESSAGE));

    let turns = h.chat.list_turns(h.owner, conversation.id, None).await.unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].role, TurnRole::User);
}

#[tokio::test]
async fn test_other_owner_cannot_use_conversation() {
    let h = harness(ScriptedModelBackend::new());
    let conversation = h.chat.create_conversation(h.owner, None).await.unwrap();
    let intruder = Uuid::new_v4();

    let err = h.chat.run_query(intruder, conversation.id, "hi").await.unwrap_err();
    assert!(matches!(err, Error::ConversationNotFound(id) if id == conversation.id));
    assert!(h.chat.list_turns(intruder, conversation.id, None).await.is_err());
    assert!(!h.chat.delete(intruder, conversation.id).await.unwrap());
    assert_eq!(h.model.call_count(), 0);
}

#[tokio::test]
async fn test_rename_list_and_delete() {
    let h = harness(ScriptedModelBackend::new());
    let a = h.chat.create_conversation(h.owner, Some("A")).await.unwrap();
    let b = h.chat.create_conversation(h.owner, Some("  ")).await.unwrap();
    assert_eq!(b.title, DEFAULT_CONVERSATION_TITLE);

    let renamed = h.chat.rename(h.owner, a.id, "Renamed").await.unwrap();
    assert_eq!(renamed.title, "Renamed");
    assert!(h.chat.rename(h.owner, a.id, "   ").await.is_err());

    let listed = h.chat.list_conversations(h.owner, 0, 500).await.unwrap();
    assert_eq!(listed.len(), 2);
    let one = h.chat.list_conversations(h.owner, 0, 0).await.unwrap();
    assert_eq!(one.len(), 1);

    assert!(h.chat.delete(h.owner, a.id).await.unwrap());
    assert!(h.chat.get_conversation(h.owner, a.id).await.unwrap().is_none());
    assert!(!h.chat.delete(h.owner, a.id).await.unwrap());
}

#[tokio::test]
async fn test_stateless_answer_persists_nothing() {
    let model = ScriptedModelBackend::new().with_text("Three photos.");
    let h = harness(model);

    let answer = h.chat.answer(h.owner, "how many photos?").await.unwrap();
    assert_eq!(answer, "Three photos.");
    assert!(h.chat.list_conversations(h.owner, 0, 10).await.unwrap().is_empty());
}

// =============================================================================
// STREAMING
// =============================================================================

#[tokio::test]
async fn test_stream_emits_calls_text_then_done() {
    let model = ScriptedModelBackend::new()
        .with_tool_calls(vec![call("count_media", json!({}))])
        .with_text("You have nothing yet.")
        .with_text("Empty Library");
    let h = harness(model);
    let conversation = h.chat.create_conversation(h.owner, None).await.unwrap();

    let events: Vec<StreamEvent> = h
        .chat
        .run_query_stream(h.owner, conversation.id, "what do I have?".to_string())
        .collect()
        .await;

    assert_eq!(events[0].event_type(), "function_call");
    let text: String = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::Text { content } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(text, "You have nothing yet.");

    let turns = h.chat.list_turns(h.owner, conversation.id, None).await.unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(
        events.last().unwrap(),
        &StreamEvent::Done {
            message_id: turns[1].id
        }
    );
    assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);

    let conversation = h.chat.get_conversation(h.owner, conversation.id).await.unwrap().unwrap();
    assert_eq!(conversation.title, "Empty Library");
}

#[tokio::test]
async fn test_stream_missing_conversation() {
    let h = harness(ScriptedModelBackend::new());
    let events: Vec<StreamEvent> = h
        .chat
        .run_query_stream(h.owner, Uuid::new_v4(), "hello".to_string())
        .collect()
        .await;
    assert_eq!(events, vec![StreamEvent::error("Conversation not found")]);
}

#[tokio::test]
async fn test_stream_empty_answer() {
    let model = ScriptedModelBackend::new().with_response(ModelResponse::default());
    let h = harness(model);
    let conversation = h.chat.create_conversation(h.owner, None).await.unwrap();

    let events: Vec<StreamEvent> = h
        .chat
        .run_query_stream(h.owner, conversation.id, "hello".to_string())
        .collect()
        .await;
    assert_eq!(events, vec![StreamEvent::error(NO_RESPONSE_MESSAGE)]);
}

#[tokio::test]
async fn test_stream_upstream_failure_ends_with_error() {
    let model = ScriptedModelBackend::new().with_failure("upstream timeout");
    let h = harness(model);
    let conversation = h.chat.create_conversation(h.owner, None).await.unwrap();

    let events: Vec<StreamEvent> = h
        .chat
        .run_query_stream(h.owner, conversation.id, "hello".to_string())
        .collect()
        .await;
    assert_eq!(events.len(), 1);
    match &events[0] {
        StreamEvent::Error { message } => {
            assert!(message.contains("upstream timeout"));
            assert_ne!(message, STREAM_ENDED_MESSAGE);
        }
        other => panic!("expected error, got {:?}", other),
    }

    let turns = h.chat.list_turns(h.owner, conversation.id, None).await.unwrap();
    assert_eq!(turns.len(), 1);
}

#[tokio::test]
async fn test_disconnect_cancels_in_flight_call() {
    let model = ScriptedModelBackend::new().with_hang();
    let h = harness(model);
    let conversation = h.chat.create_conversation(h.owner, None).await.unwrap();

    let stream = h
        .chat
        .run_query_stream(h.owner, conversation.id, "slow question".to_string());
    let model = h.model.clone();
    assert!(eventually(|| model.in_flight() == 1).await);

    drop(stream);
    assert!(eventually(|| model.in_flight() == 0).await);

    let turns = h.chat.list_turns(h.owner, conversation.id, None).await.unwrap();
    assert_eq!(turns.len(), 1);
    assert_eq!(turns[0].role, TurnRole::User);
}
