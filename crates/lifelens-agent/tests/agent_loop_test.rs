//! Orchestration loop behavior against the in-memory store and a scripted
//! model.

mod common;

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;

use lifelens_agent::{OrchestratorConfig, QueryContext};
use lifelens_core::{FixedClock, ModelResponse, ModelRole, ToolCall};
use lifelens_inference::mock::{MockEmbeddingBackend, ScriptedModelBackend};

use common::{call, call_with_id, harness, image, payload, tool_messages, HarnessBuilder};

fn tool_round(text: &str, calls: Vec<ToolCall>) -> ModelResponse {
    ModelResponse {
        text: Some(text.to_string()),
        tool_calls: calls,
    }
}

#[tokio::test]
async fn test_loop_stops_after_five_rounds() {
    let mut model = ScriptedModelBackend::new();
    for round in 1..=6 {
        model = model.with_response(tool_round(
            &format!("r{} ", round),
            vec![call("count_media", json!({}))],
        ));
    }
    let h = harness(model);

    let outcome = h
        .orchestrator
        .run(QueryContext::new(h.owner, "how many photos?"))
        .await
        .unwrap();

    assert_eq!(h.model.call_count(), 5);
    assert_eq!(h.model.remaining_steps(), 1);
    assert_eq!(outcome.iterations, 5);
    assert!(outcome.truncated);
    assert_eq!(outcome.text, "r1 r2 r3 r4 r5 ");
    assert_eq!(outcome.tool_calls.len(), 5);
}

#[tokio::test]
async fn test_round_limit_is_configurable() {
    let model = ScriptedModelBackend::new()
        .with_tool_calls(vec![call("count_media", json!({}))])
        .with_tool_calls(vec![call("count_media", json!({}))]);
    let h = HarnessBuilder::new(model)
        .config(OrchestratorConfig::default().with_max_iterations(2))
        .build();

    let outcome = h
        .orchestrator
        .run(QueryContext::new(h.owner, "count"))
        .await
        .unwrap();

    assert_eq!(h.model.call_count(), 2);
    assert!(outcome.truncated);
    assert!(outcome.text.is_empty());
}

#[tokio::test]
async fn test_tool_results_appended_in_request_order() {
    let model = ScriptedModelBackend::new()
        .with_tool_calls(vec![
            call_with_id("a", "count_media", json!({"media_type": "image"})),
            call_with_id("b", "count_media", json!({})),
        ])
        .with_text("You have 2 images.");
    let h = harness(model);
    let now = Utc::now();
    h.store.insert_media(image(h.owner, "a.jpg", now, None), None).await;
    h.store.insert_media(image(h.owner, "b.jpg", now, None), None).await;

    let outcome = h
        .orchestrator
        .run(QueryContext::new(h.owner, "how many images?"))
        .await
        .unwrap();
    assert_eq!(outcome.text, "You have 2 images.");
    assert!(!outcome.truncated);

    let requests = h.model.requests();
    assert_eq!(requests.len(), 2);
    let second = &requests[1].messages;
    assert_eq!(second[0].role, ModelRole::User);
    assert_eq!(second[1].role, ModelRole::Assistant);
    assert_eq!(second[1].tool_calls.len(), 2);

    let results = tool_messages(second);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].tool_call_id.as_deref(), Some("a"));
    assert_eq!(results[1].tool_call_id.as_deref(), Some("b"));
    assert_eq!(payload(results[0]), json!({"count": 2, "media_type": "image"}));
    assert_eq!(payload(results[1]), json!({"count": 2, "media_type": "all"}));
}

#[tokio::test]
async fn test_parallel_dispatch_keeps_request_order() {
    let model = ScriptedModelBackend::new()
        .with_tool_calls(vec![
            call_with_id("first", "count_media", json!({"media_type": "audio"})),
            call_with_id("second", "analyze_text", json!({"search_type": "dates"})),
            call_with_id("third", "count_media", json!({})),
        ])
        .with_text("done");
    let h = HarnessBuilder::new(model)
        .config(OrchestratorConfig::default().with_parallel_dispatch(true))
        .build();

    h.orchestrator
        .run(QueryContext::new(h.owner, "summary"))
        .await
        .unwrap();

    let request = h.model.last_request().unwrap();
    let ids: Vec<_> = tool_messages(&request.messages)
        .iter()
        .map(|m| m.tool_call_id.clone().unwrap())
        .collect();
    assert_eq!(ids, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_missing_call_ids_are_assigned() {
    let model = ScriptedModelBackend::new()
        .with_tool_calls(vec![call("count_media", json!({}))])
        .with_text("ok");
    let h = harness(model);

    let outcome = h
        .orchestrator
        .run(QueryContext::new(h.owner, "count"))
        .await
        .unwrap();

    assert_eq!(outcome.tool_calls[0].id, "call_1_0");
    let request = h.model.last_request().unwrap();
    assert_eq!(
        tool_messages(&request.messages)[0].tool_call_id.as_deref(),
        Some("call_1_0")
    );
}

#[tokio::test]
async fn test_unknown_tool_left_out_of_context() {
    let model = ScriptedModelBackend::new()
        .with_tool_calls(vec![
            call_with_id("x", "format_disk", json!({})),
            call_with_id("y", "count_media", json!({})),
        ])
        .with_text("0 items");
    let h = harness(model);

    let outcome = h
        .orchestrator
        .run(QueryContext::new(h.owner, "count"))
        .await
        .unwrap();
    assert_eq!(outcome.text, "0 items");
    assert_eq!(outcome.tool_calls.len(), 2);

    let request = h.model.last_request().unwrap();
    let assistant = request
        .messages
        .iter()
        .find(|m| m.role == ModelRole::Assistant)
        .unwrap();
    assert_eq!(assistant.tool_calls.len(), 1);
    assert_eq!(assistant.tool_calls[0].id, "y");
    assert_eq!(tool_messages(&request.messages).len(), 1);
}

#[tokio::test]
async fn test_invalid_arguments_give_empty_result_and_continue() {
    let model = ScriptedModelBackend::new()
        .with_tool_calls(vec![call("temporal_filter", json!({"time_range": "noon"}))])
        .with_text("Nothing found.");
    let h = harness(model);

    let outcome = h
        .orchestrator
        .run(QueryContext::new(h.owner, "photos at noon"))
        .await
        .unwrap();
    assert_eq!(outcome.text, "Nothing found.");

    let request = h.model.last_request().unwrap();
    let results = tool_messages(&request.messages);
    assert_eq!(payload(results[0]), json!({"results": []}));
}

#[tokio::test]
async fn test_semantic_search_with_failing_embeddings_returns_empty() {
    let model = ScriptedModelBackend::new()
        .with_tool_calls(vec![call("semantic_search", json!({"query": "sunset"}))])
        .with_text("I couldn't find any sunsets.");
    let h = HarnessBuilder::new(model)
        .embedder(MockEmbeddingBackend::failing())
        .build();
    h.store
        .insert_media(image(h.owner, "menu.jpg", Utc::now(), Some("lunch menu")), None)
        .await;

    let outcome = h
        .orchestrator
        .run(QueryContext::new(h.owner, "show me sunsets"))
        .await
        .unwrap();
    assert_eq!(outcome.text, "I couldn't find any sunsets.");

    let request = h.model.last_request().unwrap();
    assert_eq!(payload(tool_messages(&request.messages)[0]), json!({"results": []}));
}

#[tokio::test]
async fn test_temporal_filter_resolves_against_clock() {
    let now = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
    let model = ScriptedModelBackend::new()
        .with_tool_calls(vec![call("temporal_filter", json!({"relative_time": "2 hours ago"}))])
        .with_text("One photo.");
    let h = HarnessBuilder::new(model)
        .clock(Arc::new(FixedClock(now)))
        .build();
    h.store
        .insert_media(image(h.owner, "lunch.jpg", now - Duration::minutes(90), None), None)
        .await;
    h.store
        .insert_media(image(h.owner, "breakfast.jpg", now - Duration::hours(5), None), None)
        .await;

    h.orchestrator
        .run(QueryContext::new(h.owner, "what did I take in the last two hours?"))
        .await
        .unwrap();

    let request = h.model.last_request().unwrap();
    let rows = payload(tool_messages(&request.messages)[0])["results"].clone();
    assert_eq!(rows.as_array().unwrap().len(), 1);
    assert_eq!(rows[0]["file_name"], "lunch.jpg");
}

#[tokio::test]
async fn test_media_details_never_returns_other_owners_media() {
    let stranger = uuid::Uuid::new_v4();
    let foreign = image(stranger, "private.jpg", Utc::now(), Some("secret"));
    let foreign_id = foreign.media_id;

    let model = ScriptedModelBackend::new()
        .with_tool_calls(vec![call(
            "get_media_details",
            json!({"media_ids": [foreign_id.to_string()]}),
        )])
        .with_text("I can't find that item.");
    let h = harness(model);
    h.store.insert_media(foreign, None).await;

    let outcome = h
        .orchestrator
        .run(QueryContext::new(h.owner, "open it"))
        .await
        .unwrap();
    assert_eq!(outcome.text, "I can't find that item.");

    let request = h.model.last_request().unwrap();
    assert_eq!(payload(tool_messages(&request.messages)[0]), json!({"results": []}));
}

#[tokio::test]
async fn test_model_failure_propagates() {
    let model = ScriptedModelBackend::new().with_failure("connection refused");
    let h = harness(model);

    let err = h
        .orchestrator
        .run(QueryContext::new(h.owner, "hello"))
        .await
        .unwrap_err();
    assert!(err.is_upstream());
}

#[tokio::test]
async fn test_history_precedes_new_message() {
    let model = ScriptedModelBackend::new().with_text("Hi again.");
    let h = harness(model);

    let history = vec![
        lifelens_core::ModelMessage::user("earlier question"),
        lifelens_core::ModelMessage::assistant("earlier answer"),
    ];
    h.orchestrator
        .run(QueryContext::new(h.owner, "new question").with_history(history))
        .await
        .unwrap();

    let request = h.model.last_request().unwrap();
    let contents: Vec<_> = request.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["earlier question", "earlier answer", "new question"]);
    assert!(request.system.unwrap().contains("LifeLens"));
    assert_eq!(request.tools.len(), 5);
}
