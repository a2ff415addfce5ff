//! OpenAI backend tests against a wiremock server.

#![cfg(feature = "openai")]

use futures::StreamExt;
use lifelens_core::{
    EmbedRole, EmbeddingBackend, Error, ModelBackend, ModelDelta, ModelMessage, ModelRequest,
    ToolDeclaration,
};
use lifelens_inference::openai::{OpenAIBackend, OpenAIConfig};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend_for(server: &MockServer, dimension: usize) -> OpenAIBackend {
    let config = OpenAIConfig {
        base_url: server.uri(),
        api_key: Some("test-key".to_string()),
        embed_model: "test-embed".to_string(),
        gen_model: "test-gen".to_string(),
        embed_dimension: dimension,
        timeout_seconds: 10,
        http_referer: Some("https://lifelens.app".to_string()),
        x_title: Some("LifeLens".to_string()),
        embed_query_prefix: Some("query: ".to_string()),
        ..Default::default()
    };
    OpenAIBackend::new(config).expect("Failed to create backend")
}

fn request_with_tool() -> ModelRequest {
    ModelRequest {
        system: Some("You are LifeLens.".to_string()),
        messages: vec![ModelMessage::user("How many photos do I have?")],
        tools: vec![ToolDeclaration {
            name: "count_media",
            description: "Count media",
            parameters: json!({"type": "object", "properties": {}}),
        }],
    }
}

#[tokio::test]
async fn test_embedding_sends_prefix_dimension_and_headers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .and(header("Authorization", "Bearer test-key"))
        .and(header("HTTP-Referer", "https://lifelens.app"))
        .and(header("X-Title", "LifeLens"))
        .and(body_partial_json(json!({
            "model": "test-embed",
            "input": ["query: beach"],
            "dimensions": 4
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"embedding": [0.5, 0.5, 0.5, 0.5], "index": 0}],
            "model": "test-embed"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server, 4);
    let vectors = backend
        .embed_texts(&["beach".to_string()], EmbedRole::Query)
        .await
        .unwrap();
    assert_eq!(vectors.len(), 1);
    assert_eq!(vectors[0].as_slice().len(), 4);
}

#[tokio::test]
async fn test_embedding_dimension_mismatch() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"embedding": [0.1, 0.2], "index": 0}]
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server, 1536);
    let err = backend
        .embed_texts(&["beach".to_string()], EmbedRole::Document)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::DimensionMismatch {
            expected: 1536,
            actual: 2
        }
    ));
}

#[tokio::test]
async fn test_embedding_server_error_is_embedding_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": {"message": "overloaded", "type": "server_error"}
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server, 4);
    let err = backend
        .embed_texts(&["beach".to_string()], EmbedRole::Query)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Embedding(_)));
    assert!(err.to_string().contains("overloaded"));
}

#[tokio::test]
async fn test_embedding_rejected_dimensions_is_config_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/embeddings"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "message": "This model does not support specifying dimensions.",
                "type": "invalid_request_error"
            }
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server, 1536);
    let err = backend
        .embed_texts(&["beach".to_string()], EmbedRole::Query)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(err.to_string().contains("Embedding dimension not supported"));
}

#[tokio::test]
async fn test_generate_context_overflow_is_upstream() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": {
                "message": "This model's maximum context length is 8192 tokens",
                "type": "invalid_request_error"
            }
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server, 4);
    let err = backend.generate(&request_with_tool()).await.unwrap_err();
    assert!(err.is_upstream());
    assert!(err.to_string().contains("Conversation exceeds the model context"));
}

#[tokio::test]
async fn test_generate_returns_tool_calls() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({
            "model": "test-gen",
            "stream": false,
            "messages": [
                {"role": "system", "content": "You are LifeLens."},
                {"role": "user", "content": "How many photos do I have?"}
            ],
            "tools": [{"type": "function", "function": {"name": "count_media"}}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "count_media", "arguments": "{\"media_type\":\"image\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server, 4);
    let response = backend.generate(&request_with_tool()).await.unwrap();
    assert!(response.text.is_none());
    assert_eq!(response.tool_calls.len(), 1);
    assert_eq!(response.tool_calls[0].id, "call_1");
    assert_eq!(response.tool_calls[0].arguments["media_type"], "image");
}

#[tokio::test]
async fn test_generate_rate_limit_is_upstream() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": {"message": "slow down", "type": "rate_limit_exceeded"}
        })))
        .mount(&server)
        .await;

    let backend = backend_for(&server, 4);
    let err = backend.generate(&request_with_tool()).await.unwrap_err();
    assert!(err.is_upstream());
    assert!(err.to_string().contains("Rate limit exceeded"));
}

#[tokio::test]
async fn test_stream_text_and_tool_call() {
    let server = MockServer::start().await;

    let sse = concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\"},\"finish_reason\":null}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Let me check\"},\"finish_reason\":null}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_7\",\"function\":{\"name\":\"temporal_filter\",\"arguments\":\"{\\\"relative_time\\\":\"}}]},\"finish_reason\":null}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"\\\"yesterday\\\"}\"}}]},\"finish_reason\":null}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\n",
        "data: [DONE]\n\n"
    );

    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(sse),
        )
        .expect(1)
        .mount(&server)
        .await;

    let backend = backend_for(&server, 4);
    let deltas: Vec<_> = backend
        .generate_stream(&request_with_tool())
        .await
        .unwrap()
        .collect()
        .await;

    assert_eq!(deltas.len(), 2);
    assert_eq!(
        deltas[0].as_ref().unwrap(),
        &ModelDelta::Text("Let me check".to_string())
    );
    match deltas[1].as_ref().unwrap() {
        ModelDelta::ToolCall(call) => {
            assert_eq!(call.id, "call_7");
            assert_eq!(call.name, "temporal_filter");
            assert_eq!(call.arguments["relative_time"], "yesterday");
        }
        other => panic!("expected tool call, got {:?}", other),
    }
}
