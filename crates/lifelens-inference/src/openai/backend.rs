//! OpenAI-compatible inference backend implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::{debug, info, instrument, warn};

use lifelens_core::{
    EmbedRole, EmbeddingBackend, Error, ModelBackend, ModelMessage, ModelRequest, ModelResponse,
    ModelRole, ModelStream, Result, Vector,
};

use super::error::{check_dimensions, to_lifelens_error, Endpoint, OpenAIErrorCode};
use super::streaming::parse_sse_stream;
use super::types::*;

/// Default OpenAI API endpoint.
pub const DEFAULT_OPENAI_URL: &str = "https://api.openai.com/v1";

/// Default embedding model.
pub const DEFAULT_EMBED_MODEL: &str = "text-embedding-3-small";

/// Default generation model.
pub const DEFAULT_GEN_MODEL: &str = "gpt-4o-mini";

/// Default embedding dimension, matching the `vector(1536)` column.
pub const DEFAULT_DIMENSION: usize = lifelens_core::defaults::EMBED_DIMENSION;

/// Default timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Configuration for OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAIConfig {
    /// Base URL for the API endpoint.
    pub base_url: String,
    /// API key for authentication (optional for local endpoints).
    pub api_key: Option<String>,
    /// Model to use for embeddings.
    pub embed_model: String,
    /// Model to use for chat and tool calling.
    pub gen_model: String,
    /// Requested and expected embedding dimension.
    pub embed_dimension: usize,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
    /// Skip TLS verification (for self-signed certs in local environments).
    pub skip_tls_verify: bool,
    /// HTTP-Referer header for OpenRouter.ai rankings (optional).
    pub http_referer: Option<String>,
    /// X-Title header for app name on OpenRouter.ai (optional).
    pub x_title: Option<String>,
    /// Prepended to text embedded as a search query.
    pub embed_query_prefix: Option<String>,
    /// Prepended to text embedded as stored content.
    pub embed_document_prefix: Option<String>,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPENAI_URL.to_string(),
            api_key: None,
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            gen_model: DEFAULT_GEN_MODEL.to_string(),
            embed_dimension: DEFAULT_DIMENSION,
            timeout_seconds: DEFAULT_TIMEOUT_SECS,
            skip_tls_verify: false,
            http_referer: None,
            x_title: None,
            embed_query_prefix: None,
            embed_document_prefix: None,
        }
    }
}

impl OpenAIConfig {
    /// Read configuration from `OPENAI_*` environment variables.
    pub fn from_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());

        Self {
            base_url: non_empty("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            api_key: non_empty("OPENAI_API_KEY"),
            embed_model: non_empty("OPENAI_EMBED_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBED_MODEL.to_string()),
            gen_model: non_empty("OPENAI_GEN_MODEL")
                .unwrap_or_else(|| DEFAULT_GEN_MODEL.to_string()),
            embed_dimension: non_empty("OPENAI_EMBED_DIM")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DIMENSION),
            timeout_seconds: non_empty("OPENAI_TIMEOUT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_TIMEOUT_SECS),
            skip_tls_verify: non_empty("OPENAI_SKIP_TLS_VERIFY")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            http_referer: non_empty("OPENAI_HTTP_REFERER"),
            x_title: non_empty("OPENAI_X_TITLE"),
            embed_query_prefix: non_empty("OPENAI_EMBED_QUERY_PREFIX"),
            embed_document_prefix: non_empty("OPENAI_EMBED_DOCUMENT_PREFIX"),
        }
    }

    fn prefix_for(&self, role: EmbedRole) -> Option<&str> {
        match role {
            EmbedRole::Query => self.embed_query_prefix.as_deref(),
            EmbedRole::Document => self.embed_document_prefix.as_deref(),
        }
    }
}

/// OpenAI-compatible inference backend.
pub struct OpenAIBackend {
    client: Client,
    config: OpenAIConfig,
}

impl OpenAIBackend {
    /// Create a new OpenAI backend with the given configuration.
    pub fn new(config: OpenAIConfig) -> Result<Self> {
        let mut client_builder =
            Client::builder().timeout(Duration::from_secs(config.timeout_seconds));

        if config.skip_tls_verify {
            client_builder = client_builder.danger_accept_invalid_certs(true);
        }

        let client = client_builder
            .build()
            .map_err(|e| Error::Inference(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            subsystem = "inference",
            component = "openai",
            url = %config.base_url,
            embed_model = %config.embed_model,
            gen_model = %config.gen_model,
            "Initializing OpenAI backend"
        );

        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(OpenAIConfig::from_env())
    }

    /// Get the current configuration.
    pub fn config(&self) -> &OpenAIConfig {
        &self.config
    }

    /// Build a request with authentication if configured.
    fn build_request(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint);
        let mut req = self.client.post(&url);

        if let Some(ref api_key) = self.config.api_key {
            req = req.header("Authorization", format!("Bearer {}", api_key));
        }

        if let Some(ref referer) = self.config.http_referer {
            req = req.header("HTTP-Referer", referer);
        }

        if let Some(ref title) = self.config.x_title {
            req = req.header("X-Title", title);
        }

        req.header("Content-Type", "application/json")
    }

    fn chat_request(&self, request: &ModelRequest, stream: bool) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.config.gen_model.clone(),
            messages: to_wire_messages(request),
            tools: request.tools.iter().map(ToolSpec::from).collect(),
            temperature: None,
            max_tokens: None,
            stream,
        }
    }

    async fn post_chat(&self, body: &ChatCompletionRequest) -> Result<Response> {
        let response = self
            .build_request("/chat/completions")
            .json(body)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("Request failed: {}", e)))?;
        check_status(response, Endpoint::Chat).await
    }
}

/// Pass successful responses through; map error bodies to crate errors.
async fn check_status(response: Response, endpoint: Endpoint) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body: OpenAIErrorResponse = response.json().await.unwrap_or(OpenAIErrorResponse {
        error: OpenAIError {
            message: "Unknown error".to_string(),
            error_type: "unknown".to_string(),
            code: None,
        },
    });
    let code = OpenAIErrorCode::from_response(
        status.as_u16(),
        &body.error.error_type,
        &body.error.message,
    );
    warn!(
        subsystem = "inference",
        status = status.as_u16(),
        error_type = %body.error.error_type,
        retryable = code.is_retryable(),
        "Model backend returned an error"
    );
    Err(to_lifelens_error(
        code,
        endpoint,
        &format!("OpenAI returned {}: {}", status, body.error.message),
    ))
}

/// Translate a model request into wire messages, system prompt first.
pub fn to_wire_messages(request: &ModelRequest) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);

    if let Some(system) = request.system.as_deref().filter(|s| !s.is_empty()) {
        messages.push(ChatMessage::new("system", system));
    }

    messages.extend(request.messages.iter().map(wire_message));
    messages
}

fn wire_message(message: &ModelMessage) -> ChatMessage {
    match message.role {
        ModelRole::User => ChatMessage::new("user", message.content.as_str()),
        ModelRole::Assistant if message.tool_calls.is_empty() => {
            ChatMessage::new("assistant", message.content.as_str())
        }
        ModelRole::Assistant => ChatMessage {
            role: "assistant".to_string(),
            content: Some(message.content.clone()).filter(|c| !c.is_empty()),
            tool_calls: Some(message.tool_calls.iter().map(WireToolCall::from).collect()),
            tool_call_id: None,
        },
        ModelRole::Tool => ChatMessage {
            role: "tool".to_string(),
            content: Some(message.content.clone()),
            tool_calls: None,
            tool_call_id: message.tool_call_id.clone(),
        },
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAIBackend {
    #[instrument(
        skip(self, texts),
        fields(subsystem = "inference", component = "openai", op = "embed", count = texts.len())
    )]
    async fn embed_texts(&self, texts: &[String], role: EmbedRole) -> Result<Vec<Vector>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let input: Vec<String> = match self.config.prefix_for(role) {
            Some(prefix) => texts.iter().map(|t| format!("{}{}", prefix, t)).collect(),
            None => texts.to_vec(),
        };

        let request = EmbeddingRequest {
            model: self.config.embed_model.clone(),
            input,
            encoding_format: Some("float".to_string()),
            dimensions: Some(self.config.embed_dimension),
        };

        let response = self
            .build_request("/embeddings")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Embedding(format!("Request failed: {}", e)))?;

        let response = check_status(response, Endpoint::Embeddings).await?;

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| Error::Embedding(format!("Failed to parse response: {}", e)))?;

        // Sort by index to ensure correct ordering
        let mut data = result.data;
        data.sort_by_key(|d| d.index);

        if data.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "Expected {} embeddings, got {}",
                texts.len(),
                data.len()
            )));
        }

        check_dimensions(
            self.config.embed_dimension,
            data.iter().map(|d| d.embedding.len()),
        )?;

        let vectors: Vec<Vector> = data
            .into_iter()
            .map(|d| Vector::from(d.embedding))
            .collect();

        debug!(result_count = vectors.len(), "Generated embeddings");
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.config.embed_dimension
    }

    fn model_name(&self) -> &str {
        &self.config.embed_model
    }
}

#[async_trait]
impl ModelBackend for OpenAIBackend {
    #[instrument(
        skip(self, request),
        fields(subsystem = "inference", component = "openai", op = "generate", model = %self.config.gen_model)
    )]
    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse> {
        let start = Instant::now();
        let body = self.chat_request(request, false);
        let response = self.post_chat(&body).await?;

        let result: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| Error::Inference(format!("Failed to parse response: {}", e)))?;

        let choice = result
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Inference("Response contained no choices".to_string()))?;

        let message = choice.message;
        let response = ModelResponse {
            text: message.content.filter(|c| !c.is_empty()),
            tool_calls: message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(WireToolCall::into_tool_call)
                .collect(),
        };

        debug!(
            tool_calls = response.tool_calls.len(),
            response_len = response.text.as_ref().map_or(0, String::len),
            duration_ms = start.elapsed().as_millis() as u64,
            "Generation complete"
        );
        Ok(response)
    }

    #[instrument(
        skip(self, request),
        fields(subsystem = "inference", component = "openai", op = "generate_stream", model = %self.config.gen_model)
    )]
    async fn generate_stream(&self, request: &ModelRequest) -> Result<ModelStream> {
        let body = self.chat_request(request, true);
        let response = self.post_chat(&body).await?;
        debug!("Streaming response opened");
        Ok(parse_sse_stream(response.bytes_stream()))
    }

    fn model_name(&self) -> &str {
        &self.config.gen_model
    }
}
