//! Mock backends for deterministic testing.
//!
//! [`ScriptedModelBackend`] replays a queue of model responses and records
//! every request it receives. [`MockEmbeddingBackend`] produces deterministic
//! unit vectors from text.
//!
//! ## Usage
//!
//! ```rust
//! use lifelens_inference::mock::ScriptedModelBackend;
//! use lifelens_core::{ModelBackend, ModelRequest, ModelResponse};
//!
//! #[tokio::test]
//! async fn test_with_scripted_backend() {
//!     let backend = ScriptedModelBackend::new()
//!         .with_response(ModelResponse::text("You took 3 photos."));
//!
//!     let response = backend.generate(&ModelRequest::default()).await.unwrap();
//!     assert_eq!(response.text.as_deref(), Some("You took 3 photos."));
//!     assert_eq!(backend.call_count(), 1);
//! }
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream;

use lifelens_core::defaults::EMBED_DIMENSION;
use lifelens_core::{
    EmbedRole, EmbeddingBackend, Error, ModelBackend, ModelDelta, ModelRequest, ModelResponse,
    ModelStream, Result, ToolCall, Vector,
};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// SCRIPTED MODEL BACKEND
// =============================================================================

/// One scripted reaction to a model call.
#[derive(Debug, Clone)]
pub enum ScriptedStep {
    /// Return this response (streamed as word deltas then tool calls).
    Respond(ModelResponse),
    /// Fail the call with an upstream error.
    Fail(String),
    /// Stream `text` then fail with `message` before finishing.
    FailMidStream { text: String, message: String },
    /// Never complete.
    Hang,
}

/// Model backend that replays scripted steps in order.
///
/// Once the script is exhausted every call gets the fallback response.
pub struct ScriptedModelBackend {
    script: Mutex<VecDeque<ScriptedStep>>,
    fallback: ModelResponse,
    requests: Mutex<Vec<ModelRequest>>,
    in_flight: Arc<AtomicUsize>,
    latency_ms: u64,
}

/// Decrements the in-flight counter when the call future is dropped.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter.clone())
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedModelBackend {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: ModelResponse::text("Mock response"),
            requests: Mutex::new(Vec::new()),
            in_flight: Arc::new(AtomicUsize::new(0)),
            latency_ms: 0,
        }
    }

    pub fn with_step(self, step: ScriptedStep) -> Self {
        lock(&self.script).push_back(step);
        self
    }

    pub fn with_response(self, response: ModelResponse) -> Self {
        self.with_step(ScriptedStep::Respond(response))
    }

    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.with_response(ModelResponse::text(text))
    }

    pub fn with_tool_calls(self, calls: Vec<ToolCall>) -> Self {
        self.with_response(ModelResponse::tool_calls(calls))
    }

    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.with_step(ScriptedStep::Fail(message.into()))
    }

    pub fn with_hang(self) -> Self {
        self.with_step(ScriptedStep::Hang)
    }

    /// Response used once the script runs out.
    pub fn with_fallback(mut self, response: ModelResponse) -> Self {
        self.fallback = response;
        self
    }

    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Number of generate / generate_stream calls received.
    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }

    /// Every request received, in call order.
    pub fn requests(&self) -> Vec<ModelRequest> {
        lock(&self.requests).clone()
    }

    pub fn last_request(&self) -> Option<ModelRequest> {
        lock(&self.requests).last().cloned()
    }

    /// Calls currently awaiting completion.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn remaining_steps(&self) -> usize {
        lock(&self.script).len()
    }

    async fn next_step(&self, request: &ModelRequest) -> ScriptedStep {
        lock(&self.requests).push(request.clone());
        if self.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.latency_ms)).await;
        }
        lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| ScriptedStep::Respond(self.fallback.clone()))
    }
}

impl Default for ScriptedModelBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn text_deltas(text: &str) -> Vec<Result<ModelDelta>> {
    text.split_inclusive(' ')
        .map(|piece| Ok(ModelDelta::Text(piece.to_string())))
        .collect()
}

#[async_trait]
impl ModelBackend for ScriptedModelBackend {
    async fn generate(&self, request: &ModelRequest) -> Result<ModelResponse> {
        let _guard = InFlight::enter(&self.in_flight);
        match self.next_step(request).await {
            ScriptedStep::Respond(response) => Ok(response),
            ScriptedStep::Fail(message) | ScriptedStep::FailMidStream { message, .. } => {
                Err(Error::Inference(message))
            }
            ScriptedStep::Hang => futures::future::pending::<Result<ModelResponse>>().await,
        }
    }

    async fn generate_stream(&self, request: &ModelRequest) -> Result<ModelStream> {
        let _guard = InFlight::enter(&self.in_flight);
        let deltas = match self.next_step(request).await {
            ScriptedStep::Respond(response) => {
                let mut deltas = response.text.as_deref().map(text_deltas).unwrap_or_default();
                deltas.extend(
                    response
                        .tool_calls
                        .into_iter()
                        .map(|call| Ok(ModelDelta::ToolCall(call))),
                );
                deltas
            }
            ScriptedStep::Fail(message) => return Err(Error::Inference(message)),
            ScriptedStep::FailMidStream { text, message } => {
                let mut deltas = text_deltas(&text);
                deltas.push(Err(Error::Inference(message)));
                deltas
            }
            ScriptedStep::Hang => {
                return futures::future::pending::<Result<ModelStream>>().await;
            }
        };
        Ok(Box::pin(stream::iter(deltas)))
    }

    fn model_name(&self) -> &str {
        "scripted-mock"
    }
}

// =============================================================================
// MOCK EMBEDDING BACKEND
// =============================================================================

/// Deterministic embedding backend.
pub struct MockEmbeddingBackend {
    dimension: usize,
    failure_rate: f64,
    overrides: HashMap<String, Vec<f32>>,
    calls: Mutex<Vec<(String, EmbedRole)>>,
}

impl MockEmbeddingBackend {
    pub fn new() -> Self {
        Self {
            dimension: EMBED_DIMENSION,
            failure_rate: 0.0,
            overrides: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    /// Fraction of calls that fail with an embedding error.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn failing() -> Self {
        Self::new().with_failure_rate(1.0)
    }

    /// Return `vector` whenever exactly `text` is embedded.
    pub fn with_vector(mut self, text: impl Into<String>, vector: Vec<f32>) -> Self {
        self.overrides.insert(text.into(), vector);
        self
    }

    /// Texts embedded so far with their roles.
    pub fn calls(&self) -> Vec<(String, EmbedRole)> {
        lock(&self.calls).clone()
    }

    fn should_fail(&self) -> bool {
        use rand::Rng;
        if self.failure_rate > 0.0 {
            rand::thread_rng().gen::<f64>() < self.failure_rate
        } else {
            false
        }
    }
}

impl Default for MockEmbeddingBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingBackend for MockEmbeddingBackend {
    async fn embed_texts(&self, texts: &[String], role: EmbedRole) -> Result<Vec<Vector>> {
        lock(&self.calls).extend(texts.iter().map(|t| (t.clone(), role)));

        if self.should_fail() {
            return Err(Error::Embedding("Simulated embedding failure".to_string()));
        }

        Ok(texts
            .iter()
            .map(|text| {
                let values = self
                    .overrides
                    .get(text)
                    .cloned()
                    .unwrap_or_else(|| MockEmbeddingGenerator::generate(text, self.dimension));
                Vector::from(values)
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}

/// Mock embedding generator with deterministic output.
pub struct MockEmbeddingGenerator;

impl MockEmbeddingGenerator {
    /// Generate a deterministic unit vector from text.
    ///
    /// The same text always produces the same embedding.
    pub fn generate(text: &str, dimension: usize) -> Vec<f32> {
        let mut vec = vec![0.0; dimension];
        if dimension == 0 {
            return vec;
        }

        for (i, c) in text.chars().enumerate() {
            let idx = (c as usize + i) % dimension;
            vec[idx] += 0.1;
        }

        Self::normalize(&mut vec);
        vec
    }

    fn normalize(vec: &mut [f32]) {
        let magnitude: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            vec.iter_mut().for_each(|x| *x /= magnitude);
        }
    }
}
