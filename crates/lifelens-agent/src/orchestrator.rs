//! Bounded tool-calling loop.
//!
//! Each round sends the accumulated context to the model. A response with
//! tool calls is dispatched, and the calls plus their results are appended to
//! the context for the next round. A response without tool calls ends the
//! loop. The answer is the text of every round concatenated.
//!
//! Hitting the round limit is not an error: the loop stops and returns the
//! text gathered so far, which may be empty. Model failures end the loop;
//! tool failures never do.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use futures::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use lifelens_core::defaults::MAX_ITERATIONS;
use lifelens_core::{
    Error, ModelBackend, ModelDelta, ModelMessage, ModelRequest, ModelResponse, Result,
    StreamEvent, ToolCall, ToolResult,
};

use crate::dispatcher::ToolDispatcher;
use crate::prompt::SYSTEM_PROMPT;

/// Loop limits and dispatch policy.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Maximum model round-trips per request.
    pub max_iterations: usize,
    /// Run the calls of one round concurrently. Results keep request order.
    pub parallel_dispatch: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS,
            parallel_dispatch: false,
        }
    }
}

impl OrchestratorConfig {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_parallel_dispatch(mut self, parallel: bool) -> Self {
        self.parallel_dispatch = parallel;
        self
    }
}

/// Input to one run of the loop.
#[derive(Debug, Clone)]
pub struct QueryContext {
    pub owner_id: Uuid,
    /// Prior turns, oldest first.
    pub history: Vec<ModelMessage>,
    pub message: String,
}

impl QueryContext {
    pub fn new(owner_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            owner_id,
            history: Vec::new(),
            message: message.into(),
        }
    }

    pub fn with_history(mut self, history: Vec<ModelMessage>) -> Self {
        self.history = history;
        self
    }
}

/// Result of one run of the loop.
#[derive(Debug, Clone, Default)]
pub struct LoopOutcome {
    /// Text from every round, concatenated.
    pub text: String,
    /// Every tool call requested, in request order.
    pub tool_calls: Vec<ToolCall>,
    /// Model round-trips performed.
    pub iterations: usize,
    /// True when the loop stopped at the round limit.
    pub truncated: bool,
}

/// Drives the model through tool-calling rounds.
pub struct Orchestrator {
    model: Arc<dyn ModelBackend>,
    dispatcher: ToolDispatcher,
    config: OrchestratorConfig,
    system_prompt: String,
}

impl Orchestrator {
    pub fn new(model: Arc<dyn ModelBackend>, dispatcher: ToolDispatcher) -> Self {
        Self {
            model,
            dispatcher,
            config: OrchestratorConfig::default(),
            system_prompt: SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Backend used for every round.
    pub fn model(&self) -> &Arc<dyn ModelBackend> {
        &self.model
    }

    /// Run to completion and return the final answer.
    pub async fn run(&self, ctx: QueryContext) -> Result<LoopOutcome> {
        self.drive(ctx, None).await
    }

    /// Run with streamed model output, sending each text fragment and each
    /// tool call to `events` as it arrives. No terminal event is sent.
    pub async fn run_stream(
        &self,
        ctx: QueryContext,
        events: &mpsc::Sender<StreamEvent>,
    ) -> Result<LoopOutcome> {
        self.drive(ctx, Some(events)).await
    }

    #[instrument(
        skip(self, ctx, events),
        fields(
            subsystem = "agent",
            component = "orchestrator",
            op = "run",
            owner_id = %ctx.owner_id,
            streaming = events.is_some()
        )
    )]
    async fn drive(
        &self,
        ctx: QueryContext,
        events: Option<&mpsc::Sender<StreamEvent>>,
    ) -> Result<LoopOutcome> {
        let start = Instant::now();
        let owner_id = ctx.owner_id;

        let mut messages = ctx.history;
        messages.push(ModelMessage::user(ctx.message));
        let mut request = ModelRequest {
            system: Some(self.system_prompt.clone()),
            messages,
            tools: self.dispatcher.catalog(),
        };

        let mut outcome = LoopOutcome::default();

        for iteration in 1..=self.config.max_iterations {
            outcome.iterations = iteration;

            let response = match events {
                Some(tx) => self.stream_round(&request, tx).await,
                None => self.model.generate(&request).await,
            }
            .map_err(|e| {
                warn!(iteration, error = %e, "Model call failed");
                e
            })?;

            let round_text = response.text.unwrap_or_default();
            outcome.text.push_str(&round_text);

            if response.tool_calls.is_empty() {
                info!(
                    iterations = iteration,
                    response_len = outcome.text.len(),
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Query answered"
                );
                return Ok(outcome);
            }

            let calls = assign_call_ids(iteration, response.tool_calls);
            debug!(iteration, tool_calls = calls.len(), "Dispatching tool calls");
            outcome.tool_calls.extend(calls.iter().cloned());

            let results = self.dispatch_round(owner_id, &calls).await;

            // A call without a result is left out of the request message too,
            // so every call in context has a matching tool message.
            let (answered, results): (Vec<ToolCall>, Vec<ToolResult>) = calls
                .into_iter()
                .zip(results)
                .filter_map(|(call, result)| result.map(|r| (call, r)))
                .unzip();

            if !answered.is_empty() || !round_text.is_empty() {
                request
                    .messages
                    .push(ModelMessage::tool_request(round_text, answered));
            }
            request
                .messages
                .extend(results.iter().map(ModelMessage::tool_result));
        }

        outcome.truncated = true;
        info!(
            iterations = outcome.iterations,
            response_len = outcome.text.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Round limit reached"
        );
        Ok(outcome)
    }

    /// One streamed model call, forwarding deltas as events.
    async fn stream_round(
        &self,
        request: &ModelRequest,
        events: &mpsc::Sender<StreamEvent>,
    ) -> Result<ModelResponse> {
        let mut stream = self.model.generate_stream(request).await?;
        let mut text = String::new();
        let mut tool_calls = Vec::new();

        while let Some(delta) = stream.next().await {
            match delta? {
                ModelDelta::Text(fragment) => {
                    if fragment.is_empty() {
                        continue;
                    }
                    text.push_str(&fragment);
                    send(events, StreamEvent::text(fragment)).await?;
                }
                ModelDelta::ToolCall(call) => {
                    send(
                        events,
                        StreamEvent::FunctionCall {
                            name: call.name.clone(),
                            args: call.arguments.clone(),
                        },
                    )
                    .await?;
                    tool_calls.push(call);
                }
            }
        }

        Ok(ModelResponse {
            text: (!text.is_empty()).then_some(text),
            tool_calls,
        })
    }

    async fn dispatch_round(&self, owner_id: Uuid, calls: &[ToolCall]) -> Vec<Option<ToolResult>> {
        if self.config.parallel_dispatch {
            return join_all(calls.iter().map(|call| self.dispatcher.dispatch(owner_id, call))).await;
        }
        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.dispatcher.dispatch(owner_id, call).await);
        }
        results
    }
}

async fn send(events: &mpsc::Sender<StreamEvent>, event: StreamEvent) -> Result<()> {
    events
        .send(event)
        .await
        .map_err(|_| Error::Internal("Event receiver dropped".to_string()))
}

/// Give every call an id so results can be matched to it.
fn assign_call_ids(iteration: usize, calls: Vec<ToolCall>) -> Vec<ToolCall> {
    calls
        .into_iter()
        .enumerate()
        .map(|(idx, mut call)| {
            if call.id.is_empty() {
                call.id = format!("call_{}_{}", iteration, idx);
            }
            call
        })
        .collect()
}
