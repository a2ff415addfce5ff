//! SSE stream parsing for OpenAI-compatible streaming responses.
//!
//! Network chunks do not align with SSE lines, so bytes are buffered until a
//! newline arrives. Text deltas are emitted as they are parsed. Tool-call
//! fragments are accumulated per index and emitted once complete (on a
//! `finish_reason`, the `[DONE]` marker, or end of body).

use std::collections::{BTreeMap, VecDeque};
use std::pin::Pin;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tracing::{debug, warn};

use lifelens_core::{Error, ModelDelta, ModelStream, Result, ToolCall};

use super::types::{parse_arguments, ChatCompletionChunk, ToolCallDelta};

type ByteStream = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send>>;

/// Parse an SSE body from an OpenAI-compatible endpoint into model deltas.
pub fn parse_sse_stream(
    stream: impl Stream<Item = std::result::Result<Bytes, reqwest::Error>> + Send + 'static,
) -> ModelStream {
    let state = SseState {
        inner: Box::pin(stream),
        buffer: Vec::new(),
        pending: VecDeque::new(),
        tools: ToolCallAccumulator::default(),
        finished: false,
    };

    let deltas = futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((item, st));
            }
            if st.finished {
                return None;
            }
            match st.inner.next().await {
                Some(Ok(bytes)) => {
                    st.buffer.extend_from_slice(&bytes);
                    st.drain_lines();
                }
                Some(Err(e)) => {
                    st.finished = true;
                    st.pending
                        .push_back(Err(Error::Inference(format!("Stream error: {}", e))));
                }
                None => {
                    let rest = std::mem::take(&mut st.buffer);
                    if !rest.is_empty() {
                        st.handle_line(String::from_utf8_lossy(&rest).trim());
                    }
                    st.flush_tools();
                    st.finished = true;
                }
            }
        }
    });

    Box::pin(deltas)
}

struct SseState {
    inner: ByteStream,
    buffer: Vec<u8>,
    pending: VecDeque<Result<ModelDelta>>,
    tools: ToolCallAccumulator,
    finished: bool,
}

impl SseState {
    fn drain_lines(&mut self) {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.handle_line(String::from_utf8_lossy(&line).trim());
            if self.finished {
                self.buffer.clear();
                return;
            }
        }
    }

    fn handle_line(&mut self, line: &str) {
        if self.finished || line.is_empty() || line.starts_with(':') {
            return;
        }
        let Some(data) = line.strip_prefix("data:") else {
            return;
        };
        let data = data.trim_start();

        if data == "[DONE]" {
            self.flush_tools();
            self.finished = true;
            return;
        }

        let chunk = match serde_json::from_str::<ChatCompletionChunk>(data) {
            Ok(chunk) => chunk,
            Err(e) => {
                self.pending.push_back(Err(Error::Inference(format!(
                    "Failed to parse SSE chunk: {}",
                    e
                ))));
                self.finished = true;
                return;
            }
        };

        for choice in chunk.choices {
            if let Some(content) = choice.delta.content {
                if !content.is_empty() {
                    self.pending.push_back(Ok(ModelDelta::Text(content)));
                }
            }
            for fragment in choice.delta.tool_calls.unwrap_or_default() {
                self.tools.push(fragment);
            }
            if choice.finish_reason.is_some() {
                self.flush_tools();
            }
        }
    }

    fn flush_tools(&mut self) {
        for call in self.tools.finish() {
            self.pending.push_back(Ok(ModelDelta::ToolCall(call)));
        }
    }
}

#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

/// Reassembles tool calls from streamed fragments keyed by index.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    calls: BTreeMap<usize, PartialCall>,
}

impl ToolCallAccumulator {
    pub fn push(&mut self, fragment: ToolCallDelta) {
        let entry = self.calls.entry(fragment.index).or_default();
        if let Some(id) = fragment.id.filter(|id| !id.is_empty()) {
            entry.id = id;
        }
        if let Some(function) = fragment.function {
            if let Some(name) = function.name {
                entry.name.push_str(&name);
            }
            if let Some(arguments) = function.arguments {
                entry.arguments.push_str(&arguments);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Completed calls in index order. Fragments without a name are dropped.
    pub fn finish(&mut self) -> Vec<ToolCall> {
        std::mem::take(&mut self.calls)
            .into_iter()
            .filter_map(|(index, call)| {
                if call.name.is_empty() {
                    warn!(index, "Dropping streamed tool call without a name");
                    return None;
                }
                let id = if call.id.is_empty() {
                    format!("call_{}", index)
                } else {
                    call.id
                };
                debug!(tool = %call.name, "Streamed tool call complete");
                let arguments = parse_arguments(&call.name, &call.arguments);
                Some(ToolCall::new(id, call.name, arguments))
            })
            .collect()
    }
}
