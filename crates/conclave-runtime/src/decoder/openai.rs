//! Chat-completions event streams.
//!
//! OpenAI-compatible providers stream one JSON chunk per event. Text deltas
//! become text frames as they arrive; tool-call fragments are accumulated by
//! index and emitted as one tool-call frame when the choice finishes. The
//! done frame is produced when the stream ends, carrying the last usage seen.

use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

use conclave_protocols::types::{FrameKind, ProtocolFrame, ToolCall, Usage};

use super::sse::{SseDecoder, SseEvent};
use super::FrameDecoder;

#[derive(Debug, Deserialize)]
pub(crate) struct StreamChunk {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
    #[serde(default)]
    pub usage: Option<ApiUsage>,
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamChoice {
    #[serde(default)]
    pub delta: StreamDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StreamDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<StreamToolCall>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamToolCall {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<StreamFunctionCall>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamFunctionCall {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl From<ApiUsage> for Usage {
    fn from(usage: ApiUsage) -> Self {
        Usage {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Default)]
struct PartialToolCall {
    id: Option<String>,
    name: String,
    arguments: String,
}

impl PartialToolCall {
    fn into_tool_call(self) -> ToolCall {
        let parameters = if self.arguments.trim().is_empty() {
            serde_json::json!({})
        } else {
            serde_json::from_str(&self.arguments)
                .unwrap_or(serde_json::Value::String(self.arguments))
        };
        let mut call = ToolCall::new(self.name, parameters);
        if let Some(id) = self.id {
            call.id = id;
        }
        call
    }
}

/// Event-stream decoder that understands chat-completion chunks.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    sse: SseDecoder,
    tool_calls: BTreeMap<usize, PartialToolCall>,
    usage: Option<Usage>,
    finished: bool,
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    fn map_event(&mut self, event: SseEvent) -> Vec<ProtocolFrame> {
        if self.finished {
            return Vec::new();
        }
        let meta = event.meta();

        if matches!(event.event.as_deref(), Some("error")) {
            let message = serde_json::from_str::<StreamChunk>(&event.data)
                .ok()
                .and_then(|chunk| chunk.error)
                .and_then(|err| err.message)
                .unwrap_or_else(|| event.data.clone());
            return vec![ProtocolFrame::error(message, event.data).with_meta(meta)];
        }
        if matches!(event.event.as_deref(), Some("done")) {
            let mut frames = self.flush_tool_calls(&event.data);
            frames.push(self.done_frame(&event.data));
            return frames
                .into_iter()
                .map(|f| f.with_meta(meta.clone()))
                .collect();
        }

        let chunk = match serde_json::from_str::<StreamChunk>(&event.data) {
            Ok(chunk) => chunk,
            Err(_) => return vec![event.into_frame()],
        };

        if let Some(err) = chunk.error {
            let message = err.message.unwrap_or_else(|| "provider error".to_string());
            return vec![ProtocolFrame::error(message, event.data).with_meta(meta)];
        }
        if let Some(usage) = chunk.usage {
            self.usage = Some(usage.into());
        }

        let mut frames = Vec::new();
        for choice in chunk.choices {
            if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
                frames.push(ProtocolFrame::text(text, event.data.clone()));
            }
            for fragment in choice.delta.tool_calls {
                let partial = self.tool_calls.entry(fragment.index).or_default();
                if let Some(id) = fragment.id {
                    partial.id = Some(id);
                }
                if let Some(function) = fragment.function {
                    if let Some(name) = function.name {
                        partial.name.push_str(&name);
                    }
                    if let Some(args) = function.arguments {
                        partial.arguments.push_str(&args);
                    }
                }
            }
            if choice.finish_reason.is_some() {
                frames.extend(self.flush_tool_calls(&event.data));
            }
        }
        if frames.is_empty() {
            debug!("Chunk carried no content");
        }
        frames
            .into_iter()
            .map(|f| f.with_meta(meta.clone()))
            .collect()
    }

    fn flush_tool_calls(&mut self, raw: &str) -> Vec<ProtocolFrame> {
        if self.tool_calls.is_empty() {
            return Vec::new();
        }
        let calls: Vec<ToolCall> = std::mem::take(&mut self.tool_calls)
            .into_values()
            .map(PartialToolCall::into_tool_call)
            .collect();
        vec![ProtocolFrame::new(FrameKind::ToolCall { calls }, raw)]
    }

    fn done_frame(&mut self, raw: &str) -> ProtocolFrame {
        self.finished = true;
        ProtocolFrame::done(raw).with_usage(self.usage)
    }

    fn finish_frames(&mut self) -> Vec<ProtocolFrame> {
        if self.finished {
            return Vec::new();
        }
        let mut frames = self.flush_tool_calls("");
        frames.push(self.done_frame(""));
        frames
    }
}

impl FrameDecoder for EventStreamDecoder {
    fn feed(&mut self, chunk: &[u8]) -> Vec<ProtocolFrame> {
        let events = self.sse.feed_events(chunk);
        let mut frames: Vec<ProtocolFrame> = events
            .into_iter()
            .flat_map(|event| self.map_event(event))
            .collect();
        if self.sse.is_ended() {
            frames.extend(self.finish_frames());
        }
        frames
    }

    fn finish(&mut self) -> Vec<ProtocolFrame> {
        let events = self.sse.finish_events();
        let mut frames: Vec<ProtocolFrame> = events
            .into_iter()
            .flat_map(|event| self.map_event(event))
            .collect();
        frames.extend(self.finish_frames());
        frames
    }

    fn is_ended(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
#[path = "openai_tests.rs"]
mod tests;
