//! Newline-delimited JSON frames written by agent subprocesses.
//!
//! Each line is one object `{type, content, done, tool_calls, usage}` and is
//! parsed on its own.

use serde::Deserialize;
use tracing::{debug, warn};

use conclave_protocols::types::{FrameKind, ProtocolFrame, ToolCall, Usage};

use super::{take_lines, take_rest, FrameDecoder};

#[derive(Debug, Deserialize)]
struct WireLine {
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    content: Option<serde_json::Value>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    tool_calls: Vec<WireToolCall>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    id: Option<String>,
    name: String,
    #[serde(default, alias = "arguments", alias = "input")]
    parameters: serde_json::Value,
}

impl From<WireToolCall> for ToolCall {
    fn from(call: WireToolCall) -> Self {
        let parameters = match call.parameters {
            // Some CLIs send arguments as an encoded JSON string.
            serde_json::Value::String(s) => {
                serde_json::from_str(&s).unwrap_or(serde_json::Value::String(s))
            }
            serde_json::Value::Null => serde_json::json!({}),
            other => other,
        };
        let mut tool_call = ToolCall::new(call.name, parameters);
        if let Some(id) = call.id {
            tool_call.id = id;
        }
        tool_call
    }
}

fn text_of(value: &Option<serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Decode one line into frames.
///
/// Blank lines yield nothing. Malformed lines and unknown frame types are
/// logged and yield nothing. A tool-call line with `done: true` yields the
/// tool-call frame followed by a done frame.
pub fn decode_line(line: &str) -> Vec<ProtocolFrame> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    let wire: WireLine = match serde_json::from_str(trimmed) {
        Ok(wire) => wire,
        Err(e) => {
            warn!(error = %e, line = %truncate(trimmed), "Skipping malformed frame");
            return Vec::new();
        }
    };

    let usage = wire.usage;
    let kind = wire.kind.as_deref().unwrap_or("text");
    let frame = |kind: FrameKind| ProtocolFrame::new(kind, trimmed).with_usage(usage);

    match kind {
        "text" | "delta" | "assistant" => vec![frame(FrameKind::Text {
            text: text_of(&wire.content),
            done: wire.done,
        })],
        "tool_call" | "tool_use" => {
            let calls: Vec<ToolCall> = wire.tool_calls.into_iter().map(ToolCall::from).collect();
            if calls.is_empty() {
                warn!(line = %truncate(trimmed), "Skipping tool-call frame without calls");
                return Vec::new();
            }
            let mut frames = vec![frame(FrameKind::ToolCall { calls })];
            if wire.done {
                frames.push(frame(FrameKind::Done));
            }
            frames
        }
        "error" => {
            let message = match &wire.error {
                Some(serde_json::Value::Object(obj)) => obj
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| text_of(&wire.error)),
                Some(_) => text_of(&wire.error),
                None => text_of(&wire.content),
            };
            vec![frame(FrameKind::Error { message })]
        }
        "done" | "result" => vec![frame(FrameKind::Done)],
        other => {
            debug!(frame_type = %other, "Ignoring unknown frame type");
            Vec::new()
        }
    }
}

fn truncate(line: &str) -> &str {
    match line.char_indices().nth(200) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}

/// Buffering decoder for NDJSON delivered in arbitrary chunks.
#[derive(Debug, Default)]
pub struct NdjsonDecoder {
    buf: Vec<u8>,
}

impl NdjsonDecoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameDecoder for NdjsonDecoder {
    fn feed(&mut self, chunk: &[u8]) -> Vec<ProtocolFrame> {
        take_lines(&mut self.buf, chunk)
            .iter()
            .flat_map(|line| decode_line(line))
            .collect()
    }

    fn finish(&mut self) -> Vec<ProtocolFrame> {
        take_rest(&mut self.buf)
            .map(|line| decode_line(&line))
            .unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "ndjson_tests.rs"]
mod tests;
