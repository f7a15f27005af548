//! Decoded protocol frames.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{ToolCall, Usage};

/// Transport-specific auxiliary fields of a frame.
///
/// Event-stream frames fill `event_id`, `event_type` and `retry`; any other
/// field name is kept verbatim in `fields`. Line-delimited frames leave them empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    /// Reconnection hint in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

/// Tag and typed body of a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FrameKind {
    /// A text fragment; `done` marks it as the last one of the exchange.
    Text { text: String, done: bool },
    ToolCall { calls: Vec<ToolCall> },
    Error { message: String },
    Done,
}

/// One decoded unit of a streaming protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolFrame {
    pub kind: FrameKind,
    /// Raw payload the frame was decoded from.
    pub raw: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub meta: FrameMeta,
}

impl ProtocolFrame {
    pub fn new(kind: FrameKind, raw: impl Into<String>) -> Self {
        Self {
            kind,
            raw: raw.into(),
            usage: None,
            meta: FrameMeta::default(),
        }
    }

    pub fn text(text: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::new(
            FrameKind::Text {
                text: text.into(),
                done: false,
            },
            raw,
        )
    }

    pub fn done(raw: impl Into<String>) -> Self {
        Self::new(FrameKind::Done, raw)
    }

    pub fn error(message: impl Into<String>, raw: impl Into<String>) -> Self {
        Self::new(
            FrameKind::Error {
                message: message.into(),
            },
            raw,
        )
    }

    pub fn with_usage(mut self, usage: Option<Usage>) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_meta(mut self, meta: FrameMeta) -> Self {
        self.meta = meta;
        self
    }

    /// Whether this frame ends the exchange it belongs to.
    pub fn is_terminal(&self) -> bool {
        match &self.kind {
            FrameKind::Text { done, .. } => *done,
            FrameKind::ToolCall { .. } => false,
            FrameKind::Error { .. } | FrameKind::Done => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_frames() {
        assert!(!ProtocolFrame::text("a", "a").is_terminal());
        assert!(ProtocolFrame::done("").is_terminal());
        assert!(ProtocolFrame::error("boom", "").is_terminal());
        let last = ProtocolFrame::new(
            FrameKind::Text {
                text: "lo".to_string(),
                done: true,
            },
            "",
        );
        assert!(last.is_terminal());
        let tools = ProtocolFrame::new(FrameKind::ToolCall { calls: vec![] }, "");
        assert!(!tools.is_terminal());
    }

    #[test]
    fn test_frame_kind_tagged_serialize() {
        let json = serde_json::to_value(FrameKind::Done).unwrap();
        assert_eq!(json["type"], "done");
    }
}
