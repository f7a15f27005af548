//! Agent response types.

use serde::{Deserialize, Serialize};

use super::{Metadata, ToolCall, Usage};

/// One element of a response sequence, tied to the message that caused it.
///
/// Partial responses carry a fragment; the single terminal response of an
/// exchange has `is_complete = true` and carries the aggregated content, the
/// token usage and every tool call seen during the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
    pub message_id: String,
    pub content: String,
    pub is_complete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl AgentResponse {
    /// A partial text fragment.
    pub fn partial(message_id: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            content: fragment.into(),
            is_complete: false,
            usage: None,
            tool_calls: Vec::new(),
            metadata: Metadata::new(),
        }
    }

    /// A partial response announcing tool calls.
    pub fn tool_calls(message_id: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            message_id: message_id.into(),
            content: String::new(),
            is_complete: false,
            usage: None,
            tool_calls: calls,
            metadata: Metadata::new(),
        }
    }

    /// The terminal response of an exchange.
    pub fn complete(
        message_id: impl Into<String>,
        content: impl Into<String>,
        usage: Option<Usage>,
        tool_calls: Vec<ToolCall>,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            content: content.into(),
            is_complete: true,
            usage,
            tool_calls,
            metadata: Metadata::new(),
        }
    }
}
