//! Frames to the uniform response sequence.
//!
//! Transport-agnostic: the assembler only looks at a frame's tag.

use conclave_protocols::error::AgentError;
use conclave_protocols::types::{AgentResponse, FrameKind, ProtocolFrame, ToolCall, Usage};

/// Builds the responses of one exchange.
///
/// | frame | response |
/// |---|---|
/// | text | partial fragment |
/// | text with `done` | terminal, aggregated content |
/// | tool call | partial carrying the calls |
/// | error | `Err(AgentError::Remote)` |
/// | done | terminal, aggregated content |
///
/// The terminal response carries the concatenation of every text fragment,
/// every tool call seen and the most recent usage. Frames after the terminal
/// one are ignored.
#[derive(Debug)]
pub struct ResponseAssembler {
    message_id: String,
    content: String,
    tool_calls: Vec<ToolCall>,
    usage: Option<Usage>,
    complete: bool,
}

impl ResponseAssembler {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            content: String::new(),
            tool_calls: Vec::new(),
            usage: None,
            complete: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Content aggregated so far.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Map one frame. `Ok(None)` means the frame produced no response.
    pub fn push(&mut self, frame: ProtocolFrame) -> Result<Option<AgentResponse>, AgentError> {
        if self.complete {
            return Ok(None);
        }
        if frame.usage.is_some() {
            self.usage = frame.usage;
        }

        match frame.kind {
            FrameKind::Text { text, done } => {
                self.content.push_str(&text);
                if done {
                    Ok(Some(self.terminal()))
                } else if text.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(AgentResponse::partial(&self.message_id, text)))
                }
            }
            FrameKind::ToolCall { calls } => {
                self.tool_calls.extend(calls.iter().cloned());
                Ok(Some(AgentResponse::tool_calls(&self.message_id, calls)))
            }
            FrameKind::Error { message } => {
                self.complete = true;
                Err(AgentError::Remote(message))
            }
            FrameKind::Done => Ok(Some(self.terminal())),
        }
    }

    fn terminal(&mut self) -> AgentResponse {
        self.complete = true;
        AgentResponse::complete(
            &self.message_id,
            self.content.clone(),
            self.usage,
            self.tool_calls.clone(),
        )
    }
}
