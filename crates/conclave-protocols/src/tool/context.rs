//! Tool execution context.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

/// Context for tool execution.
#[derive(Clone)]
pub struct ToolContext {
    /// ID of the tool call being executed. Recorded as hand-off provenance.
    pub tool_call_id: String,

    /// Session of the calling agent.
    pub session_id: Option<String>,

    /// Agent that issued the tool call.
    pub caller_agent_id: Option<String>,

    /// Caller cancellation.
    pub cancel: CancellationToken,

    /// Additional context data.
    pub data: HashMap<String, serde_json::Value>,
}

impl ToolContext {
    /// Create a new tool context.
    pub fn new(tool_call_id: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            session_id: None,
            caller_agent_id: None,
            cancel: CancellationToken::new(),
            data: HashMap::new(),
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_caller(mut self, agent_id: impl Into<String>) -> Self {
        self.caller_agent_id = Some(agent_id.into());
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Check if the caller cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Get a value from the context data.
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        self.data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Set a value in the context data.
    pub fn set<T: Serialize>(&mut self, key: impl Into<String>, value: T) {
        if let Ok(v) = serde_json::to_value(value) {
            self.data.insert(key.into(), v);
        }
    }
}
