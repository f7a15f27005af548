//! Tool execution result types.

use serde::{Deserialize, Serialize};

use crate::error::CoordinationError;
use crate::types::Metadata;

/// Why a tool call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NotFound,
    Busy,
    Unavailable,
    CeilingReached,
    AlreadyExists,
    /// Wait or hand-off bound exceeded. Distinct from coordination refusals.
    Timeout,
    InvalidParameters,
    Startup,
    Exchange,
    Cancelled,
}

impl From<&CoordinationError> for FailureKind {
    fn from(err: &CoordinationError) -> Self {
        match err {
            CoordinationError::NotFound(_) => FailureKind::NotFound,
            CoordinationError::Busy(_) => FailureKind::Busy,
            CoordinationError::Unavailable { .. } => FailureKind::Unavailable,
            CoordinationError::CeilingReached { .. } => FailureKind::CeilingReached,
            CoordinationError::AlreadyExists(_) => FailureKind::AlreadyExists,
        }
    }
}

/// Result of a tool execution.
///
/// Failures are values (`success: false`), never errors, so a coordinating
/// agent can reason about them without aborting its own exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the execution was successful.
    pub success: bool,

    /// Output content.
    pub content: String,

    /// Structured output (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub structured_output: Option<serde_json::Value>,

    /// Error message if execution failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Failure classification if execution failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,

    /// Additional metadata about the execution.
    #[serde(default)]
    pub metadata: Metadata,
}

impl ToolResult {
    /// Create a successful result with text content.
    pub fn success(content: impl Into<String>) -> Self {
        Self {
            success: true,
            content: content.into(),
            structured_output: None,
            error: None,
            failure_kind: None,
            metadata: Metadata::new(),
        }
    }

    /// Create a successful result with structured output.
    pub fn success_json(output: serde_json::Value) -> Self {
        let content = serde_json::to_string_pretty(&output).unwrap_or_default();
        Self {
            structured_output: Some(output),
            ..Self::success(content)
        }
    }

    /// Create a classified failure.
    pub fn failure(kind: FailureKind, error: impl Into<String>) -> Self {
        Self {
            success: false,
            content: String::new(),
            structured_output: None,
            error: Some(error.into()),
            failure_kind: Some(kind),
            metadata: Metadata::new(),
        }
    }

    /// Create a failure from a coordination refusal.
    pub fn coordination_failure(err: &CoordinationError) -> Self {
        Self::failure(FailureKind::from(err), err.to_string())
    }

    /// Attach structured output to a result.
    pub fn with_structured_output(mut self, output: serde_json::Value) -> Self {
        self.structured_output = Some(output);
        self
    }

    /// Add metadata to the result.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
#[path = "result_tests.rs"]
mod tests;
