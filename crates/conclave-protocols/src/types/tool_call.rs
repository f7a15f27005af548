//! Tool call and tool execution result types.

use serde::{Deserialize, Serialize};

/// A tool invocation requested by or sent to an agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Parameter map.
    #[serde(default)]
    pub parameters: serde_json::Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            parameters,
        }
    }
}

/// Outcome of executing a [`ToolCall`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    pub tool_call_id: String,
    pub name: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl ToolExecutionResult {
    pub fn success(call: &ToolCall, output: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            success: true,
            output: Some(output.into()),
            error: None,
            duration_ms,
        }
    }

    pub fn failure(call: &ToolCall, error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            success: false,
            output: None,
            error: Some(error.into()),
            duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_execution_result_success() {
        let call = ToolCall::new("read_file", serde_json::json!({"path": "a.txt"}));
        let result = ToolExecutionResult::success(&call, "contents", 12);
        assert!(result.success);
        assert_eq!(result.tool_call_id, call.id);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_tool_execution_result_failure_serialize() {
        let call = ToolCall::new("read_file", serde_json::Value::Null);
        let result = ToolExecutionResult::failure(&call, "no such file", 3);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "no such file");
        assert!(json.get("output").is_none());
    }
}
