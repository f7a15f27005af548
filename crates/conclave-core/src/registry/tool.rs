//! Tool registry: validation and dispatch.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use conclave_protocols::error::{RegistryError, ToolError};
use conclave_protocols::tool::{FailureKind, Tool, ToolContext, ToolDefinition, ToolResult};

use super::base::{BaseRegistry, Registerable};

impl Registerable for dyn Tool {
    fn registry_id(&self) -> &str {
        &self.definition().id
    }
}

/// Registry for managing tools.
pub struct ToolRegistry {
    inner: BaseRegistry<dyn Tool>,
}

impl ToolRegistry {
    /// Create a new tool registry.
    pub fn new() -> Self {
        Self {
            inner: BaseRegistry::new(),
        }
    }

    /// Register a tool.
    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        self.inner.register(tool)
    }

    /// Unregister a tool.
    pub fn unregister(&self, id: &str) -> Result<(), RegistryError> {
        self.inner.unregister(id)
    }

    /// Get a tool by ID.
    pub fn get(&self, id: &str) -> Option<Arc<dyn Tool>> {
        self.inner.get(id)
    }

    /// List all tool definitions.
    pub fn list(&self) -> Vec<ToolDefinition> {
        self.inner.values().iter().map(|t| t.definition().clone()).collect()
    }

    /// Tool definitions in OpenAI function calling format.
    pub fn openai_functions(&self) -> Vec<serde_json::Value> {
        self.inner
            .values()
            .iter()
            .map(|t| t.definition().to_openai_function())
            .collect()
    }

    /// Validate and execute a tool.
    ///
    /// Never fails: unknown tools, invalid parameters and execution errors
    /// are all folded into an unsuccessful [`ToolResult`].
    pub async fn execute(
        &self,
        id: &str,
        params: serde_json::Value,
        ctx: ToolContext,
    ) -> ToolResult {
        let Some(tool) = self.get(id) else {
            return ToolResult::failure(
                FailureKind::NotFound,
                ToolError::NotFound(id.to_string()).to_string(),
            );
        };

        if let Err(e) = tool.validate(&params) {
            debug!(tool = %id, error = %e, "Rejected tool parameters");
            return ToolResult::failure(FailureKind::InvalidParameters, e.to_string());
        }

        let start = Instant::now();
        let result = tool.execute(params, ctx).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(result) => {
                debug!(tool = %id, success = result.success, duration_ms, "Tool executed");
                result.with_metadata("duration_ms", serde_json::json!(duration_ms))
            }
            Err(e) => {
                warn!(tool = %id, error = %e, duration_ms, "Tool execution failed");
                ToolResult::failure(Self::failure_kind(&e), e.to_string())
                    .with_metadata("duration_ms", serde_json::json!(duration_ms))
            }
        }
    }

    fn failure_kind(err: &ToolError) -> FailureKind {
        match err {
            ToolError::NotFound(_) => FailureKind::NotFound,
            ToolError::InvalidParameters(_)
            | ToolError::ValidationFailed(_)
            | ToolError::InvalidSchema(_) => FailureKind::InvalidParameters,
            ToolError::Cancelled => FailureKind::Cancelled,
            ToolError::ExecutionFailed(_) => FailureKind::Exchange,
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
