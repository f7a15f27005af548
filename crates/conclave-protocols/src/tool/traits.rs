//! Tool trait definition.

use async_trait::async_trait;

use super::{ToolContext, ToolDefinition, ToolResult};
use crate::error::ToolError;

/// Core trait for tools.
///
/// Parameters are validated against the definition's JSON schema before
/// `execute` is called, so implementations can deserialize straight into
/// their typed parameter struct.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool definition.
    fn definition(&self) -> &ToolDefinition;

    /// Execute the tool with the given parameters.
    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: ToolContext,
    ) -> Result<ToolResult, ToolError>;

    /// Validate the parameters against the definition's schema.
    fn validate(&self, params: &serde_json::Value) -> Result<(), ToolError> {
        let Some(schema) = &self.definition().parameters_schema else {
            return Ok(());
        };
        let validator = jsonschema::validator_for(schema)
            .map_err(|e| ToolError::InvalidSchema(e.to_string()))?;
        let errors: Vec<String> = validator.iter_errors(params).map(|e| e.to_string()).collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ToolError::ValidationFailed(errors.join("; ")))
        }
    }
}
