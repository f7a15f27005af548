//! `create_agent`: build, start and brief a new agent.

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use tracing::{debug, info, warn};

use conclave_protocols::error::ToolError;
use conclave_protocols::tool::{FailureKind, Tool, ToolContext, ToolDefinition, ToolResult};
use conclave_protocols::types::AgentMessage;

use super::exchange_failure;
use crate::coordination::Coordination;
use crate::factory::AgentSpec;
use crate::supervisor::TaskKind;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateAgentParams {
    /// Display name of the new agent.
    pub name: String,
    /// First message sent to the agent once it is running.
    pub task: String,
    /// Model override.
    #[serde(default)]
    pub model: Option<String>,
    /// Tool IDs the agent may use. All tools when empty.
    #[serde(default)]
    pub tools: Vec<String>,
    #[serde(default)]
    #[schemars(range(min = 0.0, max = 2.0))]
    pub temperature: Option<f32>,
    /// Provider name, or a provider kind (`subprocess`, `http`).
    #[serde(default)]
    pub provider: Option<String>,
}

/// Create an agent and start its initial task in the background.
pub struct CreateAgentTool {
    definition: ToolDefinition,
    coordination: Arc<Coordination>,
}

impl CreateAgentTool {
    pub const ID: &'static str = "create_agent";

    pub fn new(coordination: Arc<Coordination>) -> Self {
        let definition = ToolDefinition::new(
            Self::ID,
            "Create Agent",
            "Create a new agent and give it an initial task. Returns as soon as the \
             agent is running and the task has been sent; use wait_for_agent to \
             collect the result.",
        )
        .with_parameters::<CreateAgentParams>();

        Self {
            definition,
            coordination,
        }
    }
}

#[async_trait]
impl Tool for CreateAgentTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let params: CreateAgentParams = serde_json::from_value(params)
            .map_err(|e| ToolError::InvalidParameters(e.to_string()))?;
        let coordination = &self.coordination;

        let spec = AgentSpec {
            name: params.name.clone(),
            model: params.model.clone(),
            temperature: params.temperature,
            tools: params.tools.clone(),
            provider: params.provider.clone(),
            system_prompt: None,
        };
        let agent = match coordination
            .registry
            .create(|| coordination.factory.build(&spec))
        {
            Ok(agent) => agent,
            Err(e) => {
                warn!(name = %params.name, error = %e, "Agent creation refused");
                return Ok(e.to_tool_result());
            }
        };
        let agent_id = agent.id().to_string();

        if let Err(e) = agent.initialize().await {
            warn!(agent_id = %agent_id, error = %e, "Agent failed to start");
            if let Err(dispose) = coordination.registry.dispose(&agent_id).await {
                debug!(agent_id = %agent_id, error = %dispose, "Dispose after failed start");
            }
            return Ok(ToolResult::failure(FailureKind::Startup, e.to_string()));
        }

        let mut message = AgentMessage::user(&params.task);
        if let Some(session) = &ctx.session_id {
            message = message.with_session(session);
        }
        if let Some(caller) = &ctx.caller_agent_id {
            message = message.with_metadata("created_by", serde_json::json!(caller));
        }

        let stream = match agent
            .send_message_stream(message, coordination.supervisor.cancel_token())
            .await
        {
            Ok(stream) => stream,
            Err(e) => {
                warn!(agent_id = %agent_id, error = %e, "Initial task could not be sent");
                return Ok(exchange_failure(agent.as_ref(), e));
            }
        };
        let task_id = coordination
            .supervisor
            .supervise(&agent_id, TaskKind::InitialTask, stream);

        if let Some(monitor) = &coordination.monitor {
            if let Err(e) = monitor.start(Arc::clone(&agent)) {
                debug!(agent_id = %agent_id, error = %e, "Health monitoring not started");
            }
        }

        let identity = agent.identity();
        let status = agent.status();
        info!(
            agent_id = %agent_id,
            name = %identity.name,
            kind = %identity.kind,
            task_id = %task_id,
            "Agent created with initial task"
        );

        Ok(ToolResult::success_json(serde_json::json!({
            "agent_id": agent_id,
            "name": identity.name,
            "kind": identity.kind.to_string(),
            "model": identity.model,
            "status": status.state,
            "task_id": task_id,
        })))
    }
}
