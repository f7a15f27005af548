//! `hand_off_to_agent`: forward a task to an existing agent.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use conclave_protocols::agent::{collect_response, Agent};
use conclave_protocols::error::{CoordinationError, ToolError};
use conclave_protocols::tool::{FailureKind, Tool, ToolContext, ToolDefinition, ToolResult};
use conclave_protocols::types::{AgentLifecycleState, AgentMessage};

use super::exchange_failure;
use crate::coordination::Coordination;
use crate::supervisor::TaskKind;

fn default_wait() -> bool {
    true
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct HandOffParams {
    pub target_agent_id: String,
    pub task: String,
    /// Extra data passed along with the task.
    #[serde(default)]
    pub context: Map<String, Value>,
    /// Wait for the target's response instead of returning once sent.
    #[serde(default = "default_wait")]
    pub wait_for_completion: bool,
    /// Bound on the wait. Only used with `wait_for_completion`.
    #[serde(default)]
    #[schemars(range(min = 1))]
    pub timeout_seconds: Option<u64>,
}

/// Refuse targets that cannot take a task right now.
pub fn check_target(agent: &dyn Agent) -> Result<(), CoordinationError> {
    let id = agent.id().to_string();
    match agent.status().state {
        AgentLifecycleState::Idle => Ok(()),
        state if state.is_working() => Err(CoordinationError::Busy(id)),
        state => Err(CoordinationError::Unavailable { id, state }),
    }
}

fn handoff_message(params: &HandOffParams, ctx: &ToolContext) -> AgentMessage {
    let content = if params.context.is_empty() {
        params.task.clone()
    } else {
        let context = serde_json::to_string_pretty(&params.context).unwrap_or_default();
        format!("{}\n\nContext:\n{}", params.task, context)
    };

    let mut message = AgentMessage::user(content).with_metadata(
        "handoff",
        json!({
            "source_tool_call_id": ctx.tool_call_id,
            "source_agent_id": ctx.caller_agent_id,
            "handed_off_at": Utc::now().to_rfc3339(),
            "context": params.context,
        }),
    );
    if let Some(session) = &ctx.session_id {
        message = message.with_session(session);
    }
    message
}

/// Hand a task to another agent, optionally waiting for its answer.
pub struct HandOffTool {
    definition: ToolDefinition,
    coordination: Arc<Coordination>,
}

impl HandOffTool {
    pub const ID: &'static str = "hand_off_to_agent";

    pub fn new(coordination: Arc<Coordination>) -> Self {
        let definition = ToolDefinition::new(
            Self::ID,
            "Hand Off To Agent",
            "Send a task to an existing idle agent. With wait_for_completion the \
             target's full response is returned; otherwise the task runs in the \
             background.",
        )
        .with_parameters::<HandOffParams>();

        Self {
            definition,
            coordination,
        }
    }

    async fn hand_off_and_wait(
        &self,
        target: &dyn Agent,
        message: AgentMessage,
        timeout: Duration,
        ctx: &ToolContext,
    ) -> ToolResult {
        let cancel = ctx.cancel.child_token();
        let exchange = async {
            let stream = target.try_send_message_stream(message, cancel.clone()).await?;
            collect_response(stream).await
        };

        match tokio::time::timeout(timeout, exchange).await {
            Ok(Ok(response)) => {
                info!(target = %target.id(), message_id = %response.message_id, "Hand-off completed");
                ToolResult::success(response.content.clone()).with_structured_output(json!({
                    "target_agent_id": target.id(),
                    "message_id": response.message_id,
                    "content": response.content,
                    "usage": response.usage,
                    "tool_calls": response.tool_calls,
                }))
            }
            Ok(Err(e)) => {
                warn!(target = %target.id(), error = %e, "Hand-off failed");
                exchange_failure(target, e)
            }
            Err(_) => {
                cancel.cancel();
                warn!(target = %target.id(), timeout_secs = timeout.as_secs(), "Hand-off timed out");
                ToolResult::failure(
                    FailureKind::Timeout,
                    format!(
                        "Agent '{}' did not finish within {} seconds",
                        target.id(),
                        timeout.as_secs()
                    ),
                )
                .with_structured_output(json!({
                    "target_agent_id": target.id(),
                    "timeout_seconds": timeout.as_secs(),
                }))
            }
        }
    }

    async fn hand_off_detached(&self, target: &dyn Agent, message: AgentMessage) -> ToolResult {
        let supervisor = &self.coordination.supervisor;
        match target
            .try_send_message_stream(message, supervisor.cancel_token())
            .await
        {
            Ok(stream) => {
                let task_id = supervisor.supervise(target.id(), TaskKind::HandOff, stream);
                info!(target = %target.id(), task_id = %task_id, "Hand-off started");
                ToolResult::success_json(json!({
                    "target_agent_id": target.id(),
                    "task_id": task_id,
                    "status": "started",
                }))
            }
            Err(e) => {
                warn!(target = %target.id(), error = %e, "Hand-off not sent");
                exchange_failure(target, e)
            }
        }
    }
}

#[async_trait]
impl Tool for HandOffTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let params: HandOffParams = serde_json::from_value(params)
            .map_err(|e| ToolError::InvalidParameters(e.to_string()))?;

        let Some(target) = self.coordination.registry.get(&params.target_agent_id) else {
            return Ok(ToolResult::coordination_failure(&CoordinationError::NotFound(
                params.target_agent_id,
            )));
        };
        if let Err(refusal) = check_target(target.as_ref()) {
            debug!(target = %target.id(), reason = %refusal, "Hand-off refused");
            return Ok(ToolResult::coordination_failure(&refusal));
        }

        let message = handoff_message(&params, &ctx);
        let result = if params.wait_for_completion {
            let timeout = params
                .timeout_seconds
                .map(Duration::from_secs)
                .unwrap_or(self.coordination.defaults.timeout);
            self.hand_off_and_wait(target.as_ref(), message, timeout, &ctx)
                .await
        } else {
            self.hand_off_detached(target.as_ref(), message).await
        };
        Ok(result)
    }
}
