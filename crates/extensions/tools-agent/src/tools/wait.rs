//! `wait_for_agent`: block until an agent settles or a deadline passes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

use conclave_protocols::error::{CoordinationError, ToolError};
use conclave_protocols::tool::{FailureKind, Tool, ToolContext, ToolDefinition, ToolResult};
use conclave_protocols::types::{AgentLifecycleState, StatusSnapshot};

use crate::coordination::Coordination;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct WaitForAgentParams {
    pub agent_id: String,
    #[serde(default)]
    #[schemars(range(min = 1))]
    pub timeout_seconds: Option<u64>,
    /// Fallback polling period when status changes are not pushed.
    #[serde(default)]
    #[schemars(range(min = 1))]
    pub poll_interval_seconds: Option<u64>,
    /// Include the agent's last completed output.
    #[serde(default)]
    pub return_output: bool,
}

/// One observed state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusObservation {
    pub at: DateTime<Utc>,
    pub state: AgentLifecycleState,
}

/// Observed transitions, timestamps never decreasing.
#[derive(Debug, Default, Serialize)]
#[serde(transparent)]
pub struct StatusHistory(Vec<StatusObservation>);

impl StatusHistory {
    /// Record `snapshot` if its state differs from the last observation.
    pub fn record(&mut self, snapshot: &StatusSnapshot) {
        let last = self.0.last();
        if last.is_some_and(|o| o.state == snapshot.state) {
            return;
        }
        let at = match last {
            Some(previous) if previous.at > snapshot.changed_at => previous.at,
            _ => snapshot.changed_at,
        };
        self.0.push(StatusObservation {
            at,
            state: snapshot.state,
        });
    }

    pub fn observations(&self) -> &[StatusObservation] {
        &self.0
    }
}

enum WaitEnd {
    Settled,
    TimedOut,
    Cancelled,
}

async fn next_change(status: &mut Option<watch::Receiver<StatusSnapshot>>) -> bool {
    match status {
        Some(rx) => rx.changed().await.is_ok(),
        None => std::future::pending().await,
    }
}

/// Wait for an agent to reach `Idle`, `Error` or `ShutDown`.
pub struct WaitForAgentTool {
    definition: ToolDefinition,
    coordination: Arc<Coordination>,
}

impl WaitForAgentTool {
    pub const ID: &'static str = "wait_for_agent";

    pub fn new(coordination: Arc<Coordination>) -> Self {
        let definition = ToolDefinition::new(
            Self::ID,
            "Wait For Agent",
            "Wait until an agent finishes its current work. Succeeds only if the \
             agent ends idle; returns the observed status history either way.",
        )
        .with_parameters::<WaitForAgentParams>();

        Self {
            definition,
            coordination,
        }
    }
}

#[async_trait]
impl Tool for WaitForAgentTool {
    fn definition(&self) -> &ToolDefinition {
        &self.definition
    }

    async fn execute(
        &self,
        params: serde_json::Value,
        ctx: ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let params: WaitForAgentParams = serde_json::from_value(params)
            .map_err(|e| ToolError::InvalidParameters(e.to_string()))?;

        let Some(agent) = self.coordination.registry.get(&params.agent_id) else {
            return Ok(ToolResult::coordination_failure(&CoordinationError::NotFound(
                params.agent_id,
            )));
        };

        let defaults = self.coordination.defaults;
        let timeout = params
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);
        let poll = params
            .poll_interval_seconds
            .map(Duration::from_secs)
            .unwrap_or(defaults.poll_interval);

        let started = Instant::now();
        let deadline = started + timeout;
        let mut history = StatusHistory::default();
        let mut status = agent.subscribe_status();
        let mut snapshot = agent.status();
        history.record(&snapshot);

        let end = loop {
            if snapshot.state.is_settled() {
                break WaitEnd::Settled;
            }
            let open = tokio::select! {
                biased;
                _ = ctx.cancel.cancelled() => break WaitEnd::Cancelled,
                _ = tokio::time::sleep_until(deadline) => break WaitEnd::TimedOut,
                open = next_change(&mut status) => open,
                _ = tokio::time::sleep(poll) => true,
            };
            if !open {
                status = None;
            }
            snapshot = agent.status();
            history.record(&snapshot);
        };
        drop(status);

        let elapsed = started.elapsed();
        let elapsed_ms = elapsed.as_millis() as u64;
        debug!(agent_id = %agent.id(), state = %snapshot.state, elapsed_ms, "Wait ended");

        let mut report = json!({
            "agent_id": agent.id(),
            "state": snapshot.state,
            "elapsed_ms": elapsed_ms,
            "elapsed_seconds": elapsed.as_secs_f64(),
            "status_history": history,
        });

        let result = match end {
            WaitEnd::Settled if snapshot.state == AgentLifecycleState::Idle => {
                info!(agent_id = %agent.id(), elapsed_ms, "Agent finished");
                let content = match (&snapshot.last_output, params.return_output) {
                    (Some(output), true) => {
                        report["output"] = json!(output);
                        output.clone()
                    }
                    _ => format!("Agent '{}' is idle", agent.id()),
                };
                ToolResult::success(content).with_structured_output(report)
            }
            WaitEnd::Settled => {
                if let Some(error) = &snapshot.last_error {
                    report["last_error"] = json!(error);
                }
                ToolResult::failure(
                    FailureKind::Unavailable,
                    CoordinationError::Unavailable {
                        id: agent.id().to_string(),
                        state: snapshot.state,
                    }
                    .to_string(),
                )
                .with_structured_output(report)
            }
            WaitEnd::TimedOut => ToolResult::failure(
                FailureKind::Timeout,
                format!(
                    "Agent '{}' still {} after {} seconds",
                    agent.id(),
                    snapshot.state,
                    timeout.as_secs()
                ),
            )
            .with_structured_output(report),
            WaitEnd::Cancelled => {
                ToolResult::failure(FailureKind::Cancelled, "Wait was cancelled")
                    .with_structured_output(report)
            }
        };
        Ok(result)
    }
}
