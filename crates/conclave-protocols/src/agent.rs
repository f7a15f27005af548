//! Agent protocol definitions.
//!
//! Every agent backing (subprocess, HTTP provider) implements [`Agent`]. An
//! exchange is single-flight: at most one response stream per agent is live
//! at a time, and the agent returns to `Idle` once that stream is finished or
//! dropped.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::AgentError;
use crate::types::{
    AgentIdentity, AgentMessage, AgentResponse, StatusSnapshot, ToolCall, ToolExecutionResult,
};

/// Response sequence of one exchange.
pub type AgentResponseStream =
    Pin<Box<dyn Stream<Item = Result<AgentResponse, AgentError>> + Send>>;

/// Capability contract shared by all agent backings.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Returns the agent identity.
    fn identity(&self) -> &AgentIdentity;

    /// Returns the agent ID.
    fn id(&self) -> &str {
        &self.identity().id
    }

    /// Start the transport. `Uninitialized`/`Error` → `Idle` on success.
    async fn initialize(&self) -> Result<(), AgentError>;

    /// Start an exchange, waiting for the per-agent lock if another exchange
    /// is in flight.
    async fn send_message_stream(
        &self,
        message: AgentMessage,
        cancel: CancellationToken,
    ) -> Result<AgentResponseStream, AgentError>;

    /// Start an exchange only if the agent is free right now.
    ///
    /// Fails with [`AgentError::Busy`] instead of queueing.
    async fn try_send_message_stream(
        &self,
        message: AgentMessage,
        cancel: CancellationToken,
    ) -> Result<AgentResponseStream, AgentError>;

    /// Run an exchange to completion and return its terminal response.
    async fn send_message(
        &self,
        message: AgentMessage,
        cancel: CancellationToken,
    ) -> Result<AgentResponse, AgentError> {
        let stream = self.send_message_stream(message, cancel).await?;
        collect_response(stream).await
    }

    /// Execute a tool call on behalf of this agent.
    async fn execute_tool(
        &self,
        call: ToolCall,
        cancel: CancellationToken,
    ) -> Result<ToolExecutionResult, AgentError>;

    /// Current status snapshot.
    fn status(&self) -> StatusSnapshot;

    /// Subscribe to status changes, if the backing publishes them.
    fn subscribe_status(&self) -> Option<watch::Receiver<StatusSnapshot>> {
        None
    }

    /// Send a low-cost synthetic message through the ordinary exchange path.
    ///
    /// Uses the non-blocking send so a probe never waits behind, or races,
    /// a real exchange.
    async fn probe(&self, cancel: CancellationToken) -> Result<AgentResponse, AgentError> {
        let stream = self
            .try_send_message_stream(AgentMessage::probe(), cancel)
            .await?;
        collect_response(stream).await
    }

    /// Shut the agent down. Idempotent; always ends in `ShutDown`.
    async fn shutdown(&self) -> Result<(), AgentError>;
}

/// Drain a response stream and return its terminal response.
pub async fn collect_response(
    mut stream: AgentResponseStream,
) -> Result<AgentResponse, AgentError> {
    while let Some(item) = stream.next().await {
        let response = item?;
        if response.is_complete {
            return Ok(response);
        }
    }
    Err(AgentError::Communication(
        "response stream ended without a terminal frame".to_string(),
    ))
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
