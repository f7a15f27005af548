//! Coordination tools: spawn, hand-off and wait.

mod create;
mod hand_off;
mod wait;

pub use create::*;
pub use hand_off::*;
pub use wait::*;

use conclave_protocols::agent::Agent;
use conclave_protocols::error::{AgentError, CoordinationError};
use conclave_protocols::tool::{FailureKind, ToolResult};
use conclave_protocols::types::AgentLifecycleState;

/// Classify an exchange that could not be started or did not finish.
pub(crate) fn exchange_failure(agent: &dyn Agent, err: AgentError) -> ToolResult {
    let id = agent.id().to_string();
    match err {
        AgentError::Busy(_) => ToolResult::coordination_failure(&CoordinationError::Busy(id)),
        AgentError::NotReady { state, .. } => {
            ToolResult::coordination_failure(&CoordinationError::Unavailable { id, state })
        }
        AgentError::Faulted(..) => ToolResult::coordination_failure(&CoordinationError::Unavailable {
            id,
            state: AgentLifecycleState::Error,
        }),
        AgentError::ShutDown(_) => {
            ToolResult::coordination_failure(&CoordinationError::Unavailable {
                id,
                state: AgentLifecycleState::ShutDown,
            })
        }
        AgentError::Cancelled => ToolResult::failure(FailureKind::Cancelled, err.to_string()),
        AgentError::Timeout(_) => ToolResult::failure(FailureKind::Timeout, err.to_string()),
        AgentError::Startup(_) => ToolResult::failure(FailureKind::Startup, err.to_string()),
        other => ToolResult::failure(FailureKind::Exchange, other.to_string()),
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
