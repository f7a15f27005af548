//! Agent errors.

use thiserror::Error;

use crate::types::AgentLifecycleState;

#[derive(Debug, Error)]
pub enum AgentError {
    /// Executable or credentials missing; fatal to initialization.
    #[error("Agent failed to start: {0}")]
    Startup(String),

    /// Broken pipe, closed stream or provider HTTP error.
    #[error("Communication failure: {0}")]
    Communication(String),

    /// The peer reported an error frame.
    #[error("Agent reported an error: {0}")]
    Remote(String),

    #[error("Agent {0} is already initialized")]
    AlreadyInitialized(String),

    #[error("Agent {id} is not ready (state: {state})")]
    NotReady {
        id: String,
        state: AgentLifecycleState,
    },

    #[error("Agent {0} is in error state: {1}")]
    Faulted(String, String),

    #[error("Agent {0} has been shut down")]
    ShutDown(String),

    #[error("Agent {0} is busy")]
    Busy(String),

    #[error("Exchange was cancelled")]
    Cancelled,

    #[error("Timed out after {0} seconds")]
    Timeout(u64),

    #[error("Tool execution failed: {0}")]
    Tool(String),
}

impl AgentError {
    /// Whether this error means the transport is unusable.
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, AgentError::Communication(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_error_startup() {
        let err = AgentError::Startup("executable not found: claude".to_string());
        assert!(err.to_string().contains("failed to start"));
        assert!(err.to_string().contains("claude"));
    }

    #[test]
    fn test_agent_error_not_ready() {
        let err = AgentError::NotReady {
            id: "agent-1".to_string(),
            state: AgentLifecycleState::Uninitialized,
        };
        assert!(err.to_string().contains("uninitialized"));
    }

    #[test]
    fn test_agent_error_transport_classification() {
        assert!(AgentError::Communication("broken pipe".to_string()).is_transport_failure());
        assert!(!AgentError::Remote("rate limited".to_string()).is_transport_failure());
        assert!(!AgentError::Cancelled.is_transport_failure());
    }

    #[test]
    fn test_agent_error_busy() {
        let err = AgentError::Busy("agent-2".to_string());
        assert_eq!(err.to_string(), "Agent agent-2 is busy");
    }
}
