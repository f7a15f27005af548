//! Coordination errors returned by the coordination tools.

use thiserror::Error;

use super::RegistryError;
use crate::types::AgentLifecycleState;

/// A coordination request was refused. The target agent's state is untouched.
#[derive(Debug, Error)]
pub enum CoordinationError {
    #[error("Agent '{0}' not found")]
    NotFound(String),

    #[error("Agent '{0}' is busy")]
    Busy(String),

    #[error("Agent '{id}' is unavailable (state: {state})")]
    Unavailable {
        id: String,
        state: AgentLifecycleState,
    },

    #[error("Maximum number of concurrent agents ({limit}) reached")]
    CeilingReached { limit: usize },

    #[error("Agent '{0}' already exists")]
    AlreadyExists(String),
}

impl From<RegistryError> for CoordinationError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::CeilingReached { limit } => CoordinationError::CeilingReached { limit },
            RegistryError::NotFound(id) => CoordinationError::NotFound(id),
            RegistryError::AlreadyRegistered(id) => CoordinationError::AlreadyExists(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = CoordinationError::NotFound("ghost".to_string());
        assert!(err.to_string().contains("not found"));
        assert!(err.to_string().contains("ghost"));
    }

    #[test]
    fn test_ceiling_message() {
        let err = CoordinationError::CeilingReached { limit: 5 };
        assert_eq!(
            err.to_string(),
            "Maximum number of concurrent agents (5) reached"
        );
    }

    #[test]
    fn test_from_registry_error() {
        let err: CoordinationError = RegistryError::CeilingReached { limit: 3 }.into();
        assert!(matches!(err, CoordinationError::CeilingReached { limit: 3 }));
    }
}
