//! Persistence collaborator.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::AgentMessage;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to write message: {0}")]
    Write(String),
}

/// Receives each finalized assistant message after its exchange completes.
///
/// Store failures never fail the exchange; the runtime logs them.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn store(&self, agent_id: &str, message: &AgentMessage) -> Result<(), StoreError>;
}
