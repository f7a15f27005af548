//! In-memory message store.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use conclave_protocols::store::{MessageStore, StoreError};
use conclave_protocols::types::AgentMessage;

/// Keeps finalized messages per agent in memory.
#[derive(Default)]
pub struct MemoryMessageStore {
    messages: RwLock<HashMap<String, Vec<AgentMessage>>>,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages stored for `agent_id`, oldest first.
    pub fn messages(&self, agent_id: &str) -> Vec<AgentMessage> {
        self.messages
            .read()
            .get(agent_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn total(&self) -> usize {
        self.messages.read().values().map(Vec::len).sum()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn store(&self, agent_id: &str, message: &AgentMessage) -> Result<(), StoreError> {
        self.messages
            .write()
            .entry(agent_id.to_string())
            .or_default()
            .push(message.clone());
        Ok(())
    }
}
