//! Agent registry: the bounded ownership container for live agents.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use conclave_protocols::agent::Agent;
use conclave_protocols::error::RegistryError;
use conclave_protocols::types::StatusSnapshot;

use super::base::{BaseRegistry, Registerable};

/// Default ceiling on live agents.
pub const DEFAULT_MAX_AGENTS: usize = 5;

impl Registerable for dyn Agent {
    fn registry_id(&self) -> &str {
        self.id()
    }
}

/// Id-keyed set of live agents with a concurrency ceiling.
///
/// The ceiling counts agents that are not in a terminal state and is checked
/// at creation time only, before the factory runs, so a refused creation
/// never builds a transport. Creation is serialized by a dedicated lock;
/// lookups and disposal go straight to the map.
pub struct AgentRegistry {
    agents: BaseRegistry<dyn Agent>,
    max_agents: usize,
    creation: Mutex<()>,
}

impl AgentRegistry {
    pub fn new(max_agents: usize) -> Self {
        Self {
            agents: BaseRegistry::new(),
            max_agents,
            creation: Mutex::new(()),
        }
    }

    pub fn max_agents(&self) -> usize {
        self.max_agents
    }

    /// Agents not in `Error` or `ShutDown`.
    pub fn live_count(&self) -> usize {
        self.agents
            .values()
            .iter()
            .filter(|agent| !agent.status().state.is_terminal())
            .count()
    }

    /// Total number of entries, terminal ones included.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    fn ensure_capacity(&self) -> Result<(), RegistryError> {
        if self.live_count() >= self.max_agents {
            warn!(limit = self.max_agents, "Agent ceiling reached");
            return Err(RegistryError::CeilingReached {
                limit: self.max_agents,
            });
        }
        Ok(())
    }

    /// Register an already constructed agent.
    pub fn insert(&self, agent: Arc<dyn Agent>) -> Result<(), RegistryError> {
        let _guard = self.creation.lock();
        if self.agents.contains(agent.id()) {
            return Err(RegistryError::AlreadyRegistered(agent.id().to_string()));
        }
        self.ensure_capacity()?;
        self.agents.register(agent)
    }

    /// Build and register a new agent if the ceiling allows it.
    pub fn create<F, E>(&self, factory: F) -> Result<Arc<dyn Agent>, E>
    where
        F: FnOnce() -> Result<Arc<dyn Agent>, E>,
        E: From<RegistryError>,
    {
        let _guard = self.creation.lock();
        self.ensure_capacity()?;
        let agent = factory()?;
        self.agents.register(agent.clone())?;
        info!(agent_id = %agent.id(), kind = %agent.identity().kind, "Agent created");
        Ok(agent)
    }

    /// Return the agent registered under `id`, building it with `factory`
    /// when absent. The factory must give the agent the id it is passed.
    pub fn get_or_create<F, E>(&self, id: &str, factory: F) -> Result<Arc<dyn Agent>, E>
    where
        F: FnOnce(&str) -> Result<Arc<dyn Agent>, E>,
        E: From<RegistryError>,
    {
        let _guard = self.creation.lock();
        if let Some(agent) = self.agents.get(id) {
            return Ok(agent);
        }
        self.ensure_capacity()?;
        let agent = factory(id)?;
        self.agents.register(agent.clone())?;
        info!(agent_id = %agent.id(), kind = %agent.identity().kind, "Agent created");
        Ok(agent)
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Agent>> {
        self.agents.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.agents.contains(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.agents.list_ids()
    }

    /// Status snapshots of every registered agent.
    pub fn list(&self) -> Vec<StatusSnapshot> {
        self.agents.values().iter().map(|agent| agent.status()).collect()
    }

    /// Remove an agent and shut its transport down.
    pub async fn dispose(&self, id: &str) -> Result<(), RegistryError> {
        let agent = self
            .agents
            .remove(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        Self::shutdown_agent(agent).await;
        Ok(())
    }

    /// Dispose every agent.
    pub async fn dispose_all(&self) {
        for id in self.agents.list_ids() {
            if let Some(agent) = self.agents.remove(&id) {
                Self::shutdown_agent(agent).await;
            }
        }
    }

    /// Dispose agents in `Error` or `ShutDown`. Returns the removed ids.
    pub async fn prune_terminal(&self) -> Vec<String> {
        let terminal: Vec<String> = self
            .agents
            .values()
            .iter()
            .filter(|agent| agent.status().state.is_terminal())
            .map(|agent| agent.id().to_string())
            .collect();

        let mut pruned = Vec::with_capacity(terminal.len());
        for id in terminal {
            if let Some(agent) = self.agents.remove(&id) {
                Self::shutdown_agent(agent).await;
                pruned.push(id);
            }
        }
        if !pruned.is_empty() {
            debug!(count = pruned.len(), "Pruned terminal agents");
        }
        pruned
    }

    async fn shutdown_agent(agent: Arc<dyn Agent>) {
        let id = agent.id().to_string();
        match agent.shutdown().await {
            Ok(()) => info!(agent_id = %id, "Agent disposed"),
            Err(e) => warn!(agent_id = %id, error = %e, "Agent shutdown reported an error"),
        }
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_AGENTS)
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
