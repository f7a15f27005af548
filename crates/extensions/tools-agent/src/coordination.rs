//! Shared state behind the coordination tools.

use std::sync::Arc;
use std::time::Duration;

use conclave_config::RuntimeConfig;
use conclave_core::AgentRegistry;
use conclave_monitor::HealthMonitor;

use crate::factory::AgentFactory;
use crate::supervisor::TaskSupervisor;

/// Fallbacks for parameters a tool call leaves out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinationDefaults {
    pub timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for CoordinationDefaults {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(5),
        }
    }
}

impl From<&RuntimeConfig> for CoordinationDefaults {
    fn from(config: &RuntimeConfig) -> Self {
        Self {
            timeout: config.default_timeout(),
            poll_interval: config.poll_interval(),
        }
    }
}

pub struct Coordination {
    pub(crate) registry: Arc<AgentRegistry>,
    pub(crate) factory: Arc<AgentFactory>,
    pub(crate) supervisor: Arc<TaskSupervisor>,
    pub(crate) monitor: Option<Arc<HealthMonitor>>,
    pub(crate) defaults: CoordinationDefaults,
}

impl Coordination {
    pub fn new(
        registry: Arc<AgentRegistry>,
        factory: Arc<AgentFactory>,
        supervisor: Arc<TaskSupervisor>,
    ) -> Self {
        Self {
            registry,
            factory,
            supervisor,
            monitor: None,
            defaults: CoordinationDefaults::default(),
        }
    }

    /// Agents created by `create_agent` are handed to `monitor`.
    pub fn with_monitor(mut self, monitor: Arc<HealthMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn with_defaults(mut self, defaults: CoordinationDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn supervisor(&self) -> &Arc<TaskSupervisor> {
        &self.supervisor
    }

    pub fn defaults(&self) -> CoordinationDefaults {
        self.defaults
    }
}
