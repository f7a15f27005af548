//! Builds agents from provider configuration.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

use conclave_config::{Config, ProviderConfig};
use conclave_core::ToolRegistry;
use conclave_protocols::agent::Agent;
use conclave_protocols::error::{AgentError, CoordinationError, RegistryError};
use conclave_protocols::tool::{FailureKind, ToolResult};
use conclave_protocols::types::{AgentIdentity, BackingKind};
use conclave_runtime::{Collaborators, HttpProviderAgent, SubprocessAgent};

/// Environment variables passed to subprocess agents.
pub const MODEL_ENV: &str = "CONCLAVE_MODEL";
pub const TOOLS_ENV: &str = "CONCLAVE_TOOLS";

/// Why an agent could not be created.
#[derive(Debug, Error)]
pub enum CreateError {
    #[error(transparent)]
    Coordination(#[from] CoordinationError),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("No provider configured")]
    NoProvider,

    #[error(transparent)]
    Agent(#[from] AgentError),
}

impl From<RegistryError> for CreateError {
    fn from(err: RegistryError) -> Self {
        CreateError::Coordination(err.into())
    }
}

impl CreateError {
    pub fn to_tool_result(&self) -> ToolResult {
        match self {
            CreateError::Coordination(err) => ToolResult::coordination_failure(err),
            CreateError::UnknownProvider(_) | CreateError::NoProvider => {
                ToolResult::failure(FailureKind::InvalidParameters, self.to_string())
            }
            CreateError::Agent(_) => ToolResult::failure(FailureKind::Startup, self.to_string()),
        }
    }
}

/// What to build.
#[derive(Debug, Clone, Default)]
pub struct AgentSpec {
    pub name: String,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    /// Tool IDs the agent may use. Empty means all.
    pub tools: Vec<String>,
    /// Provider name, or a provider kind (`subprocess`, `http`).
    pub provider: Option<String>,
    pub system_prompt: Option<String>,
}

impl AgentSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

pub struct AgentFactory {
    providers: BTreeMap<String, ProviderConfig>,
    default_provider: Option<String>,
    collaborators: Collaborators,
    tools: Option<Arc<ToolRegistry>>,
    grace: Duration,
}

impl AgentFactory {
    pub fn new(providers: HashMap<String, ProviderConfig>, default_provider: Option<String>) -> Self {
        Self {
            providers: providers.into_iter().collect(),
            default_provider,
            collaborators: Collaborators::default(),
            tools: None,
            grace: Duration::from_secs(5),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.providers.clone(),
            config.runtime.default_provider.clone(),
        )
        .with_grace(config.runtime.shutdown_grace())
    }

    pub fn with_collaborators(mut self, collaborators: Collaborators) -> Self {
        self.collaborators = collaborators;
        self
    }

    /// Tool registry handed to provider agents.
    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Find the provider for `requested`: a provider name first, then the
    /// first provider of that kind. Without a request, the default provider
    /// or the only one configured.
    pub fn resolve(&self, requested: Option<&str>) -> Result<(&str, &ProviderConfig), CreateError> {
        match requested {
            Some(wanted) => self
                .providers
                .get_key_value(wanted)
                .or_else(|| {
                    self.providers
                        .iter()
                        .find(|(_, provider)| provider.kind_name() == wanted)
                })
                .map(|(name, provider)| (name.as_str(), provider))
                .ok_or_else(|| CreateError::UnknownProvider(wanted.to_string())),
            None => match &self.default_provider {
                Some(name) => self.resolve(Some(name.as_str())),
                None if self.providers.len() == 1 => self
                    .providers
                    .iter()
                    .next()
                    .map(|(name, provider)| (name.as_str(), provider))
                    .ok_or(CreateError::NoProvider),
                None => Err(CreateError::NoProvider),
            },
        }
    }

    /// Build an uninitialized agent for `spec`.
    pub fn build(&self, spec: &AgentSpec) -> Result<Arc<dyn Agent>, CreateError> {
        let (provider_name, provider) = self.resolve(spec.provider.as_deref())?;

        let agent: Arc<dyn Agent> = match provider {
            ProviderConfig::Subprocess(base) => {
                let mut config = base.clone();
                if let Some(model) = &spec.model {
                    config.model = Some(model.clone());
                }
                if let Some(model) = &config.model {
                    config.env.insert(MODEL_ENV.to_string(), model.clone());
                }
                if !spec.tools.is_empty() {
                    config.env.insert(TOOLS_ENV.to_string(), spec.tools.join(","));
                }
                if spec.temperature.is_some() {
                    debug!(provider = %provider_name, "Temperature is not applied to subprocess agents");
                }

                let mut identity = AgentIdentity::new(&spec.name, BackingKind::Subprocess);
                identity.capabilities.tools = true;
                identity.model = config.model.clone();
                Arc::new(
                    SubprocessAgent::with_identity(identity, config, self.collaborators.clone())
                        .with_grace(self.grace),
                )
            }
            ProviderConfig::Http(base) => {
                let mut config = base.clone();
                if let Some(model) = &spec.model {
                    config.model = Some(model.clone());
                }
                if let Some(temperature) = spec.temperature {
                    config.temperature = Some(temperature);
                }

                let identity = AgentIdentity::new(&spec.name, BackingKind::HttpProvider);
                let mut agent =
                    HttpProviderAgent::with_identity(identity, config, self.collaborators.clone());
                if let Some(prompt) = &spec.system_prompt {
                    agent = agent.with_system_prompt(prompt);
                }
                if let Some(tools) = &self.tools {
                    agent = agent.with_tools(Arc::clone(tools));
                    if !spec.tools.is_empty() {
                        agent = agent.with_allowed_tools(spec.tools.clone());
                    }
                }
                Arc::new(agent)
            }
        };

        debug!(
            agent_id = %agent.id(),
            name = %spec.name,
            provider = %provider_name,
            kind = %agent.identity().kind,
            "Built agent"
        );
        Ok(agent)
    }
}
