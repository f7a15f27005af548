//! Agent identity and capability descriptor.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which transport backs an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackingKind {
    /// A long-lived child process driven over stdin/stdout.
    Subprocess,
    /// A remote provider reached over an HTTP event stream.
    HttpProvider,
}

impl fmt::Display for BackingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackingKind::Subprocess => write!(f, "subprocess"),
            BackingKind::HttpProvider => write!(f, "http_provider"),
        }
    }
}

/// What an agent can do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentCapabilities {
    /// Whether responses arrive incrementally.
    #[serde(default = "default_true")]
    pub streaming: bool,
    /// Whether the agent can execute tools.
    #[serde(default)]
    pub tools: bool,
    /// Maximum output tokens per exchange, if bounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Maximum concurrent requests. Exchanges are single-flight, so this is 1
    /// for every agent the runtime builds.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: u32,
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent_requests() -> u32 {
    1
}

impl Default for AgentCapabilities {
    fn default() -> Self {
        Self {
            streaming: true,
            tools: false,
            max_tokens: None,
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

/// Identity of one managed agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentIdentity {
    /// Unique ID, the registry key.
    pub id: String,
    /// Human-readable display name.
    pub name: String,
    /// Backing transport.
    pub kind: BackingKind,
    /// Capability descriptor.
    #[serde(default)]
    pub capabilities: AgentCapabilities,
    /// Model served by this agent, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl AgentIdentity {
    /// Create an identity with a freshly generated ID.
    pub fn new(name: impl Into<String>, kind: BackingKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            kind,
            capabilities: AgentCapabilities::default(),
            model: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_capabilities(mut self, capabilities: AgentCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_new_generates_id() {
        let a = AgentIdentity::new("writer", BackingKind::Subprocess);
        let b = AgentIdentity::new("writer", BackingKind::Subprocess);
        assert_ne!(a.id, b.id);
        assert_eq!(a.capabilities.max_concurrent_requests, 1);
    }

    #[test]
    fn test_backing_kind_serialize() {
        assert_eq!(
            serde_json::to_string(&BackingKind::HttpProvider).unwrap(),
            "\"http_provider\""
        );
        assert_eq!(BackingKind::Subprocess.to_string(), "subprocess");
    }

    #[test]
    fn test_identity_builders() {
        let identity = AgentIdentity::new("critic", BackingKind::HttpProvider)
            .with_id("agent-1")
            .with_model("gpt-4o");
        assert_eq!(identity.id, "agent-1");
        assert_eq!(identity.model.as_deref(), Some("gpt-4o"));
    }
}
