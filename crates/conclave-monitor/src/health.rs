//! Health classification records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health classification of one agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Not probed yet.
    Unknown,
    Healthy,
    Unhealthy,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }
}

/// Last known health of a monitored agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHealth {
    pub agent_id: String,
    pub status: HealthStatus,
    /// Unhealthy classifications in a row.
    pub consecutive_failures: u32,
    pub probes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,
}

impl AgentHealth {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            status: HealthStatus::Unknown,
            consecutive_failures: 0,
            probes: 0,
            detail: None,
            last_checked: None,
        }
    }

    /// Apply one classification. Returns the previous status when it changed.
    pub(crate) fn apply(&mut self, healthy: bool, detail: Option<String>) -> Option<HealthStatus> {
        let previous = self.status;
        self.status = if healthy {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        };
        self.consecutive_failures = if healthy {
            0
        } else {
            self.consecutive_failures.saturating_add(1)
        };
        self.probes += 1;
        self.detail = detail;
        self.last_checked = Some(Utc::now());
        (previous != self.status).then_some(previous)
    }
}

/// Broadcast when an agent's classification changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthChange {
    pub agent_id: String,
    pub previous: HealthStatus,
    pub current: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub at: DateTime<Utc>,
}
