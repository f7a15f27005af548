//! Agent lifecycle state and status snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of an agent. Exactly one holds at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentLifecycleState {
    /// Constructed, transport not started.
    Uninitialized,
    /// Transport is being started.
    Initializing,
    /// Ready for an exchange.
    Idle,
    /// An exchange is in flight.
    Busy,
    /// Transport failed; the agent must be re-initialized or disposed.
    Error,
    /// Shut down; terminal.
    ShutDown,
}

impl AgentLifecycleState {
    /// `Error` and `ShutDown`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error | Self::ShutDown)
    }

    /// States a waiter stops on: `Idle`, `Error`, `ShutDown`.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Idle | Self::Error | Self::ShutDown)
    }

    /// States where the agent is doing work and must not accept a hand-off.
    pub fn is_working(&self) -> bool {
        matches!(self, Self::Initializing | Self::Busy)
    }
}

impl fmt::Display for AgentLifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initializing => "initializing",
            Self::Idle => "idle",
            Self::Busy => "busy",
            Self::Error => "error",
            Self::ShutDown => "shut_down",
        };
        f.write_str(s)
    }
}

/// What a busy agent is doing. Metadata on `Busy`, not a state of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusyActivity {
    /// Waiting on the subprocess or remote provider.
    AwaitingProvider,
    /// Executing a tool call.
    ExecutingTool,
}

/// Point-in-time view of an agent's status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub agent_id: String,
    pub state: AgentLifecycleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity: Option<BusyActivity>,
    /// Message currently being exchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_message_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Aggregated content of the last completed exchange.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_output: Option<String>,
    #[serde(default)]
    pub exchanges_completed: u64,
    /// When `state` last changed.
    pub changed_at: DateTime<Utc>,
}

impl StatusSnapshot {
    /// Snapshot of a freshly constructed agent.
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            state: AgentLifecycleState::Uninitialized,
            activity: None,
            current_message_id: None,
            last_error: None,
            last_output: None,
            exchanges_completed: 0,
            changed_at: Utc::now(),
        }
    }
}
