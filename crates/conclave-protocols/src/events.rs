//! Runtime events pushed to observers.
//!
//! The runtime only emits; fan-out to UIs or sockets belongs to whoever
//! implements [`EventSink`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::types::{AgentLifecycleState, Usage};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuntimeEvent {
    StatusChanged {
        agent_id: String,
        from: AgentLifecycleState,
        to: AgentLifecycleState,
        at: DateTime<Utc>,
    },
    ResponseCompleted {
        agent_id: String,
        message_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Usage>,
    },
    HealthChanged {
        agent_id: String,
        healthy: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
        at: DateTime<Utc>,
    },
    TaskFinished {
        task_id: String,
        agent_id: String,
        success: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

impl RuntimeEvent {
    /// Agent the event concerns.
    pub fn agent_id(&self) -> &str {
        match self {
            RuntimeEvent::StatusChanged { agent_id, .. }
            | RuntimeEvent::ResponseCompleted { agent_id, .. }
            | RuntimeEvent::HealthChanged { agent_id, .. }
            | RuntimeEvent::TaskFinished { agent_id, .. } => agent_id,
        }
    }
}

/// Push collaborator.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: RuntimeEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: RuntimeEvent) {}
}

/// Logs every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: RuntimeEvent) {
        match &event {
            RuntimeEvent::StatusChanged { agent_id, from, to, .. } => {
                debug!(agent_id = %agent_id, from = %from, to = %to, "Agent status changed");
            }
            RuntimeEvent::ResponseCompleted { agent_id, message_id, .. } => {
                debug!(agent_id = %agent_id, message_id = %message_id, "Response completed");
            }
            RuntimeEvent::HealthChanged { agent_id, healthy, detail, .. } => {
                if *healthy {
                    info!(agent_id = %agent_id, "Agent healthy");
                } else {
                    warn!(agent_id = %agent_id, detail = ?detail, "Agent unhealthy");
                }
            }
            RuntimeEvent::TaskFinished { task_id, agent_id, success, error } => {
                info!(
                    task_id = %task_id,
                    agent_id = %agent_id,
                    success = success,
                    error = ?error,
                    "Background task finished"
                );
            }
        }
    }
}

/// Fans events out to any number of subscribers.
///
/// Slow subscribers lose the oldest events (`RecvError::Lagged`).
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    tx: broadcast::Sender<RuntimeEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventSink for BroadcastEventSink {
    fn emit(&self, event: RuntimeEvent) {
        // No subscribers is not an error.
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization_tag() {
        let event = RuntimeEvent::TaskFinished {
            task_id: "t1".into(),
            agent_id: "a1".into(),
            success: false,
            error: Some("boom".into()),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "task_finished");
        assert_eq!(json["error"], "boom");
        assert_eq!(event.agent_id(), "a1");
    }

    #[tokio::test]
    async fn test_broadcast_sink_delivers() {
        let sink = BroadcastEventSink::new(8);
        let mut rx = sink.subscribe();
        sink.emit(RuntimeEvent::StatusChanged {
            agent_id: "a1".into(),
            from: AgentLifecycleState::Idle,
            to: AgentLifecycleState::Busy,
            at: Utc::now(),
        });
        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event,
            RuntimeEvent::StatusChanged { to: AgentLifecycleState::Busy, .. }
        ));
    }

    #[test]
    fn test_broadcast_sink_without_subscribers() {
        let sink = BroadcastEventSink::default();
        sink.emit(RuntimeEvent::HealthChanged {
            agent_id: "a1".into(),
            healthy: true,
            detail: None,
            at: Utc::now(),
        });
    }
}
