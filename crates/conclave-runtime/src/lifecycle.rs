//! Lifecycle state publication.
//!
//! Each agent owns one [`StateCell`]. Transitions go through it so that the
//! watch channel, the event sink and the logs agree on every change.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use conclave_protocols::error::AgentError;
use conclave_protocols::events::{EventSink, RuntimeEvent};
use conclave_protocols::types::{AgentLifecycleState, BusyActivity, StatusSnapshot};

use AgentLifecycleState::*;

pub struct StateCell {
    tx: watch::Sender<StatusSnapshot>,
    events: Arc<dyn EventSink>,
}

impl StateCell {
    pub fn new(agent_id: impl Into<String>, events: Arc<dyn EventSink>) -> Self {
        let (tx, _) = watch::channel(StatusSnapshot::new(agent_id));
        Self { tx, events }
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.tx.borrow().clone()
    }

    pub fn state(&self) -> AgentLifecycleState {
        self.tx.borrow().state
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    /// Apply `update` and publish. Emits a status event when the state changed.
    fn modify(&self, update: impl FnOnce(&mut StatusSnapshot)) {
        let mut change = None;
        self.tx.send_modify(|snapshot| {
            let from = snapshot.state;
            update(snapshot);
            if snapshot.state != from {
                snapshot.changed_at = Utc::now();
                change = Some((snapshot.agent_id.clone(), from, snapshot.state));
            }
            if snapshot.state != Busy {
                snapshot.activity = None;
                snapshot.current_message_id = None;
            }
        });

        if let Some((agent_id, from, to)) = change {
            debug!(agent_id = %agent_id, from = %from, to = %to, "Lifecycle transition");
            self.events.emit(RuntimeEvent::StatusChanged {
                agent_id,
                from,
                to,
                at: Utc::now(),
            });
        }
    }

    /// Check-and-set under the channel's lock.
    fn try_modify<T>(
        &self,
        update: impl FnOnce(&mut StatusSnapshot) -> Result<T, AgentError>,
    ) -> Result<T, AgentError> {
        let mut outcome = None;
        let mut change = None;
        self.tx.send_if_modified(|snapshot| {
            let from = snapshot.state;
            let result = update(snapshot);
            let modified = result.is_ok();
            outcome = Some(result);
            if snapshot.state != from {
                snapshot.changed_at = Utc::now();
                change = Some((snapshot.agent_id.clone(), from, snapshot.state));
            }
            modified
        });

        if let Some((agent_id, from, to)) = change {
            debug!(agent_id = %agent_id, from = %from, to = %to, "Lifecycle transition");
            self.events.emit(RuntimeEvent::StatusChanged {
                agent_id,
                from,
                to,
                at: Utc::now(),
            });
        }
        outcome.unwrap_or(Err(AgentError::Cancelled))
    }

    /// `Uninitialized`/`Error` → `Initializing`.
    pub fn begin_initialize(&self) -> Result<(), AgentError> {
        self.try_modify(|snapshot| match snapshot.state {
            Uninitialized | Error => {
                snapshot.state = Initializing;
                snapshot.last_error = None;
                Ok(())
            }
            ShutDown => Err(AgentError::ShutDown(snapshot.agent_id.clone())),
            Initializing | Idle | Busy => {
                Err(AgentError::AlreadyInitialized(snapshot.agent_id.clone()))
            }
        })
    }

    /// `Initializing` → `Idle`.
    pub fn ready(&self) {
        self.modify(|snapshot| {
            if snapshot.state == Initializing {
                snapshot.state = Idle;
            }
        });
    }

    /// Move to `Error`, recording the reason. Never leaves `ShutDown`.
    pub fn fail(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.modify(|snapshot| {
            if snapshot.state != ShutDown {
                warn!(agent_id = %snapshot.agent_id, reason = %reason, "Agent failed");
                snapshot.state = Error;
                snapshot.last_error = Some(reason);
            }
        });
    }

    /// Terminal. Idempotent.
    pub fn shut_down(&self) {
        self.modify(|snapshot| snapshot.state = ShutDown);
    }

    /// `Idle` → `Busy` for one exchange.
    ///
    /// Callers must hold the agent's exchange lock.
    pub fn begin_exchange(
        self: &Arc<Self>,
        message_id: &str,
        activity: BusyActivity,
    ) -> Result<ExchangeTicket, AgentError> {
        self.try_modify(|snapshot| match snapshot.state {
            Idle => {
                snapshot.state = Busy;
                snapshot.activity = Some(activity);
                snapshot.current_message_id = Some(message_id.to_string());
                Ok(())
            }
            Busy => Err(AgentError::Busy(snapshot.agent_id.clone())),
            Error => Err(AgentError::Faulted(
                snapshot.agent_id.clone(),
                snapshot.last_error.clone().unwrap_or_default(),
            )),
            ShutDown => Err(AgentError::ShutDown(snapshot.agent_id.clone())),
            Uninitialized | Initializing => Err(AgentError::NotReady {
                id: snapshot.agent_id.clone(),
                state: snapshot.state,
            }),
        })?;
        Ok(ExchangeTicket {
            cell: Arc::clone(self),
            settled: false,
        })
    }
}

/// Proof that an exchange holds the agent in `Busy`.
///
/// Dropping an unsettled ticket returns the agent to `Idle`, so every exit
/// path (cancellation, remote error, a dropped stream) releases the state.
pub struct ExchangeTicket {
    cell: Arc<StateCell>,
    settled: bool,
}

impl ExchangeTicket {
    pub fn set_activity(&self, activity: BusyActivity) {
        self.cell.modify(|snapshot| {
            if snapshot.state == Busy {
                snapshot.activity = Some(activity);
            }
        });
    }

    /// Exchange finished with a terminal response: `Busy` → `Idle`.
    pub fn complete(mut self, output: &str) {
        self.settled = true;
        let output = output.to_string();
        self.cell.modify(|snapshot| {
            snapshot.exchanges_completed += 1;
            snapshot.last_output = Some(output);
            if snapshot.state == Busy {
                snapshot.state = Idle;
            }
        });
    }

    /// Exchange ended without a transport failure: `Busy` → `Idle`.
    pub fn release(mut self) {
        self.settled = true;
        Self::to_idle(&self.cell);
    }

    /// Transport failed: `Busy` → `Error`.
    pub fn fail(mut self, reason: impl Into<String>) {
        self.settled = true;
        self.cell.fail(reason);
    }

    fn to_idle(cell: &StateCell) {
        cell.modify(|snapshot| {
            if snapshot.state == Busy {
                snapshot.state = Idle;
            }
        });
    }
}

impl Drop for ExchangeTicket {
    fn drop(&mut self) {
        if !self.settled {
            Self::to_idle(&self.cell);
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
