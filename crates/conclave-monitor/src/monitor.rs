//! Per-agent probe timers.

use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use conclave_config::HealthConfig;
use conclave_protocols::agent::Agent;
use conclave_protocols::error::AgentError;
use conclave_protocols::events::{EventSink, NoopEventSink, RuntimeEvent};
use conclave_protocols::types::AgentLifecycleState;

use crate::error::MonitorError;
use crate::health::{AgentHealth, HealthChange, HealthStatus};

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Result of one probe attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeOutcome {
    Healthy,
    Unhealthy(String),
    /// The agent was working or not started; nothing was learned.
    Skipped,
}

/// Probe `agent` once.
///
/// `Busy` and not-yet-started agents are skipped, `Error` and `ShutDown` are
/// unhealthy without probing. An idle agent gets a synthetic message through
/// the non-blocking send path, bounded by `timeout`.
pub async fn probe_once(
    agent: &dyn Agent,
    timeout: Duration,
    cancel: &CancellationToken,
) -> ProbeOutcome {
    let status = agent.status();
    match status.state {
        AgentLifecycleState::Busy
        | AgentLifecycleState::Uninitialized
        | AgentLifecycleState::Initializing => return ProbeOutcome::Skipped,
        AgentLifecycleState::Error => {
            return ProbeOutcome::Unhealthy(
                status
                    .last_error
                    .unwrap_or_else(|| "agent is in error state".to_string()),
            );
        }
        AgentLifecycleState::ShutDown => {
            return ProbeOutcome::Unhealthy("agent is shut down".to_string());
        }
        AgentLifecycleState::Idle => {}
    }

    match tokio::time::timeout(timeout, agent.probe(cancel.child_token())).await {
        Ok(Ok(_)) => ProbeOutcome::Healthy,
        // Lost the race against a real exchange.
        Ok(Err(AgentError::Busy(_) | AgentError::Cancelled)) => ProbeOutcome::Skipped,
        Ok(Err(e)) => ProbeOutcome::Unhealthy(e.to_string()),
        Err(_) => ProbeOutcome::Unhealthy(format!(
            "probe timed out after {}ms",
            timeout.as_millis()
        )),
    }
}

struct Shared {
    records: DashMap<String, AgentHealth>,
    changes: broadcast::Sender<HealthChange>,
    events: Arc<dyn EventSink>,
}

impl Shared {
    fn record(&self, agent_id: &str, healthy: bool, detail: Option<String>) {
        let Some(mut entry) = self.records.get_mut(agent_id) else {
            return;
        };
        let Some(previous) = entry.apply(healthy, detail.clone()) else {
            return;
        };
        let current = entry.status;
        drop(entry);

        if healthy {
            info!(agent_id = %agent_id, ?previous, "Agent healthy");
        } else {
            warn!(agent_id = %agent_id, ?previous, detail = ?detail, "Agent unhealthy");
        }
        let at = Utc::now();
        let _ = self.changes.send(HealthChange {
            agent_id: agent_id.to_string(),
            previous,
            current,
            detail: detail.clone(),
            at,
        });
        self.events.emit(RuntimeEvent::HealthChanged {
            agent_id: agent_id.to_string(),
            healthy,
            detail,
            at,
        });
    }
}

struct Watch {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Runs one probe timer per monitored agent until stopped.
pub struct HealthMonitor {
    interval: Duration,
    probe_timeout: Duration,
    shared: Arc<Shared>,
    watches: Arc<DashMap<String, Watch>>,
    root: CancellationToken,
}

impl HealthMonitor {
    pub fn new(interval: Duration, probe_timeout: Duration) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            interval,
            probe_timeout,
            shared: Arc::new(Shared {
                records: DashMap::new(),
                changes,
                events: Arc::new(NoopEventSink),
            }),
            watches: Arc::new(DashMap::new()),
            root: CancellationToken::new(),
        }
    }

    pub fn from_config(config: &HealthConfig) -> Self {
        Self::new(config.interval(), config.probe_timeout())
    }

    /// Also report changes as [`RuntimeEvent::HealthChanged`].
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        let changes = self.shared.changes.clone();
        self.shared = Arc::new(Shared {
            records: DashMap::new(),
            changes,
            events,
        });
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HealthChange> {
        self.shared.changes.subscribe()
    }

    /// Start probing `agent` every interval.
    pub fn start(&self, agent: Arc<dyn Agent>) -> Result<(), MonitorError> {
        if self.root.is_cancelled() {
            return Err(MonitorError::ShutDown);
        }
        let agent_id = agent.id().to_string();
        let entry = match self.watches.entry(agent_id.clone()) {
            Entry::Occupied(_) => return Err(MonitorError::AlreadyMonitored(agent_id)),
            Entry::Vacant(entry) => entry,
        };

        self.shared
            .records
            .insert(agent_id.clone(), AgentHealth::new(&agent_id));
        let cancel = self.root.child_token();
        let handle = tokio::spawn(run_probes(
            agent,
            self.interval,
            self.probe_timeout,
            cancel.clone(),
            Arc::clone(&self.shared),
            Arc::clone(&self.watches),
        ));
        entry.insert(Watch { cancel, handle });
        debug!(agent_id = %agent_id, interval_ms = self.interval.as_millis() as u64, "Health monitoring started");
        Ok(())
    }

    /// Stop probing one agent and forget its record.
    pub fn stop(&self, agent_id: &str) -> Result<(), MonitorError> {
        let (_, watch) = self
            .watches
            .remove(agent_id)
            .ok_or_else(|| MonitorError::NotMonitored(agent_id.to_string()))?;
        watch.cancel.cancel();
        self.shared.records.remove(agent_id);
        debug!(agent_id = %agent_id, "Health monitoring stopped");
        Ok(())
    }

    pub fn is_monitoring(&self, agent_id: &str) -> bool {
        self.watches.contains_key(agent_id)
    }

    pub fn monitored_count(&self) -> usize {
        self.watches.len()
    }

    pub fn status(&self, agent_id: &str) -> Option<AgentHealth> {
        self.shared.records.get(agent_id).map(|r| r.clone())
    }

    pub fn statuses(&self) -> Vec<AgentHealth> {
        self.shared.records.iter().map(|r| r.clone()).collect()
    }

    /// Probe `agent` once right now, outside any timer.
    pub async fn check_now(&self, agent: &dyn Agent) -> ProbeOutcome {
        let outcome = probe_once(agent, self.probe_timeout, &self.root).await;
        match &outcome {
            ProbeOutcome::Healthy => self.shared.record(agent.id(), true, None),
            ProbeOutcome::Unhealthy(detail) => {
                self.shared.record(agent.id(), false, Some(detail.clone()))
            }
            ProbeOutcome::Skipped => {}
        }
        outcome
    }

    /// Stop every timer and wait for them to finish. Idempotent.
    pub async fn shutdown(&self) {
        self.root.cancel();
        let ids: Vec<String> = self.watches.iter().map(|w| w.key().clone()).collect();
        for id in ids {
            if let Some((_, watch)) = self.watches.remove(&id) {
                if let Err(e) = watch.handle.await {
                    warn!(agent_id = %id, error = %e, "Probe task ended abnormally");
                }
            }
        }
        info!("Health monitor shut down");
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

async fn run_probes(
    agent: Arc<dyn Agent>,
    interval: Duration,
    probe_timeout: Duration,
    cancel: CancellationToken,
    shared: Arc<Shared>,
    watches: Arc<DashMap<String, Watch>>,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if agent.status().state == AgentLifecycleState::ShutDown {
            shared.records.remove(agent.id());
            watches.remove(agent.id());
            debug!(agent_id = %agent.id(), "Agent shut down, probing stopped");
            break;
        }
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            outcome = probe_once(agent.as_ref(), probe_timeout, &cancel) => outcome,
        };
        match outcome {
            ProbeOutcome::Healthy => shared.record(agent.id(), true, None),
            ProbeOutcome::Unhealthy(detail) => shared.record(agent.id(), false, Some(detail)),
            ProbeOutcome::Skipped => debug!(agent_id = %agent.id(), "Probe skipped"),
        }
    }
    debug!(agent_id = %agent.id(), "Probe task finished");
}

#[cfg(test)]
#[path = "monitor_tests.rs"]
mod tests;
