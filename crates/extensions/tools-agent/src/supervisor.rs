//! Background exchange supervision.
//!
//! A `create_agent` initial task or a fire-and-forget hand-off is driven to
//! completion here instead of being discarded, so its outcome is observable
//! and its failure is reported.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use conclave_protocols::agent::{collect_response, AgentResponseStream};
use conclave_protocols::error::AgentError;
use conclave_protocols::events::{EventSink, NoopEventSink, RuntimeEvent};

const DEFAULT_RETENTION: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_finished(&self) -> bool {
        !matches!(self, TaskState::Running)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// The task given to `create_agent`.
    InitialTask,
    /// A hand-off that was not awaited.
    HandOff,
}

/// Record of one supervised exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisedTask {
    pub id: String,
    pub agent_id: String,
    pub kind: TaskKind,
    pub state: TaskState,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Aggregated response content on success.
    pub output: Option<String>,
    pub error: Option<String>,
}

/// Drives response streams nobody is waiting on.
pub struct TaskSupervisor {
    tasks: Arc<DashMap<String, SupervisedTask>>,
    handles: DashMap<String, JoinHandle<()>>,
    events: Arc<dyn EventSink>,
    root: CancellationToken,
    retention: usize,
}

impl TaskSupervisor {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(DashMap::new()),
            handles: DashMap::new(),
            events: Arc::new(NoopEventSink),
            root: CancellationToken::new(),
            retention: DEFAULT_RETENTION,
        }
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Keep at most `retention` finished records.
    pub fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention;
        self
    }

    /// Token for exchanges that will be supervised. Cancelled on shutdown.
    pub fn cancel_token(&self) -> CancellationToken {
        self.root.child_token()
    }

    /// Start driving `stream` in the background and return the task ID.
    pub fn supervise(&self, agent_id: &str, kind: TaskKind, stream: AgentResponseStream) -> String {
        self.prune();
        let task_id = uuid::Uuid::new_v4().to_string();
        self.tasks.insert(
            task_id.clone(),
            SupervisedTask {
                id: task_id.clone(),
                agent_id: agent_id.to_string(),
                kind,
                state: TaskState::Running,
                started_at: Utc::now(),
                finished_at: None,
                output: None,
                error: None,
            },
        );

        let tasks = Arc::clone(&self.tasks);
        let events = Arc::clone(&self.events);
        let cancel = self.root.child_token();
        let id = task_id.clone();
        let agent = agent_id.to_string();

        let handle = tokio::spawn(async move {
            let result = tokio::select! {
                result = collect_response(stream) => result,
                _ = cancel.cancelled() => Err(AgentError::Cancelled),
            };

            let (state, output, error) = match result {
                Ok(response) => (TaskState::Succeeded, Some(response.content), None),
                Err(AgentError::Cancelled) => {
                    (TaskState::Cancelled, None, Some(AgentError::Cancelled.to_string()))
                }
                Err(e) => (TaskState::Failed, None, Some(e.to_string())),
            };

            match &error {
                None => info!(task_id = %id, agent_id = %agent, "Supervised task completed"),
                Some(err) => warn!(
                    task_id = %id,
                    agent_id = %agent,
                    state = ?state,
                    error = %err,
                    "Supervised task did not complete"
                ),
            }

            if let Some(mut record) = tasks.get_mut(&id) {
                record.state = state;
                record.finished_at = Some(Utc::now());
                record.output = output;
                record.error = error.clone();
            }

            events.emit(RuntimeEvent::TaskFinished {
                task_id: id,
                agent_id: agent,
                success: state == TaskState::Succeeded,
                error,
            });
        });

        self.handles.insert(task_id.clone(), handle);
        debug!(task_id = %task_id, agent_id = %agent_id, kind = ?kind, "Supervising task");
        task_id
    }

    pub fn get(&self, task_id: &str) -> Option<SupervisedTask> {
        self.tasks.get(task_id).map(|t| t.clone())
    }

    pub fn list(&self) -> Vec<SupervisedTask> {
        let mut tasks: Vec<_> = self.tasks.iter().map(|t| t.clone()).collect();
        tasks.sort_by_key(|t| t.started_at);
        tasks
    }

    pub fn list_for_agent(&self, agent_id: &str) -> Vec<SupervisedTask> {
        self.list()
            .into_iter()
            .filter(|t| t.agent_id == agent_id)
            .collect()
    }

    pub fn running_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.state == TaskState::Running)
            .count()
    }

    /// Wait for a task to finish and return its record.
    pub async fn join(&self, task_id: &str) -> Option<SupervisedTask> {
        if let Some((_, handle)) = self.handles.remove(task_id) {
            if let Err(e) = handle.await {
                warn!(task_id = %task_id, error = %e, "Supervised task panicked");
            }
        }
        self.get(task_id)
    }

    /// Forget finished tasks. Returns how many were removed.
    pub fn cleanup_finished(&self) -> usize {
        let finished: Vec<String> = self
            .tasks
            .iter()
            .filter(|t| t.state.is_finished())
            .map(|t| t.id.clone())
            .collect();
        for id in &finished {
            self.tasks.remove(id);
            self.handles.remove(id);
        }
        finished.len()
    }

    /// Drop the oldest finished records beyond the retention limit.
    fn prune(&self) -> usize {
        let mut finished: Vec<(DateTime<Utc>, String)> = self
            .tasks
            .iter()
            .filter(|t| t.state.is_finished())
            .map(|t| (t.finished_at.unwrap_or(t.started_at), t.id.clone()))
            .collect();
        if finished.len() <= self.retention {
            return 0;
        }
        finished.sort();
        let excess = finished.len() - self.retention;
        for (_, id) in &finished[..excess] {
            self.tasks.remove(id);
            self.handles.remove(id);
        }
        debug!(removed = excess, "Pruned finished tasks");
        excess
    }

    /// Cancel every running task and wait for them to settle.
    pub async fn shutdown(&self) {
        self.root.cancel();
        let ids: Vec<String> = self.handles.iter().map(|h| h.key().clone()).collect();
        for id in ids {
            self.join(&id).await;
        }
    }
}

impl Default for TaskSupervisor {
    fn default() -> Self {
        Self::new()
    }
}
