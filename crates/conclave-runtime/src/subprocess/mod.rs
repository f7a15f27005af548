//! Agent backed by a long-lived child process.
//!
//! The process reads one JSON message per line on stdin and answers with
//! NDJSON frames on stdout. The process handle is owned by the exchange lock,
//! so at most one exchange talks to it at a time.

mod process;
pub mod wire;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Child;
use tokio::sync::{Mutex, OwnedMutexGuard, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use conclave_config::SubprocessProviderConfig;
use conclave_protocols::agent::{collect_response, Agent, AgentResponseStream};
use conclave_protocols::error::AgentError;
use conclave_protocols::types::{
    AgentIdentity, AgentLifecycleState, AgentMessage, AgentResponse, BackingKind, BusyActivity, ProtocolFrame,
    StatusSnapshot, ToolCall, ToolExecutionResult,
};

use crate::exchange::{Collaborators, Exchange, FrameSource};
use crate::lifecycle::StateCell;
use process::ProcessIo;

/// Default bound on graceful shutdown and stale-output draining.
pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

type IoGuard = OwnedMutexGuard<Option<ProcessIo>>;

pub struct SubprocessAgent {
    identity: AgentIdentity,
    config: SubprocessProviderConfig,
    grace: Duration,
    state: Arc<StateCell>,
    io: Arc<Mutex<Option<ProcessIo>>>,
    child: Mutex<Option<Child>>,
    shutdown: CancellationToken,
    collaborators: Collaborators,
}

impl SubprocessAgent {
    pub fn new(name: impl Into<String>, config: SubprocessProviderConfig) -> Self {
        let mut identity = AgentIdentity::new(name, BackingKind::Subprocess);
        identity.capabilities.tools = true;
        if let Some(model) = &config.model {
            identity.model = Some(model.clone());
        }
        Self::with_identity(identity, config, Collaborators::default())
    }

    pub fn with_identity(
        identity: AgentIdentity,
        config: SubprocessProviderConfig,
        collaborators: Collaborators,
    ) -> Self {
        let state = Arc::new(StateCell::new(&identity.id, collaborators.events.clone()));
        Self {
            identity,
            config,
            grace: DEFAULT_GRACE,
            state,
            io: Arc::new(Mutex::new(None)),
            child: Mutex::new(None),
            shutdown: CancellationToken::new(),
            collaborators,
        }
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Crash check before reuse. A dead process surfaces here, on access.
    async fn exited(&self) -> Option<String> {
        let mut child = self.child.lock().await;
        match child.as_mut().map(Child::try_wait) {
            Some(Ok(Some(status))) => Some(format!("agent process exited ({status})")),
            Some(Ok(None)) => None,
            Some(Err(e)) => Some(format!("agent process unreachable: {e}")),
            None => Some("agent process is not running".to_string()),
        }
    }

    async fn start_exchange(
        &self,
        mut guard: IoGuard,
        message: AgentMessage,
        cancel: CancellationToken,
        activity: BusyActivity,
    ) -> Result<AgentResponseStream, AgentError> {
        let ticket = self.state.begin_exchange(&message.id, activity)?;

        let prepared = async {
            if let Some(reason) = self.exited().await {
                return Err(AgentError::Communication(reason));
            }
            let io = guard.as_mut().ok_or_else(|| {
                AgentError::Communication("agent process is not running".to_string())
            })?;
            if io.pending_terminal {
                let skipped = tokio::time::timeout(self.grace, io.drain_to_terminal())
                    .await
                    .map_err(|_| {
                        AgentError::Communication(
                            "stale output did not finish within the grace period".to_string(),
                        )
                    })??;
                debug!(agent_id = %self.id(), skipped, "Drained stale output");
            }
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            let line = wire::encode_message(&message)
                .map_err(|e| AgentError::Communication(format!("encode message: {e}")))?;
            io.write_line(&line).await?;
            io.pending_terminal = true;
            Ok(())
        }
        .await;

        match prepared {
            Ok(()) => {
                debug!(agent_id = %self.id(), message_id = %message.id, "Exchange started");
                let source = ProcessSource { io: guard };
                Ok(Exchange::new(
                    source,
                    ticket,
                    &message,
                    self.id(),
                    cancel,
                    self.shutdown.clone(),
                    self.collaborators.clone(),
                )
                .into_stream())
            }
            Err(AgentError::Cancelled) => {
                drop(guard);
                ticket.release();
                Err(AgentError::Cancelled)
            }
            Err(e) => {
                drop(guard);
                ticket.fail(e.to_string());
                Err(e)
            }
        }
    }

    fn busy(&self) -> AgentError {
        AgentError::Busy(self.id().to_string())
    }
}

struct ProcessSource {
    io: IoGuard,
}

#[async_trait]
impl FrameSource for ProcessSource {
    async fn next_frames(&mut self) -> Result<Option<Vec<ProtocolFrame>>, AgentError> {
        match self.io.as_mut() {
            Some(io) => io.read_frames().await,
            None => Ok(None),
        }
    }

    fn on_complete(&mut self, _response: &AgentResponse) {
        self.settled();
    }

    fn on_remote_error(&mut self) {
        self.settled();
    }
}

impl ProcessSource {
    fn settled(&mut self) {
        if let Some(io) = self.io.as_mut() {
            io.pending_terminal = false;
        }
    }
}

#[async_trait]
impl Agent for SubprocessAgent {
    fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    async fn initialize(&self) -> Result<(), AgentError> {
        self.state.begin_initialize()?;

        match process::spawn(self.id(), &self.config) {
            Ok((child, io)) => {
                *self.child.lock().await = Some(child);
                *self.io.lock().await = Some(io);
                self.state.ready();
                info!(agent_id = %self.id(), name = %self.identity.name, "Subprocess agent ready");
                Ok(())
            }
            Err(e) => {
                self.state.fail(e.to_string());
                Err(e)
            }
        }
    }

    async fn send_message_stream(
        &self,
        message: AgentMessage,
        cancel: CancellationToken,
    ) -> Result<AgentResponseStream, AgentError> {
        let guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            _ = self.shutdown.cancelled() => return Err(AgentError::ShutDown(self.id().to_string())),
            guard = Arc::clone(&self.io).lock_owned() => guard,
        };
        self.start_exchange(guard, message, cancel, BusyActivity::AwaitingProvider)
            .await
    }

    async fn try_send_message_stream(
        &self,
        message: AgentMessage,
        cancel: CancellationToken,
    ) -> Result<AgentResponseStream, AgentError> {
        let guard = Arc::clone(&self.io)
            .try_lock_owned()
            .map_err(|_| self.busy())?;
        self.start_exchange(guard, message, cancel, BusyActivity::AwaitingProvider)
            .await
    }

    async fn execute_tool(
        &self,
        call: ToolCall,
        cancel: CancellationToken,
    ) -> Result<ToolExecutionResult, AgentError> {
        let started = Instant::now();
        let guard = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            guard = Arc::clone(&self.io).lock_owned() => guard,
        };
        let stream = self
            .start_exchange(guard, wire::tool_message(&call), cancel, BusyActivity::ExecutingTool)
            .await?;
        let elapsed = || started.elapsed().as_millis() as u64;

        match collect_response(stream).await {
            Ok(response) => Ok(ToolExecutionResult::success(&call, response.content, elapsed())),
            Err(AgentError::Remote(message)) => {
                Ok(ToolExecutionResult::failure(&call, message, elapsed()))
            }
            Err(e) => Err(e),
        }
    }

    fn status(&self) -> StatusSnapshot {
        self.state.snapshot()
    }

    fn subscribe_status(&self) -> Option<watch::Receiver<StatusSnapshot>> {
        Some(self.state.subscribe())
    }

    async fn shutdown(&self) -> Result<(), AgentError> {
        if self.state.state() == AgentLifecycleState::ShutDown {
            return Ok(());
        }
        self.shutdown.cancel();
        let deadline = tokio::time::Instant::now() + self.grace;

        // Closing stdin asks a well-behaved process to exit.
        match tokio::time::timeout_at(deadline, self.io.lock()).await {
            Ok(mut io) => {
                io.take();
            }
            Err(_) => warn!(agent_id = %self.id(), "Exchange lock not released within grace period"),
        }

        if let Some(mut child) = self.child.lock().await.take() {
            match tokio::time::timeout_at(deadline, child.wait()).await {
                Ok(Ok(status)) => debug!(agent_id = %self.id(), %status, "Agent process exited"),
                Ok(Err(e)) => warn!(agent_id = %self.id(), error = %e, "Failed to wait for agent process"),
                Err(_) => {
                    warn!(agent_id = %self.id(), "Agent process did not exit within grace period, killing");
                    if let Err(e) = child.kill().await {
                        warn!(agent_id = %self.id(), error = %e, "Failed to kill agent process");
                    }
                }
            }
        }

        self.state.shut_down();
        info!(agent_id = %self.id(), "Subprocess agent shut down");
        Ok(())
    }
}

#[cfg(all(test, unix))]
#[path = "subprocess_tests.rs"]
mod tests;
