//! Agent backed by an OpenAI-compatible chat-completions endpoint.
//!
//! Each exchange posts the conversation history plus the new message with
//! `stream: true` and decodes the event stream as it arrives. The history
//! doubles as the exchange lock.

pub mod api;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use conclave_config::HttpProviderConfig;
use conclave_core::ToolRegistry;
use conclave_protocols::agent::{Agent, AgentResponseStream};
use conclave_protocols::error::AgentError;
use conclave_protocols::tool::{FailureKind, ToolContext, ToolResult};
use conclave_protocols::types::{
    AgentCapabilities, AgentIdentity, AgentLifecycleState, AgentMessage, AgentResponse,
    BackingKind, BusyActivity, ProtocolFrame, StatusSnapshot, ToolCall, ToolExecutionResult,
};

use crate::decoder::{EventStreamDecoder, FrameDecoder};
use crate::exchange::{Collaborators, Exchange, FrameSource};
use crate::lifecycle::StateCell;
use api::{ChatMessage, ChatRequest};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const ERROR_BODY_LIMIT: usize = 500;

type History = Vec<ChatMessage>;
type BodyStream = Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>;

pub struct HttpProviderAgent {
    identity: AgentIdentity,
    config: HttpProviderConfig,
    client: reqwest::Client,
    state: Arc<StateCell>,
    history: Arc<Mutex<History>>,
    system_prompt: Option<String>,
    tools: Option<Arc<ToolRegistry>>,
    allowed_tools: Option<Vec<String>>,
    shutdown: CancellationToken,
    collaborators: Collaborators,
}

impl HttpProviderAgent {
    pub fn new(name: impl Into<String>, config: HttpProviderConfig) -> Self {
        let identity = AgentIdentity::new(name, BackingKind::HttpProvider);
        Self::with_identity(identity, config, Collaborators::default())
    }

    pub fn with_identity(
        mut identity: AgentIdentity,
        config: HttpProviderConfig,
        collaborators: Collaborators,
    ) -> Self {
        if identity.model.is_none() {
            identity.model = config.model.clone();
        }
        identity.capabilities = AgentCapabilities {
            max_tokens: config.max_tokens,
            ..identity.capabilities
        };
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_default();
        let state = Arc::new(StateCell::new(&identity.id, collaborators.events.clone()));

        Self {
            identity,
            config,
            client,
            state,
            history: Arc::new(Mutex::new(Vec::new())),
            system_prompt: None,
            tools: None,
            allowed_tools: None,
            shutdown: CancellationToken::new(),
            collaborators,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Tools advertised to the provider and run in-process by `execute_tool`.
    pub fn with_tools(mut self, registry: Arc<ToolRegistry>) -> Self {
        self.identity.capabilities.tools = true;
        self.tools = Some(registry);
        self
    }

    /// Restrict the advertised tools to `names`.
    pub fn with_allowed_tools(mut self, names: Vec<String>) -> Self {
        self.allowed_tools = Some(names);
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    fn model(&self) -> &str {
        self.config.model.as_deref().unwrap_or_default()
    }

    fn advertised_tools(&self) -> Vec<serde_json::Value> {
        let Some(registry) = &self.tools else {
            return Vec::new();
        };
        registry
            .openai_functions()
            .into_iter()
            .filter(|function| {
                function["function"]["name"]
                    .as_str()
                    .is_some_and(|name| self.is_allowed(name))
            })
            .collect()
    }

    fn is_allowed(&self, name: &str) -> bool {
        match &self.allowed_tools {
            Some(names) => names.iter().any(|n| n == name),
            None => true,
        }
    }

    fn check_config(&self) -> Result<(), AgentError> {
        let base_url = self.config.base_url.trim();
        if base_url.is_empty() {
            return Err(AgentError::Startup("provider base_url is not set".to_string()));
        }
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(AgentError::Startup(format!(
                "provider base_url must be http(s): {base_url}"
            )));
        }
        if self.config.api_key.as_deref().is_none_or(|k| k.trim().is_empty()) {
            return Err(AgentError::Startup("provider api_key is not set".to_string()));
        }
        if self.config.model.as_deref().is_none_or(|m| m.trim().is_empty()) {
            return Err(AgentError::Startup("provider model is not set".to_string()));
        }
        Ok(())
    }

    async fn open_stream(
        &self,
        history: &History,
        pending: &ChatMessage,
    ) -> Result<reqwest::Response, AgentError> {
        let system = self.system_prompt.as_ref().map(ChatMessage::system);
        let request = ChatRequest {
            model: self.model(),
            messages: system.iter().chain(history.iter()).chain([pending]).collect(),
            stream: true,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            tools: self.advertised_tools(),
        };

        let send = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.config.api_key.as_deref().unwrap_or_default())
            .json(&request)
            .send();
        let timeout = Duration::from_secs(self.config.request_timeout_seconds);
        let response = tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| {
                AgentError::Communication(format!(
                    "provider did not respond within {}s",
                    timeout.as_secs()
                ))
            })?
            .map_err(|e| AgentError::Communication(format!("provider request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > ERROR_BODY_LIMIT {
                let mut cut = ERROR_BODY_LIMIT;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(AgentError::Communication(format!(
                "provider returned {status}: {body}"
            )));
        }
        Ok(response)
    }

    async fn start_exchange(
        &self,
        guard: OwnedMutexGuard<History>,
        message: AgentMessage,
        cancel: CancellationToken,
    ) -> Result<AgentResponseStream, AgentError> {
        let ticket = self
            .state
            .begin_exchange(&message.id, BusyActivity::AwaitingProvider)?;
        let pending = ChatMessage::from(&message);

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            _ = self.shutdown.cancelled() => Err(AgentError::ShutDown(self.id().to_string())),
            opened = self.open_stream(&guard, &pending) => opened,
        };

        match opened {
            Ok(response) => {
                debug!(agent_id = %self.id(), message_id = %message.id, "Provider stream opened");
                let source = ProviderSource {
                    history: guard,
                    pending: (!message.is_probe()).then_some(pending),
                    body: Box::pin(response.bytes_stream()),
                    decoder: EventStreamDecoder::new(),
                    finished: false,
                };
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
            Err(e @ (AgentError::Cancelled | AgentError::ShutDown(_))) => {
                drop(guard);
                ticket.release();
                Err(e)
            }
            Err(e) => {
                drop(guard);
                ticket.fail(e.to_string());
                Err(e)
            }
        }
    }
}

struct ProviderSource {
    history: OwnedMutexGuard<History>,
    /// Turn to record on completion. `None` for probes.
    pending: Option<ChatMessage>,
    body: BodyStream,
    decoder: EventStreamDecoder,
    finished: bool,
}

#[async_trait]
impl FrameSource for ProviderSource {
    async fn next_frames(&mut self) -> Result<Option<Vec<ProtocolFrame>>, AgentError> {
        if self.finished {
            return Ok(None);
        }
        match self.body.next().await {
            Some(Ok(chunk)) => Ok(Some(self.decoder.feed(&chunk))),
            Some(Err(e)) => Err(AgentError::Communication(format!(
                "provider stream failed: {e}"
            ))),
            None => {
                self.finished = true;
                Ok(Some(self.decoder.finish()))
            }
        }
    }

    fn on_complete(&mut self, response: &AgentResponse) {
        if let Some(pending) = self.pending.take() {
            self.history.push(pending);
            self.history
                .push(ChatMessage::assistant(response.content.clone(), &response.tool_calls));
        }
    }
}

#[async_trait]
impl Agent for HttpProviderAgent {
    fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    async fn initialize(&self) -> Result<(), AgentError> {
        self.state.begin_initialize()?;
        match self.check_config() {
            Ok(()) => {
                self.state.ready();
                info!(
                    agent_id = %self.id(),
                    name = %self.identity.name,
                    model = %self.model(),
                    "Provider agent ready"
                );
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
            guard = Arc::clone(&self.history).lock_owned() => guard,
        };
        self.start_exchange(guard, message, cancel).await
    }

    async fn try_send_message_stream(
        &self,
        message: AgentMessage,
        cancel: CancellationToken,
    ) -> Result<AgentResponseStream, AgentError> {
        let guard = Arc::clone(&self.history)
            .try_lock_owned()
            .map_err(|_| AgentError::Busy(self.id().to_string()))?;
        self.start_exchange(guard, message, cancel).await
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
            guard = Arc::clone(&self.history).lock_owned() => guard,
        };
        let ticket = self
            .state
            .begin_exchange(&call.id, BusyActivity::ExecutingTool)?;

        let result = match &self.tools {
            Some(_) if !self.is_allowed(&call.name) => ToolResult::failure(
                FailureKind::NotFound,
                format!("Tool {} is not available to agent {}", call.name, self.id()),
            ),
            Some(registry) => {
                let ctx = ToolContext::new(&call.id)
                    .with_caller(self.id())
                    .with_cancel(cancel.child_token());
                registry
                    .execute(&call.name, call.parameters.clone(), ctx)
                    .await
            }
            None => ToolResult::failure(
                FailureKind::NotFound,
                format!("Agent {} has no tools", self.id()),
            ),
        };
        drop(guard);
        ticket.release();

        let duration_ms = started.elapsed().as_millis() as u64;
        Ok(if result.success {
            ToolExecutionResult::success(&call, result.content, duration_ms)
        } else {
            ToolExecutionResult::failure(
                &call,
                result.error.unwrap_or(result.content),
                duration_ms,
            )
        })
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
        self.state.shut_down();
        info!(agent_id = %self.id(), "Provider agent shut down");
        Ok(())
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
