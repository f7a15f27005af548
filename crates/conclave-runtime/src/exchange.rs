//! The single-flight exchange pump shared by every agent backing.
//!
//! An [`Exchange`] owns the agent's exchange lock (inside its frame source)
//! and a [`ExchangeTicket`] for the `Busy` state. It reads frames until the
//! terminal one, then releases the lock before settling the state, so an
//! observer that sees `Idle` can start the next exchange immediately.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use conclave_protocols::agent::AgentResponseStream;
use conclave_protocols::error::AgentError;
use conclave_protocols::events::{EventSink, NoopEventSink, RuntimeEvent};
use conclave_protocols::store::MessageStore;
use conclave_protocols::types::{AgentMessage, AgentResponse, ProtocolFrame};

use crate::assembler::ResponseAssembler;
use crate::lifecycle::ExchangeTicket;

/// External collaborators an agent reports to.
#[derive(Clone)]
pub struct Collaborators {
    pub events: Arc<dyn EventSink>,
    pub store: Option<Arc<dyn MessageStore>>,
}

impl Collaborators {
    pub fn new(events: Arc<dyn EventSink>) -> Self {
        Self { events, store: None }
    }

    pub fn with_store(mut self, store: Arc<dyn MessageStore>) -> Self {
        self.store = Some(store);
        self
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::new(Arc::new(NoopEventSink))
    }
}

/// Transport side of an exchange. Holds the agent's exchange lock.
#[async_trait]
pub(crate) trait FrameSource: Send + 'static {
    /// Next batch of decoded frames. `Ok(None)` means the transport has no
    /// more output.
    async fn next_frames(&mut self) -> Result<Option<Vec<ProtocolFrame>>, AgentError>;

    /// The terminal frame was consumed and produced `response`.
    fn on_complete(&mut self, _response: &AgentResponse) {}

    /// The terminal frame was an error frame.
    fn on_remote_error(&mut self) {}
}

enum Step {
    Cancelled,
    ShutDown,
    Frames(Result<Option<Vec<ProtocolFrame>>, AgentError>),
}

pub(crate) struct Exchange<S: FrameSource> {
    // Dropped before `ticket`: the lock is free by the time the state settles.
    source: Option<S>,
    ticket: Option<ExchangeTicket>,
    assembler: ResponseAssembler,
    queue: VecDeque<Result<AgentResponse, AgentError>>,
    cancel: CancellationToken,
    shutdown: CancellationToken,
    agent_id: String,
    session_id: Option<String>,
    // Probe exchanges are not stored or announced.
    report: bool,
    collaborators: Collaborators,
}

impl<S: FrameSource> Exchange<S> {
    pub(crate) fn new(
        source: S,
        ticket: ExchangeTicket,
        request: &AgentMessage,
        agent_id: impl Into<String>,
        cancel: CancellationToken,
        shutdown: CancellationToken,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            source: Some(source),
            ticket: Some(ticket),
            assembler: ResponseAssembler::new(&request.id),
            queue: VecDeque::new(),
            cancel,
            shutdown,
            agent_id: agent_id.into(),
            session_id: request.session_id.clone(),
            report: !request.is_probe(),
            collaborators,
        }
    }

    pub(crate) fn into_stream(self) -> AgentResponseStream {
        Box::pin(futures::stream::unfold(self, |mut exchange| async move {
            exchange.next().await.map(|item| (item, exchange))
        }))
    }

    async fn next(&mut self) -> Option<Result<AgentResponse, AgentError>> {
        loop {
            if let Some(item) = self.queue.pop_front() {
                return Some(item);
            }
            let source = self.source.as_mut()?;

            let step = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Step::Cancelled,
                _ = self.shutdown.cancelled() => Step::ShutDown,
                frames = source.next_frames() => Step::Frames(frames),
            };

            match step {
                Step::Cancelled => {
                    debug!(agent_id = %self.agent_id, "Exchange cancelled");
                    self.abandon();
                    return Some(Err(AgentError::Cancelled));
                }
                Step::ShutDown => {
                    self.abandon();
                    return Some(Err(AgentError::ShutDown(self.agent_id.clone())));
                }
                Step::Frames(Ok(Some(frames))) => {
                    for frame in frames {
                        self.absorb(frame).await;
                        if self.source.is_none() {
                            break;
                        }
                    }
                }
                Step::Frames(Ok(None)) => {
                    self.fail_transport("transport closed before the response completed");
                }
                Step::Frames(Err(e)) => {
                    self.fail_transport(e.to_string());
                }
            }
        }
    }

    async fn absorb(&mut self, frame: ProtocolFrame) {
        match self.assembler.push(frame) {
            Ok(Some(response)) if response.is_complete => self.complete(response).await,
            Ok(Some(response)) => self.queue.push_back(Ok(response)),
            Ok(None) => {}
            Err(e) => {
                if let Some(mut source) = self.source.take() {
                    source.on_remote_error();
                }
                if let Some(ticket) = self.ticket.take() {
                    ticket.release();
                }
                debug!(agent_id = %self.agent_id, error = %e, "Exchange ended with an error frame");
                self.queue.push_back(Err(e));
            }
        }
    }

    async fn complete(&mut self, response: AgentResponse) {
        if let Some(mut source) = self.source.take() {
            source.on_complete(&response);
        }
        if let Some(ticket) = self.ticket.take() {
            // Health-check replies never become the reported output.
            if self.report {
                ticket.complete(&response.content);
            } else {
                ticket.release();
            }
        }
        debug!(
            agent_id = %self.agent_id,
            message_id = %response.message_id,
            chars = response.content.len(),
            "Exchange completed"
        );

        if !self.report {
            self.queue.push_back(Ok(response));
            return;
        }
        if let Some(store) = &self.collaborators.store {
            let mut message = AgentMessage::assistant(response.content.clone());
            message.session_id = self.session_id.clone();
            message
                .metadata
                .insert("in_reply_to".to_string(), serde_json::json!(response.message_id));
            if let Err(e) = store.store(&self.agent_id, &message).await {
                warn!(agent_id = %self.agent_id, error = %e, "Failed to store finalized message");
            }
        }
        self.collaborators.events.emit(RuntimeEvent::ResponseCompleted {
            agent_id: self.agent_id.clone(),
            message_id: response.message_id.clone(),
            content: response.content.clone(),
            usage: response.usage,
        });

        self.queue.push_back(Ok(response));
    }

    fn fail_transport(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        self.source = None;
        if let Some(ticket) = self.ticket.take() {
            ticket.fail(reason.clone());
        }
        self.queue.push_back(Err(AgentError::Communication(reason)));
    }

    /// Stop reading without settling the transport; the ticket drop returns
    /// the agent to `Idle`.
    fn abandon(&mut self) {
        self.source = None;
        self.ticket = None;
    }
}

#[cfg(test)]
#[path = "exchange_tests.rs"]
mod tests;
