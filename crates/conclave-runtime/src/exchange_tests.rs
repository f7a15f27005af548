use super::*;
use crate::lifecycle::StateCell;
use crate::store::MemoryMessageStore;
use conclave_protocols::agent::collect_response;
use conclave_protocols::events::BroadcastEventSink;
use conclave_protocols::types::{AgentLifecycleState, BusyActivity, FrameKind};
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};

struct ScriptedSource {
    batches: VecDeque<Result<Option<Vec<ProtocolFrame>>, AgentError>>,
    completed: Arc<AtomicBool>,
    hang_when_empty: bool,
}

impl ScriptedSource {
    fn new(batches: Vec<Result<Option<Vec<ProtocolFrame>>, AgentError>>) -> Self {
        Self {
            batches: batches.into(),
            completed: Arc::new(AtomicBool::new(false)),
            hang_when_empty: false,
        }
    }
}

#[async_trait]
impl FrameSource for ScriptedSource {
    async fn next_frames(&mut self) -> Result<Option<Vec<ProtocolFrame>>, AgentError> {
        match self.batches.pop_front() {
            Some(batch) => batch,
            None if self.hang_when_empty => std::future::pending().await,
            None => Ok(None),
        }
    }

    fn on_complete(&mut self, _response: &AgentResponse) {
        self.completed.store(true, Ordering::SeqCst);
    }
}

fn ready_cell() -> Arc<StateCell> {
    let cell = Arc::new(StateCell::new("a-1", Arc::new(NoopEventSink)));
    cell.begin_initialize().unwrap();
    cell.ready();
    cell
}

fn start(
    cell: &Arc<StateCell>,
    source: ScriptedSource,
    cancel: CancellationToken,
    collaborators: Collaborators,
) -> AgentResponseStream {
    let request = AgentMessage::user("hi").with_session("s-1");
    let ticket = cell
        .begin_exchange(&request.id, BusyActivity::AwaitingProvider)
        .unwrap();
    Exchange::new(
        source,
        ticket,
        &request,
        "a-1",
        cancel,
        CancellationToken::new(),
        collaborators,
    )
    .into_stream()
}

fn text(t: &str) -> ProtocolFrame {
    ProtocolFrame::text(t, t)
}

#[tokio::test]
async fn test_exchange_completes_and_settles_idle() {
    let cell = ready_cell();
    let source = ScriptedSource::new(vec![
        Ok(Some(vec![text("Hel")])),
        Ok(Some(vec![ProtocolFrame::new(
            FrameKind::Text { text: "lo".into(), done: true },
            "",
        )])),
    ]);
    let completed = source.completed.clone();
    let mut stream = start(&cell, source, CancellationToken::new(), Collaborators::default());

    assert_eq!(cell.state(), AgentLifecycleState::Busy);
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.content, "Hel");
    let second = stream.next().await.unwrap().unwrap();
    assert!(second.is_complete);
    assert_eq!(second.content, "Hello");
    assert!(stream.next().await.is_none());

    assert!(completed.load(Ordering::SeqCst));
    let snapshot = cell.snapshot();
    assert_eq!(snapshot.state, AgentLifecycleState::Idle);
    assert_eq!(snapshot.last_output.as_deref(), Some("Hello"));
}

#[tokio::test]
async fn test_transport_closed_is_communication_failure() {
    let cell = ready_cell();
    let source = ScriptedSource::new(vec![Ok(Some(vec![text("partial")]))]);
    let stream = start(&cell, source, CancellationToken::new(), Collaborators::default());

    let err = collect_response(stream).await.unwrap_err();
    assert!(err.is_transport_failure());
    assert_eq!(cell.state(), AgentLifecycleState::Error);
}

#[tokio::test]
async fn test_remote_error_returns_to_idle() {
    let cell = ready_cell();
    let source = ScriptedSource::new(vec![Ok(Some(vec![ProtocolFrame::error("nope", "")]))]);
    let stream = start(&cell, source, CancellationToken::new(), Collaborators::default());

    let err = collect_response(stream).await.unwrap_err();
    assert!(matches!(err, AgentError::Remote(_)));
    assert_eq!(cell.state(), AgentLifecycleState::Idle);
}

#[tokio::test]
async fn test_cancellation_returns_to_idle() {
    let cell = ready_cell();
    let mut source = ScriptedSource::new(vec![Ok(Some(vec![text("a")]))]);
    source.hang_when_empty = true;
    let cancel = CancellationToken::new();
    let mut stream = start(&cell, source, cancel.clone(), Collaborators::default());

    assert_eq!(stream.next().await.unwrap().unwrap().content, "a");
    cancel.cancel();
    assert!(matches!(
        stream.next().await,
        Some(Err(AgentError::Cancelled))
    ));
    assert!(stream.next().await.is_none());
    assert_eq!(cell.state(), AgentLifecycleState::Idle);
}

#[tokio::test]
async fn test_dropped_stream_returns_to_idle() {
    let cell = ready_cell();
    let mut source = ScriptedSource::new(Vec::new());
    source.hang_when_empty = true;
    let stream = start(&cell, source, CancellationToken::new(), Collaborators::default());
    assert_eq!(cell.state(), AgentLifecycleState::Busy);
    drop(stream);
    assert_eq!(cell.state(), AgentLifecycleState::Idle);
}

#[tokio::test]
async fn test_completion_reaches_collaborators() {
    let cell = ready_cell();
    let store = Arc::new(MemoryMessageStore::new());
    let sink = Arc::new(BroadcastEventSink::new(8));
    let mut events = sink.subscribe();
    let collaborators = Collaborators::new(sink).with_store(store.clone());

    let source = ScriptedSource::new(vec![Ok(Some(vec![text("done"), ProtocolFrame::done("")]))]);
    let response = collect_response(start(&cell, source, CancellationToken::new(), collaborators))
        .await
        .unwrap();

    let stored = store.messages("a-1");
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].content, "done");
    assert_eq!(stored[0].session_id.as_deref(), Some("s-1"));

    // Skip status transitions, find the completion.
    loop {
        if let RuntimeEvent::ResponseCompleted { message_id, .. } = events.recv().await.unwrap() {
            assert_eq!(message_id, response.message_id);
            break;
        }
    }
}

#[tokio::test]
async fn test_probe_exchange_is_not_stored() {
    let cell = ready_cell();
    let store = Arc::new(MemoryMessageStore::new());
    let collaborators = Collaborators::default().with_store(store.clone());
    let request = AgentMessage::probe();
    let ticket = cell
        .begin_exchange(&request.id, BusyActivity::AwaitingProvider)
        .unwrap();
    let source = ScriptedSource::new(vec![Ok(Some(vec![ProtocolFrame::done("")]))]);
    let stream = Exchange::new(
        source,
        ticket,
        &request,
        "a-1",
        CancellationToken::new(),
        CancellationToken::new(),
        collaborators,
    )
    .into_stream();

    assert!(collect_response(stream).await.unwrap().is_complete);
    assert_eq!(store.total(), 0);
    assert_eq!(cell.state(), AgentLifecycleState::Idle);
}

#[tokio::test]
async fn test_health_check_exchange_keeps_last_output() {
    let cell = ready_cell();
    let source = ScriptedSource::new(vec![Ok(Some(vec![
        ProtocolFrame::text("REAL RESULT", ""),
        ProtocolFrame::done(""),
    ]))]);
    let stream = start(&cell, source, CancellationToken::new(), Collaborators::default());
    assert_eq!(collect_response(stream).await.unwrap().content, "REAL RESULT");

    let request = AgentMessage::probe();
    let ticket = cell
        .begin_exchange(&request.id, BusyActivity::AwaitingProvider)
        .unwrap();
    let source = ScriptedSource::new(vec![Ok(Some(vec![
        ProtocolFrame::text("pong", ""),
        ProtocolFrame::done(""),
    ]))]);
    let stream = Exchange::new(
        source,
        ticket,
        &request,
        "a-1",
        CancellationToken::new(),
        CancellationToken::new(),
        Collaborators::default(),
    )
    .into_stream();
    assert_eq!(collect_response(stream).await.unwrap().content, "pong");

    let snapshot = cell.snapshot();
    assert_eq!(snapshot.state, AgentLifecycleState::Idle);
    assert_eq!(snapshot.last_output.as_deref(), Some("REAL RESULT"));
    assert_eq!(snapshot.exchanges_completed, 1);
}
