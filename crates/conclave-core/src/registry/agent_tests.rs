use super::*;
use async_trait::async_trait;
use conclave_protocols::agent::AgentResponseStream;
use conclave_protocols::error::{AgentError, CoordinationError};
use conclave_protocols::types::{
    AgentIdentity, AgentLifecycleState, AgentMessage, BackingKind, ToolCall, ToolExecutionResult,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

struct StubAgent {
    identity: AgentIdentity,
    state: Mutex<AgentLifecycleState>,
    shutdowns: AtomicUsize,
}

impl StubAgent {
    fn new(id: &str) -> Arc<Self> {
        Arc::new(Self {
            identity: AgentIdentity::new(id, BackingKind::Subprocess).with_id(id),
            state: Mutex::new(AgentLifecycleState::Idle),
            shutdowns: AtomicUsize::new(0),
        })
    }

    fn set_state(&self, state: AgentLifecycleState) {
        *self.state.lock() = state;
    }
}

#[async_trait]
impl Agent for StubAgent {
    fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    async fn initialize(&self) -> Result<(), AgentError> {
        Ok(())
    }

    async fn send_message_stream(
        &self,
        _message: AgentMessage,
        _cancel: CancellationToken,
    ) -> Result<AgentResponseStream, AgentError> {
        Ok(Box::pin(futures::stream::empty()))
    }

    async fn try_send_message_stream(
        &self,
        message: AgentMessage,
        cancel: CancellationToken,
    ) -> Result<AgentResponseStream, AgentError> {
        self.send_message_stream(message, cancel).await
    }

    async fn execute_tool(
        &self,
        call: ToolCall,
        _cancel: CancellationToken,
    ) -> Result<ToolExecutionResult, AgentError> {
        Ok(ToolExecutionResult::success(&call, "", 0))
    }

    fn status(&self) -> StatusSnapshot {
        let mut snapshot = StatusSnapshot::new(self.identity.id.clone());
        snapshot.state = *self.state.lock();
        snapshot
    }

    async fn shutdown(&self) -> Result<(), AgentError> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.set_state(AgentLifecycleState::ShutDown);
        Ok(())
    }
}

fn fill(registry: &AgentRegistry, n: usize) {
    for i in 0..n {
        registry
            .create(|| Ok::<_, RegistryError>(StubAgent::new(&format!("agent-{i}")) as Arc<dyn Agent>))
            .unwrap();
    }
}

#[test]
fn test_default_ceiling() {
    let registry = AgentRegistry::default();
    assert_eq!(registry.max_agents(), 5);
    assert!(registry.is_empty());
}

#[test]
fn test_ceiling_refuses_before_factory_runs() {
    let registry = AgentRegistry::default();
    fill(&registry, 5);

    let mut factory_called = false;
    let result = registry.create(|| {
        factory_called = true;
        Ok::<_, CoordinationError>(StubAgent::new("sixth") as Arc<dyn Agent>)
    });

    let err = result.err().unwrap();
    assert_eq!(err.to_string(), "Maximum number of concurrent agents (5) reached");
    assert!(!factory_called);
    assert_eq!(registry.len(), 5);
}

#[test]
fn test_terminal_agents_do_not_count() {
    let registry = AgentRegistry::new(2);
    let a = StubAgent::new("a");
    let b = StubAgent::new("b");
    registry.insert(a.clone()).unwrap();
    registry.insert(b).unwrap();
    assert!(registry.insert(StubAgent::new("c")).is_err());

    a.set_state(AgentLifecycleState::Error);
    assert_eq!(registry.live_count(), 1);
    registry.insert(StubAgent::new("c")).unwrap();
    assert_eq!(registry.len(), 3);
}

#[test]
fn test_insert_duplicate() {
    let registry = AgentRegistry::default();
    registry.insert(StubAgent::new("a")).unwrap();
    let err = registry.insert(StubAgent::new("a")).unwrap_err();
    assert!(matches!(err, RegistryError::AlreadyRegistered(_)));
}

#[test]
fn test_get_or_create_fetches_existing() {
    let registry = AgentRegistry::new(1);
    let first = registry
        .get_or_create("a", |id| Ok::<_, RegistryError>(StubAgent::new(id) as Arc<dyn Agent>))
        .unwrap();

    // At the ceiling, fetching an existing id still succeeds.
    let again = registry
        .get_or_create("a", |_| -> Result<Arc<dyn Agent>, RegistryError> {
            panic!("factory must not run for an existing id")
        })
        .unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    let refused = registry
        .get_or_create("b", |id| Ok::<_, RegistryError>(StubAgent::new(id) as Arc<dyn Agent>));
    assert!(matches!(refused, Err(RegistryError::CeilingReached { limit: 1 })));
}

#[tokio::test]
async fn test_dispose_removes_and_shuts_down() {
    let registry = AgentRegistry::default();
    let agent = StubAgent::new("a");
    registry.insert(agent.clone()).unwrap();

    registry.dispose("a").await.unwrap();
    assert!(!registry.contains("a"));
    assert_eq!(agent.shutdowns.load(Ordering::SeqCst), 1);

    assert!(matches!(
        registry.dispose("a").await,
        Err(RegistryError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_prune_terminal() {
    let registry = AgentRegistry::default();
    let a = StubAgent::new("a");
    let b = StubAgent::new("b");
    registry.insert(a.clone()).unwrap();
    registry.insert(b.clone()).unwrap();
    b.set_state(AgentLifecycleState::Error);

    let pruned = registry.prune_terminal().await;
    assert_eq!(pruned, vec!["b".to_string()]);
    assert!(registry.contains("a"));
    assert_eq!(b.shutdowns.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dispose_all() {
    let registry = AgentRegistry::default();
    fill(&registry, 3);
    registry.dispose_all().await;
    assert!(registry.is_empty());
}

#[test]
fn test_list_snapshots() {
    let registry = AgentRegistry::default();
    fill(&registry, 2);
    let snapshots = registry.list();
    assert_eq!(snapshots.len(), 2);
    assert!(snapshots.iter().all(|s| s.state == AgentLifecycleState::Idle));
}

#[test]
fn test_concurrent_creation_respects_ceiling() {
    let registry = Arc::new(AgentRegistry::new(3));
    let handles: Vec<_> = (0..10)
        .map(|i| {
            let registry = registry.clone();
            std::thread::spawn(move || {
                registry
                    .create(|| {
                        Ok::<_, RegistryError>(StubAgent::new(&format!("t-{i}")) as Arc<dyn Agent>)
                    })
                    .is_ok()
            })
        })
        .collect();
    let created = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(created, 3);
    assert_eq!(registry.len(), 3);
}
