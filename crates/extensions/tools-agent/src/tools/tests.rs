use super::*;

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::{watch, Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

use conclave_config::{ProviderConfig, SubprocessProviderConfig};
use conclave_core::{AgentRegistry, ToolRegistry};
use conclave_protocols::agent::{Agent, AgentResponseStream};
use conclave_protocols::error::AgentError;
use conclave_protocols::tool::{FailureKind, ToolContext};
use conclave_protocols::types::{
    AgentIdentity, AgentLifecycleState, AgentMessage, AgentResponse, BackingKind, BusyActivity,
    StatusSnapshot, ToolCall, ToolExecutionResult,
};
use conclave_runtime::StateCell;

use crate::coordination::{Coordination, CoordinationDefaults};
use crate::factory::AgentFactory;
use crate::supervisor::{TaskState, TaskSupervisor};
use crate::toolkit::register_agent_tools;

/// In-memory agent answering every message with `reply` after `delay`.
struct FakeAgent {
    identity: AgentIdentity,
    state: Arc<StateCell>,
    lock: Arc<Mutex<()>>,
    reply: String,
    delay: Duration,
    sends: AtomicUsize,
    received: StdMutex<Vec<AgentMessage>>,
}

impl FakeAgent {
    fn new(name: &str) -> Self {
        let identity = AgentIdentity::new(name, BackingKind::Subprocess);
        let state = Arc::new(StateCell::new(&identity.id, Arc::new(conclave_protocols::NoopEventSink)));
        Self {
            identity,
            state,
            lock: Arc::new(Mutex::new(())),
            reply: "done".to_string(),
            delay: Duration::from_millis(10),
            sends: AtomicUsize::new(0),
            received: StdMutex::new(Vec::new()),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn with_reply(mut self, reply: &str) -> Self {
        self.reply = reply.to_string();
        self
    }

    async fn ready(self) -> Arc<Self> {
        self.initialize().await.unwrap();
        Arc::new(self)
    }

    fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    fn exchange(
        &self,
        guard: OwnedMutexGuard<()>,
        message: AgentMessage,
        cancel: CancellationToken,
    ) -> Result<AgentResponseStream, AgentError> {
        let ticket = self
            .state
            .begin_exchange(&message.id, BusyActivity::AwaitingProvider)?;
        self.sends.fetch_add(1, Ordering::SeqCst);
        self.received.lock().unwrap().push(message);

        let reply = self.reply.clone();
        let delay = self.delay;
        let stream = futures::stream::once(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    drop(guard);
                    drop(ticket);
                    Err(AgentError::Cancelled)
                }
                _ = tokio::time::sleep(delay) => {
                    drop(guard);
                    ticket.complete(&reply);
                    Ok(AgentResponse::complete("m-1", reply, None, vec![]))
                }
            }
        });
        Ok(Box::pin(stream))
    }
}

#[async_trait]
impl Agent for FakeAgent {
    fn identity(&self) -> &AgentIdentity {
        &self.identity
    }

    async fn initialize(&self) -> Result<(), AgentError> {
        self.state.begin_initialize()?;
        self.state.ready();
        Ok(())
    }

    async fn send_message_stream(
        &self,
        message: AgentMessage,
        cancel: CancellationToken,
    ) -> Result<AgentResponseStream, AgentError> {
        let guard = Arc::clone(&self.lock).lock_owned().await;
        self.exchange(guard, message, cancel)
    }

    async fn try_send_message_stream(
        &self,
        message: AgentMessage,
        cancel: CancellationToken,
    ) -> Result<AgentResponseStream, AgentError> {
        let guard = Arc::clone(&self.lock)
            .try_lock_owned()
            .map_err(|_| AgentError::Busy(self.identity.id.clone()))?;
        self.exchange(guard, message, cancel)
    }

    async fn execute_tool(
        &self,
        call: ToolCall,
        _cancel: CancellationToken,
    ) -> Result<ToolExecutionResult, AgentError> {
        Ok(ToolExecutionResult::success(&call, "ok", 0))
    }

    fn status(&self) -> StatusSnapshot {
        self.state.snapshot()
    }

    fn subscribe_status(&self) -> Option<watch::Receiver<StatusSnapshot>> {
        Some(self.state.subscribe())
    }

    async fn shutdown(&self) -> Result<(), AgentError> {
        self.state.shut_down();
        Ok(())
    }
}

struct Harness {
    registry: Arc<AgentRegistry>,
    supervisor: Arc<TaskSupervisor>,
    tools: ToolRegistry,
}

impl Harness {
    fn new(max_agents: usize) -> Self {
        Self::with_providers(max_agents, HashMap::new())
    }

    fn with_providers(max_agents: usize, providers: HashMap<String, ProviderConfig>) -> Self {
        let registry = Arc::new(AgentRegistry::new(max_agents));
        let supervisor = Arc::new(TaskSupervisor::new());
        let factory = Arc::new(
            AgentFactory::new(providers, None).with_grace(Duration::from_millis(500)),
        );
        let coordination = Coordination::new(
            Arc::clone(&registry),
            factory,
            Arc::clone(&supervisor),
        )
        .with_defaults(CoordinationDefaults {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_secs(1),
        });

        let tools = ToolRegistry::new();
        register_agent_tools(&tools, Arc::new(coordination)).unwrap();
        Self {
            registry,
            supervisor,
            tools,
        }
    }

    fn add(&self, agent: Arc<FakeAgent>) -> Arc<FakeAgent> {
        self.registry.insert(agent.clone()).unwrap();
        agent
    }

    async fn call(&self, tool: &str, params: serde_json::Value) -> ToolResult {
        self.tools
            .execute(tool, params, ToolContext::new("call-1").with_session("s-1"))
            .await
    }
}

fn subprocess_provider(executable: &str, args: &[&str]) -> HashMap<String, ProviderConfig> {
    let mut providers = HashMap::new();
    providers.insert(
        "local".to_string(),
        ProviderConfig::Subprocess(SubprocessProviderConfig {
            executable: executable.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            ..Default::default()
        }),
    );
    providers
}

#[test]
fn test_definitions_have_typed_schemas() {
    let harness = Harness::new(5);
    let definitions = harness.tools.list();
    assert_eq!(definitions.len(), 3);

    let wait = harness.tools.get(WaitForAgentTool::ID).unwrap();
    let schema = wait.definition().parameters_schema.clone().unwrap();
    assert_eq!(schema["required"], json!(["agent_id"]));
    assert_eq!(schema["additionalProperties"], false);
}

#[test]
fn test_check_target_classifies_states() {
    let agent = FakeAgent::new("t");
    assert!(matches!(
        check_target(&agent),
        Err(CoordinationError::Unavailable {
            state: AgentLifecycleState::Uninitialized,
            ..
        })
    ));

    agent.state.begin_initialize().unwrap();
    assert!(matches!(check_target(&agent), Err(CoordinationError::Busy(_))));

    agent.state.ready();
    assert!(check_target(&agent).is_ok());

    agent.state.fail("boom");
    assert!(matches!(
        check_target(&agent),
        Err(CoordinationError::Unavailable {
            state: AgentLifecycleState::Error,
            ..
        })
    ));
}

#[tokio::test]
async fn test_hand_off_to_missing_agent_is_not_found() {
    let harness = Harness::new(5);
    let result = harness
        .call(
            HandOffTool::ID,
            json!({"target_agent_id": "ghost", "task": "anything"}),
        )
        .await;

    assert!(!result.success);
    assert_eq!(result.failure_kind, Some(FailureKind::NotFound));
    assert!(result.error.unwrap().contains("not found"));
}

#[tokio::test]
async fn test_hand_off_waits_for_response() {
    let harness = Harness::new(5);
    let target = harness.add(FakeAgent::new("worker").with_reply("42").ready().await);

    let result = harness
        .call(
            HandOffTool::ID,
            json!({
                "target_agent_id": target.id(),
                "task": "compute",
                "context": {"priority": "high"},
                "wait_for_completion": true,
                "timeout_seconds": 5
            }),
        )
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.content, "42");
    assert_eq!(target.status().state, AgentLifecycleState::Idle);

    let received = target.received.lock().unwrap();
    let message = &received[0];
    assert!(message.content.starts_with("compute"));
    assert!(message.content.contains("priority"));
    assert_eq!(message.session_id.as_deref(), Some("s-1"));
    let handoff = &message.metadata["handoff"];
    assert_eq!(handoff["source_tool_call_id"], "call-1");
    assert_eq!(handoff["context"]["priority"], "high");
    assert!(handoff["handed_off_at"].is_string());
}

#[tokio::test]
async fn test_hand_off_to_busy_agent_never_sends() {
    let harness = Harness::new(5);
    let target = harness.add(
        FakeAgent::new("worker")
            .with_delay(Duration::from_secs(30))
            .ready()
            .await,
    );
    let _first = target
        .send_message_stream(AgentMessage::user("long job"), CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(target.status().state, AgentLifecycleState::Busy);

    let result = harness
        .call(
            HandOffTool::ID,
            json!({"target_agent_id": target.id(), "task": "more"}),
        )
        .await;

    assert_eq!(result.failure_kind, Some(FailureKind::Busy));
    assert_eq!(target.sends(), 1);
}

#[tokio::test]
async fn test_hand_off_to_failed_agent_is_unavailable() {
    let harness = Harness::new(5);
    let target = harness.add(FakeAgent::new("worker").ready().await);
    target.state.fail("transport closed");

    let result = harness
        .call(
            HandOffTool::ID,
            json!({"target_agent_id": target.id(), "task": "more"}),
        )
        .await;

    assert_eq!(result.failure_kind, Some(FailureKind::Unavailable));
    assert_eq!(target.sends(), 0);
}

#[tokio::test]
async fn test_hand_off_timeout_is_distinct_and_releases_target() {
    let harness = Harness::new(5);
    let target = harness.add(
        FakeAgent::new("slow")
            .with_delay(Duration::from_secs(30))
            .ready()
            .await,
    );

    let started = Instant::now();
    let result = harness
        .call(
            HandOffTool::ID,
            json!({
                "target_agent_id": target.id(),
                "task": "slow work",
                "wait_for_completion": true,
                "timeout_seconds": 1
            }),
        )
        .await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(result.failure_kind, Some(FailureKind::Timeout));
    assert_eq!(target.status().state, AgentLifecycleState::Idle);
}

#[tokio::test]
async fn test_hand_off_detached_is_supervised() {
    let harness = Harness::new(5);
    let target = harness.add(FakeAgent::new("worker").with_reply("bg").ready().await);

    let result = harness
        .call(
            HandOffTool::ID,
            json!({
                "target_agent_id": target.id(),
                "task": "background",
                "wait_for_completion": false
            }),
        )
        .await;

    assert!(result.success);
    let output = result.structured_output.unwrap();
    let task_id = output["task_id"].as_str().unwrap().to_string();

    let task = harness.supervisor.join(&task_id).await.unwrap();
    assert_eq!(task.state, TaskState::Succeeded);
    assert_eq!(task.output.as_deref(), Some("bg"));
}

#[tokio::test]
async fn test_wait_returns_within_timeout_not_poll_interval() {
    let harness = Harness::new(5);
    let target = harness.add(
        FakeAgent::new("stuck")
            .with_delay(Duration::from_secs(60))
            .ready()
            .await,
    );
    let _busy = target
        .send_message_stream(AgentMessage::user("forever"), CancellationToken::new())
        .await
        .unwrap();

    let started = Instant::now();
    let result = harness
        .call(
            WaitForAgentTool::ID,
            json!({
                "agent_id": target.id(),
                "timeout_seconds": 1,
                "poll_interval_seconds": 5
            }),
        )
        .await;
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(900), "{:?}", elapsed);
    assert!(elapsed < Duration::from_secs(3), "{:?}", elapsed);
    assert_eq!(result.failure_kind, Some(FailureKind::Timeout));
    let report = result.structured_output.unwrap();
    assert_eq!(report["state"], "busy");
    assert_eq!(report["status_history"][0]["state"], "busy");
}

#[tokio::test]
async fn test_wait_sees_pushed_completion() {
    let harness = Harness::new(5);
    let target = harness.add(
        FakeAgent::new("worker")
            .with_reply("finished")
            .with_delay(Duration::from_millis(200))
            .ready()
            .await,
    );
    let stream = target
        .send_message_stream(AgentMessage::user("go"), CancellationToken::new())
        .await
        .unwrap();
    let driver = tokio::spawn(conclave_protocols::collect_response(stream));

    let started = Instant::now();
    let result = harness
        .call(
            WaitForAgentTool::ID,
            json!({
                "agent_id": target.id(),
                "timeout_seconds": 10,
                "poll_interval_seconds": 10,
                "return_output": true
            }),
        )
        .await;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.content, "finished");

    let report = result.structured_output.unwrap();
    assert_eq!(report["output"], "finished");
    let history = report["status_history"].as_array().unwrap();
    assert_eq!(history.first().unwrap()["state"], "busy");
    assert_eq!(history.last().unwrap()["state"], "idle");
    let stamps: Vec<&str> = history.iter().map(|o| o["at"].as_str().unwrap()).collect();
    let parsed: Vec<chrono::DateTime<chrono::Utc>> =
        stamps.iter().map(|s| s.parse().unwrap()).collect();
    assert!(parsed.windows(2).all(|w| w[0] <= w[1]));

    driver.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_wait_on_failed_agent_is_not_success() {
    let harness = Harness::new(5);
    let target = harness.add(FakeAgent::new("worker").ready().await);
    target.state.fail("crashed");

    let result = harness
        .call(WaitForAgentTool::ID, json!({"agent_id": target.id()}))
        .await;

    assert!(!result.success);
    assert_eq!(result.failure_kind, Some(FailureKind::Unavailable));
    assert_eq!(result.structured_output.unwrap()["last_error"], "crashed");
}

#[tokio::test]
async fn test_wait_honours_caller_cancellation() {
    let harness = Harness::new(5);
    let target = harness.add(FakeAgent::new("idle-never").with_delay(Duration::from_secs(60)).ready().await);
    let _busy = target
        .send_message_stream(AgentMessage::user("forever"), CancellationToken::new())
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let ctx = ToolContext::new("call-2").with_cancel(cancel.clone());
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let result = harness
        .tools
        .execute(
            WaitForAgentTool::ID,
            json!({"agent_id": target.id(), "timeout_seconds": 30}),
            ctx,
        )
        .await;
    assert_eq!(result.failure_kind, Some(FailureKind::Cancelled));
}

#[tokio::test]
async fn test_wait_rejects_unknown_parameters() {
    let harness = Harness::new(5);
    let result = harness
        .call(
            WaitForAgentTool::ID,
            json!({"agent_id": "a", "timeout": 3}),
        )
        .await;
    assert_eq!(result.failure_kind, Some(FailureKind::InvalidParameters));
}

#[tokio::test]
async fn test_create_at_ceiling_is_refused() {
    let harness = Harness::with_providers(5, subprocess_provider("/nonexistent/agent-cli", &[]));
    for i in 0..5 {
        harness.add(FakeAgent::new(&format!("agent-{}", i)).ready().await);
    }

    let result = harness
        .call(
            CreateAgentTool::ID,
            json!({"name": "sixth", "task": "hello"}),
        )
        .await;

    assert!(!result.success);
    assert_eq!(result.failure_kind, Some(FailureKind::CeilingReached));
    assert_eq!(
        result.error.as_deref(),
        Some("Maximum number of concurrent agents (5) reached")
    );
    assert_eq!(harness.registry.len(), 5);
}

#[tokio::test]
async fn test_create_with_unknown_provider() {
    let harness = Harness::with_providers(5, subprocess_provider("agent-cli", &[]));
    let result = harness
        .call(
            CreateAgentTool::ID,
            json!({"name": "x", "task": "hello", "provider": "grpc"}),
        )
        .await;
    assert_eq!(result.failure_kind, Some(FailureKind::InvalidParameters));
    assert!(harness.registry.is_empty());
}

#[tokio::test]
async fn test_create_failed_start_is_disposed() {
    let harness = Harness::with_providers(5, subprocess_provider("/nonexistent/agent-cli", &[]));
    let result = harness
        .call(CreateAgentTool::ID, json!({"name": "x", "task": "hello"}))
        .await;

    assert_eq!(result.failure_kind, Some(FailureKind::Startup));
    assert!(harness.registry.is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_create_then_wait_for_initial_task() {
    let script = r#"while IFS= read -r line; do
  printf '%s\n' '{"type":"text","content":"brief received","done":true}'
done"#;
    let harness = Harness::with_providers(5, subprocess_provider("sh", &["-c", script]));

    let created = harness
        .call(
            CreateAgentTool::ID,
            json!({"name": "researcher", "task": "summarize", "model": "m-1"}),
        )
        .await;
    assert!(created.success, "{:?}", created.error);
    let output = created.structured_output.unwrap();
    assert_eq!(output["name"], "researcher");
    assert_eq!(output["model"], "m-1");
    let agent_id = output["agent_id"].as_str().unwrap().to_string();
    let task_id = output["task_id"].as_str().unwrap().to_string();
    assert!(harness.registry.contains(&agent_id));

    let waited = harness
        .call(
            WaitForAgentTool::ID,
            json!({"agent_id": agent_id, "timeout_seconds": 10, "return_output": true}),
        )
        .await;
    assert!(waited.success, "{:?}", waited.error);
    assert_eq!(waited.content, "brief received");

    let task = harness.supervisor.join(&task_id).await.unwrap();
    assert_eq!(task.state, TaskState::Succeeded);

    harness.registry.dispose_all().await;
}
