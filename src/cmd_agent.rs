//! `conclave send` and `conclave probe`.

use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use conclave_config::Config;
use conclave_core::AgentRegistry;
use conclave_monitor::{HealthMonitor, ProbeOutcome};
use conclave_protocols::agent::Agent;
use conclave_protocols::error::AgentError;
use conclave_protocols::events::TracingEventSink;
use conclave_protocols::types::{AgentMessage, AgentResponse};
use conclave_runtime::{Collaborators, MemoryMessageStore};
use conclave_tools_agent::{AgentFactory, AgentSpec};

use crate::cli::{AgentArgs, SendArgs};

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Build, register and start one agent.
async fn start_agent(
    config: &Config,
    registry: &AgentRegistry,
    spec: AgentSpec,
) -> Result<Arc<dyn Agent>, Box<dyn std::error::Error>> {
    let collaborators = Collaborators::new(Arc::new(TracingEventSink))
        .with_store(Arc::new(MemoryMessageStore::new()));
    let factory = AgentFactory::from_config(config).with_collaborators(collaborators);

    let agent = registry.create(|| factory.build(&spec))?;
    agent.initialize().await?;
    info!(agent_id = %agent.id(), kind = %agent.identity().kind, "Agent started");
    Ok(agent)
}

fn spec_from(args: &AgentArgs) -> AgentSpec {
    AgentSpec {
        model: args.model.clone(),
        provider: args.provider.clone(),
        ..AgentSpec::new(&args.name)
    }
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling exchange");
            token.cancel();
        }
    });
}

fn read_message(message: Option<String>) -> Result<String, std::io::Error> {
    match message {
        Some(message) => Ok(message),
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer)?;
            Ok(buffer.trim_end().to_string())
        }
    }
}

pub(crate) async fn send(config: &Config, args: SendArgs) -> CliResult {
    let text = read_message(args.message)?;
    if text.is_empty() {
        return Err("empty message".into());
    }

    let registry = AgentRegistry::new(config.runtime.max_concurrent_agents);
    let spec = AgentSpec {
        temperature: args.temperature,
        system_prompt: args.system,
        ..spec_from(&args.agent)
    };
    let agent = start_agent(config, &registry, spec).await?;

    let cancel = CancellationToken::new();
    cancel_on_interrupt(cancel.clone());
    let timeout = args
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.runtime.default_timeout());

    let outcome = tokio::time::timeout(timeout, stream_reply(agent.as_ref(), text, cancel)).await;
    registry.dispose_all().await;

    match outcome {
        Ok(Ok(response)) => {
            if let Some(usage) = &response.usage {
                info!(
                    input_tokens = usage.input_tokens,
                    output_tokens = usage.output_tokens,
                    "Exchange finished"
                );
            }
            Ok(())
        }
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(AgentError::Timeout(timeout.as_secs()).into()),
    }
}

async fn stream_reply(
    agent: &dyn Agent,
    text: String,
    cancel: CancellationToken,
) -> Result<AgentResponse, AgentError> {
    let mut stream = agent
        .send_message_stream(AgentMessage::user(text), cancel)
        .await?;
    let mut stdout = std::io::stdout();
    let mut streamed = false;

    while let Some(item) = stream.next().await {
        let response = item?;
        for call in &response.tool_calls {
            eprintln!("[tool call] {} {}", call.name, call.parameters);
        }
        if response.is_complete {
            if !streamed {
                print!("{}", response.content);
            }
            println!();
            return Ok(response);
        }
        if !response.content.is_empty() {
            streamed = true;
            print!("{}", response.content);
            let _ = stdout.flush();
        }
    }
    Err(AgentError::Communication(
        "response stream ended without a terminal frame".to_string(),
    ))
}

pub(crate) async fn probe(config: &Config, args: AgentArgs) -> CliResult {
    let registry = AgentRegistry::new(config.runtime.max_concurrent_agents);
    let agent = start_agent(config, &registry, spec_from(&args)).await?;

    let monitor = HealthMonitor::from_config(&config.health);
    let outcome = monitor.check_now(agent.as_ref()).await;
    monitor.shutdown().await;
    registry.dispose_all().await;

    match outcome {
        ProbeOutcome::Healthy => {
            println!("{}: healthy", args.name);
            Ok(())
        }
        ProbeOutcome::Skipped => {
            println!("{}: not probed (agent not idle)", args.name);
            Ok(())
        }
        ProbeOutcome::Unhealthy(detail) => Err(format!("{}: unhealthy: {}", args.name, detail).into()),
    }
}
