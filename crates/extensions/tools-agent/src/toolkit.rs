//! Registration of the coordination tools.

use std::sync::Arc;

use tracing::debug;

use conclave_core::ToolRegistry;
use conclave_protocols::error::RegistryError;
use conclave_protocols::tool::Tool;

use crate::coordination::Coordination;
use crate::tools::{CreateAgentTool, HandOffTool, WaitForAgentTool};

/// IDs of the tools added by [`register_agent_tools`].
pub const AGENT_TOOL_IDS: [&str; 3] = [
    CreateAgentTool::ID,
    HandOffTool::ID,
    WaitForAgentTool::ID,
];

/// Register `create_agent`, `hand_off_to_agent` and `wait_for_agent`.
pub fn register_agent_tools(
    tools: &ToolRegistry,
    coordination: Arc<Coordination>,
) -> Result<(), RegistryError> {
    let agent_tools: [Arc<dyn Tool>; 3] = [
        Arc::new(CreateAgentTool::new(Arc::clone(&coordination))),
        Arc::new(HandOffTool::new(Arc::clone(&coordination))),
        Arc::new(WaitForAgentTool::new(coordination)),
    ];
    for tool in agent_tools {
        tools.register(tool)?;
    }
    debug!(tools = ?AGENT_TOOL_IDS, "Registered coordination tools");
    Ok(())
}
