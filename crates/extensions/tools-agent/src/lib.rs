//! Agent coordination tools for conclave.
//!
//! Lets a running agent spawn sub-agents, hand tasks to other agents and
//! wait for them, all through the shared [`AgentRegistry`].
//!
//! ## Tools
//!
//! - `create_agent` - build, start and task a new agent
//! - `hand_off_to_agent` - forward a task (and context) to an existing agent
//! - `wait_for_agent` - block until an agent settles or a timeout elapses
//!
//! Background exchanges started by these tools are owned by a
//! [`TaskSupervisor`], so their outcomes stay observable.
//!
//! [`AgentRegistry`]: conclave_core::AgentRegistry

mod coordination;
mod factory;
mod supervisor;
mod toolkit;
mod tools;

pub use coordination::{Coordination, CoordinationDefaults};
pub use factory::{AgentFactory, AgentSpec, CreateError};
pub use supervisor::{SupervisedTask, TaskKind, TaskState, TaskSupervisor};
pub use toolkit::{register_agent_tools, AGENT_TOOL_IDS};
pub use tools::*;
