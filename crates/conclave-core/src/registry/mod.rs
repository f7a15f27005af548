//! Registries for agents and tools.

mod agent;
mod base;
mod tool;

pub use agent::{AgentRegistry, DEFAULT_MAX_AGENTS};
pub use base::{BaseRegistry, Registerable};
pub use tool::ToolRegistry;
