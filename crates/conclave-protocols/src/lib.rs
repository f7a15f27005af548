//! # Conclave Protocols
//!
//! Core protocol definitions for the conclave agent runtime.
//! Contains the data model and interface definitions - no transports.
//!
//! ## Core Traits
//!
//! - [`Agent`] - Capability contract shared by every agent backing
//! - [`Tool`] - Trait for tool implementations (coordination tools live here)
//! - [`EventSink`] - Push collaborator receiving runtime events
//! - [`MessageStore`] - Persistence collaborator receiving finalized messages

pub mod agent;
pub mod error;
pub mod events;
pub mod store;
pub mod tool;
pub mod types;

pub use agent::{collect_response, Agent, AgentResponseStream};
pub use error::{AgentError, CoordinationError, RegistryError, ToolError};
pub use events::{BroadcastEventSink, EventSink, NoopEventSink, RuntimeEvent, TracingEventSink};
pub use store::{MessageStore, StoreError};
pub use tool::{FailureKind, Tool, ToolContext, ToolDefinition, ToolResult};
pub use types::*;
