//! # Conclave Core
//!
//! Ownership containers of the runtime.
//!
//! ## Components
//!
//! - [`AgentRegistry`] - Bounded, id-keyed set of live agents
//! - [`ToolRegistry`] - Tools with schema validation before dispatch

pub mod registry;

pub use registry::{AgentRegistry, ToolRegistry, DEFAULT_MAX_AGENTS};
