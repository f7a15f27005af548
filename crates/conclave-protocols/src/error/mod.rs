//! Error types for the conclave protocol layer.

mod agent;
mod coordination;
mod registry;
mod tool;

pub use agent::*;
pub use coordination::*;
pub use registry::*;
pub use tool::*;
