//! # Conclave Runtime
//!
//! Agent backings and the machinery shared by them.
//!
//! - [`decoder`] - NDJSON and event-stream frame decoders
//! - [`ResponseAssembler`] - frames to the uniform response sequence
//! - [`StateCell`] - lifecycle state publication
//! - [`SubprocessAgent`] - agent CLI driven over stdin/stdout
//! - [`HttpProviderAgent`] - OpenAI-compatible streaming endpoint

pub mod assembler;
pub mod decoder;
mod exchange;
pub mod lifecycle;
pub mod provider;
pub mod store;
pub mod subprocess;

pub use assembler::ResponseAssembler;
pub use exchange::Collaborators;
pub use lifecycle::{ExchangeTicket, StateCell};
pub use provider::HttpProviderAgent;
pub use store::MemoryMessageStore;
pub use subprocess::SubprocessAgent;
