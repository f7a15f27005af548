//! # Conclave Config
//!
//! Configuration collaborator for the conclave runtime: concurrency ceiling,
//! default timeouts, provider definitions, health probing and logging.

mod error;
mod loader;
mod schema;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
