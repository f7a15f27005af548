//! Tool protocol definitions.
//!
//! Tools are how a coordinating agent acts on the runtime: spawning agents,
//! handing off work and waiting for results.

mod context;
mod definition;
mod result;
mod traits;

pub use context::*;
pub use definition::*;
pub use result::*;
pub use traits::*;
