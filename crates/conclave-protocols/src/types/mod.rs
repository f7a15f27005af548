//! Data model shared by every crate in the workspace.

mod common;
mod frame;
mod identity;
mod message;
mod response;
mod state;
mod tool_call;

pub use common::*;
pub use frame::*;
pub use identity::*;
pub use message::*;
pub use response::*;
pub use state::*;
pub use tool_call::*;
