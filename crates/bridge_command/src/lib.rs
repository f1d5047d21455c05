//! Hostbridge Command Dispatcher
//!
//! Turns structured commands from scripts into scene-graph mutations:
//! - [`Command`]: the closed command vocabulary, one payload per kind
//! - [`CommandDispatcher`]: validation, defaults and dispatch
//! - [`CommandError`]: typed failures surfaced to scripts as thrown errors
//!
//! Commands arrive as a native [`Command`], JSON text, or a parsed JSON
//! object; all three go through the same path.

pub mod command;
pub mod dispatch;
pub mod error;
pub mod nodes;
pub mod outcome;

pub use command::{Command, SocketRef};
pub use dispatch::{CommandDispatcher, DispatchOptions};
pub use error::CommandError;
pub use outcome::CommandOutcome;
