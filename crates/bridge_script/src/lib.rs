//! Hostbridge Scripting Host
//!
//! Embeds QuickJS and exposes the host capabilities to scripts:
//!
//! - **Bindings:** native functions (`setTimeout`, `applyCommand`, `__ws_*`, ...)
//! - **Prelude:** script-level `console`, `queueMicrotask` and `WebSocket`
//! - **Lifecycle:** one live host per process, created lazily, reloadable
//!
//! Script callbacks are stored as `Persistent` handles and only ever touched
//! on the host thread.

pub mod bindings;
pub mod callback;
pub mod convert;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod polyfill;

pub use error::HostError;
pub use host::{HostConfig, ScriptHost};
pub use lifecycle::{HostFactory, RuntimeState};
pub use rquickjs;
