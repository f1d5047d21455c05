//! Hostbridge Socket Bridge
//!
//! WebSocket-style connections for scripts on a single-threaded host:
//! - Each connection runs a blocking client loop on its own thread
//! - That thread only ever pushes immutable [`SocketEvent`]s into a queue
//! - A poller on the host thread drains the queue and invokes callbacks
//!
//! The client itself is pluggable through [`Connector`]; [`WsConnector`]
//! is the production implementation.

pub mod bridge;
pub mod connector;
pub mod event;
pub mod ws;

pub use bridge::{SocketBridge, SocketError, SocketInvoker, DEFAULT_POLL_INTERVAL};
pub use connector::{Connector, EventSink, SocketLink};
pub use event::{
    ReadyState, SocketCommand, SocketEvent, SocketEventKind, TransportError, CLOSE_ABNORMAL,
    CLOSE_NORMAL, CLOSE_NO_STATUS,
};
pub use ws::WsConnector;
