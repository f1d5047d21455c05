use std::fmt;
use thiserror::Error;

/// Close code for a normal shutdown.
pub const CLOSE_NORMAL: u16 = 1000;
/// Close frame arrived without a status code.
pub const CLOSE_NO_STATUS: u16 = 1005;
/// Connection dropped without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Socket lifecycle stage. Ordered so that a transition is `max(old, new)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ReadyState {
    Connecting = 0,
    Open = 1,
    Closing = 2,
    Closed = 3,
}

impl ReadyState {
    /// Script-visible numeric value.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// State after observing `event`. Never moves backwards.
    pub fn on_event(self, event: &SocketEvent) -> Self {
        let next = match event {
            SocketEvent::Open => ReadyState::Open,
            SocketEvent::Message(_) => return self,
            SocketEvent::Error(_) | SocketEvent::Close { .. } => ReadyState::Closed,
        };
        self.max(next)
    }
}

impl fmt::Display for ReadyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReadyState::Connecting => "CONNECTING",
            ReadyState::Open => "OPEN",
            ReadyState::Closing => "CLOSING",
            ReadyState::Closed => "CLOSED",
        })
    }
}

/// Failure observed by a background client loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("connection lost: {0}")]
    Io(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Event produced by a background client loop, consumed on the host thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Open,
    Message(String),
    Error(TransportError),
    Close { code: u16, reason: String },
}

impl SocketEvent {
    pub fn kind(&self) -> SocketEventKind {
        match self {
            SocketEvent::Open => SocketEventKind::Open,
            SocketEvent::Message(_) => SocketEventKind::Message,
            SocketEvent::Error(_) => SocketEventKind::Error,
            SocketEvent::Close { .. } => SocketEventKind::Close,
        }
    }

    pub fn abnormal_close() -> Self {
        SocketEvent::Close {
            code: CLOSE_ABNORMAL,
            reason: String::new(),
        }
    }
}

/// Callback slot on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketEventKind {
    Open,
    Message,
    Error,
    Close,
}

impl SocketEventKind {
    pub const ALL: [SocketEventKind; 4] = [
        SocketEventKind::Open,
        SocketEventKind::Message,
        SocketEventKind::Error,
        SocketEventKind::Close,
    ];

    /// Parse `onopen` / `open` style names.
    pub fn parse(name: &str) -> Option<Self> {
        match name.strip_prefix("on").unwrap_or(name) {
            "open" => Some(SocketEventKind::Open),
            "message" => Some(SocketEventKind::Message),
            "error" => Some(SocketEventKind::Error),
            "close" => Some(SocketEventKind::Close),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SocketEventKind::Open => "open",
            SocketEventKind::Message => "message",
            SocketEventKind::Error => "error",
            SocketEventKind::Close => "close",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

/// Request from the host thread to a background client loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketCommand {
    Send(String),
    Close { code: u16, reason: String },
}
