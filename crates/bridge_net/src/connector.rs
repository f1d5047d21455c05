//! Background side of a connection

use crate::event::{SocketCommand, SocketEvent, TransportError};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

/// Runs one connection's client loop to completion on a background thread.
///
/// Implementations report everything through `link.events` and should stop
/// once `link.commands` is closed (the host dropped the connection).
pub trait Connector: Send + Sync + 'static {
    fn run(&self, url: &str, link: &mut SocketLink);
}

/// Both ends of a connection as seen from the background thread.
pub struct SocketLink {
    pub events: EventSink,
    pub commands: UnboundedReceiver<SocketCommand>,
}

impl SocketLink {
    pub fn new(events: UnboundedSender<SocketEvent>, commands: UnboundedReceiver<SocketCommand>) -> Self {
        Self {
            events: EventSink {
                tx: events,
                closed: false,
            },
            commands,
        }
    }
}

/// Event producer. Guarantees the stream ends with exactly one `Close`.
pub struct EventSink {
    tx: UnboundedSender<SocketEvent>,
    closed: bool,
}

impl EventSink {
    /// Push an event. Anything after a `Close` is dropped, as is anything
    /// pushed after the host abandoned the connection.
    pub fn emit(&mut self, event: SocketEvent) {
        if self.closed {
            return;
        }
        self.closed = matches!(event, SocketEvent::Close { .. });
        if self.tx.send(event).is_err() {
            tracing::trace!("socket event dropped, host side gone");
        }
    }

    /// Report a transport failure: one `Error`, then an abnormal `Close`.
    pub fn fail(&mut self, error: TransportError) {
        self.emit(SocketEvent::Error(error));
        self.emit(SocketEvent::abnormal_close());
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Called after the client loop returns.
    pub(crate) fn finish(&mut self) {
        if !self.closed {
            self.emit(SocketEvent::abnormal_close());
        }
    }
}
