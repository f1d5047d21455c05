//! WebSocket client loop
//!
//! Each background thread owns a current-thread tokio runtime and blocks on
//! one connection for its whole lifetime.

use crate::connector::{Connector, EventSink, SocketLink};
use crate::event::{SocketCommand, SocketEvent, TransportError, CLOSE_ABNORMAL, CLOSE_NO_STATUS};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// Production connector backed by `tokio-tungstenite`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn run(&self, url: &str, link: &mut SocketLink) {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(runtime) => runtime,
            Err(err) => {
                link.events.fail(TransportError::Io(err.to_string()));
                return;
            }
        };
        let SocketLink { events, commands } = link;
        runtime.block_on(drive(url, events, commands));
    }
}

async fn drive(url: &str, events: &mut EventSink, commands: &mut UnboundedReceiver<SocketCommand>) {
    let stream = match connect_async(url).await {
        Ok((stream, _response)) => stream,
        Err(err) => {
            tracing::debug!(url, error = %err, "websocket connect failed");
            events.fail(TransportError::Connect(err.to_string()));
            return;
        }
    };
    events.emit(SocketEvent::Open);
    let (mut sink, mut stream) = stream.split();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(SocketCommand::Send(text)) => {
                    if let Err(err) = sink.send(Message::Text(text)).await {
                        events.fail(TransportError::Io(err.to_string()));
                        return;
                    }
                }
                Some(SocketCommand::Close { code, reason }) => {
                    let frame = CloseFrame {
                        code: CloseCode::from(code),
                        reason: reason.clone().into(),
                    };
                    if sink.send(Message::Close(Some(frame))).await.is_err() {
                        events.emit(SocketEvent::Close { code, reason });
                        return;
                    }
                    // Keep reading until the peer acknowledges the close
                }
                None => {
                    // Host dropped the connection
                    let _ = sink.close().await;
                    return;
                }
            },
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => events.emit(SocketEvent::Message(text)),
                Some(Ok(Message::Binary(bytes))) => {
                    events.emit(SocketEvent::Message(String::from_utf8_lossy(&bytes).into_owned()));
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame
                        .map(|f| (u16::from(f.code), f.reason.into_owned()))
                        .unwrap_or((CLOSE_NO_STATUS, String::new()));
                    events.emit(SocketEvent::Close { code, reason });
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    events.fail(TransportError::Protocol(err.to_string()));
                    return;
                }
                None => {
                    events.emit(SocketEvent::Close {
                        code: CLOSE_ABNORMAL,
                        reason: String::new(),
                    });
                    return;
                }
            },
        }
    }
}
