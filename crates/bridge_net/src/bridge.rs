//! Host side of the socket bridge
//!
//! Every connection gets an event queue, a command channel and a background
//! thread. A poller task on the host scheduler drains the queue on a fixed
//! interval until the connection's close event has been delivered. After
//! that the connection is dropped and only its ID is remembered, so late
//! calls against it stay silent and report CLOSED.

use crate::connector::{Connector, SocketLink};
use crate::event::{ReadyState, SocketCommand, SocketEvent, SocketEventKind};
use bridge_core::{CallbackError, Rearm, SchedulerHandle, TaskId};
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Calls a socket callback with the event that triggered it.
pub type SocketInvoker<C> = Rc<dyn Fn(&C, &SocketEvent) -> Result<(), CallbackError>>;

#[derive(Debug, Error)]
pub enum SocketError {
    #[error("unknown socket id: {0}")]
    UnknownSocket(u64),

    #[error("failed to spawn socket thread: {0}")]
    Spawn(#[from] std::io::Error),
}

struct Connection<C> {
    url: String,
    state: ReadyState,
    events: UnboundedReceiver<SocketEvent>,
    commands: UnboundedSender<SocketCommand>,
    callbacks: [Option<C>; 4],
    poller: TaskId,
}

struct SocketTable<C> {
    next_id: u64,
    connections: HashMap<u64, Connection<C>>,
    /// IDs whose close event has been delivered.
    closed: HashSet<u64>,
}

impl<C> SocketTable<C> {
    fn lookup(&self, id: u64) -> Result<Option<&Connection<C>>, SocketError> {
        match self.connections.get(&id) {
            Some(connection) => Ok(Some(connection)),
            None if self.closed.contains(&id) => Ok(None),
            None => Err(SocketError::UnknownSocket(id)),
        }
    }
}

/// Registry behind the `__ws_*` host functions.
pub struct SocketBridge<C> {
    table: Rc<RefCell<SocketTable<C>>>,
    scheduler: SchedulerHandle,
    connector: Arc<dyn Connector>,
    invoker: SocketInvoker<C>,
    poll_interval: Duration,
}

impl<C> Clone for SocketBridge<C> {
    fn clone(&self) -> Self {
        Self {
            table: Rc::clone(&self.table),
            scheduler: Rc::clone(&self.scheduler),
            connector: Arc::clone(&self.connector),
            invoker: Rc::clone(&self.invoker),
            poll_interval: self.poll_interval,
        }
    }
}

impl<C: Clone + 'static> SocketBridge<C> {
    pub fn new(scheduler: SchedulerHandle, connector: Arc<dyn Connector>, invoker: SocketInvoker<C>) -> Self {
        Self::with_poll_interval(scheduler, connector, invoker, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(
        scheduler: SchedulerHandle,
        connector: Arc<dyn Connector>,
        invoker: SocketInvoker<C>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            table: Rc::new(RefCell::new(SocketTable {
                next_id: 1,
                connections: HashMap::new(),
                closed: HashSet::new(),
            })),
            scheduler,
            connector,
            invoker,
            poll_interval,
        }
    }

    /// Start connecting to `url` on a new background thread.
    pub fn open(&self, url: &str) -> Result<u64, SocketError> {
        let id = {
            let mut table = self.table.borrow_mut();
            let id = table.next_id;
            table.next_id += 1;
            id
        };

        let (event_tx, event_rx) = unbounded_channel();
        let (command_tx, command_rx) = unbounded_channel();
        let connector = Arc::clone(&self.connector);
        let target = url.to_string();
        std::thread::Builder::new()
            .name(format!("socket-{id}"))
            .spawn(move || {
                let mut link = SocketLink::new(event_tx, command_rx);
                connector.run(&target, &mut link);
                link.events.finish();
                tracing::debug!(socket_id = id, "socket thread finished");
            })?;

        let table = Rc::downgrade(&self.table);
        let invoker = Rc::clone(&self.invoker);
        let interval = self.poll_interval;
        let poller = self
            .scheduler
            .after(interval, Box::new(move || poll(&table, &invoker, id, interval)));

        self.table.borrow_mut().connections.insert(
            id,
            Connection {
                url: url.to_string(),
                state: ReadyState::Connecting,
                events: event_rx,
                commands: command_tx,
                callbacks: Default::default(),
                poller,
            },
        );
        tracing::info!(socket_id = id, url, "socket opening");
        Ok(id)
    }

    /// Queue a text frame. A silent no-op unless the socket is OPEN.
    pub fn send(&self, id: u64, data: String) -> Result<(), SocketError> {
        let table = self.table.borrow();
        let Some(connection) = table.lookup(id)? else {
            tracing::debug!(socket_id = id, "send ignored, socket closed");
            return Ok(());
        };
        match connection.state {
            ReadyState::Open => {
                let _ = connection.commands.send(SocketCommand::Send(data));
            }
            state => tracing::debug!(socket_id = id, %state, "send ignored, socket not open"),
        }
        Ok(())
    }

    /// Move to CLOSING and ask the background client to shut down. CLOSED
    /// is reached only when the close event arrives. Unknown IDs are ignored.
    pub fn close(&self, id: u64, code: u16, reason: String) {
        let mut table = self.table.borrow_mut();
        let Some(connection) = table.connections.get_mut(&id) else {
            return;
        };
        if connection.state >= ReadyState::Closing {
            return;
        }
        connection.state = ReadyState::Closing;
        let _ = connection.commands.send(SocketCommand::Close { code, reason });
        tracing::debug!(socket_id = id, code, "socket closing");
    }

    /// Register the callback for `event` (`onopen`, `message`, ...). Unknown
    /// event names are ignored, as are callbacks for already-closed sockets.
    pub fn set_callback(&self, id: u64, event: &str, callback: C) -> Result<(), SocketError> {
        let replaced = {
            let mut table = self.table.borrow_mut();
            table.lookup(id)?;
            let Some(connection) = table.connections.get_mut(&id) else {
                return Ok(());
            };
            let Some(kind) = SocketEventKind::parse(event) else {
                tracing::debug!(socket_id = id, event, "unknown socket event name ignored");
                return Ok(());
            };
            connection.callbacks[kind.index()].replace(callback)
        };
        drop(replaced);
        Ok(())
    }

    /// Current state; unknown IDs report CLOSED.
    pub fn ready_state(&self, id: u64) -> ReadyState {
        self.table
            .borrow()
            .connections
            .get(&id)
            .map_or(ReadyState::Closed, |c| c.state)
    }

    pub fn url(&self, id: u64) -> Option<String> {
        self.table.borrow().connections.get(&id).map(|c| c.url.clone())
    }

    /// Whether the poller for `id` is still scheduled.
    pub fn is_polling(&self, id: u64) -> bool {
        self.table.borrow().connections.contains_key(&id)
    }

    /// Number of connections whose close event has not been delivered.
    pub fn len(&self) -> usize {
        self.table.borrow().connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget every connection without a graceful shutdown. Background
    /// threads keep running; whatever they push afterwards is discarded.
    pub fn abandon(&self) {
        let connections: Vec<_> = {
            let mut table = self.table.borrow_mut();
            table.closed.clear();
            table.connections.drain().collect()
        };
        for (id, connection) in &connections {
            self.scheduler.cancel(connection.poller);
            tracing::debug!(socket_id = id, state = %connection.state, "socket abandoned");
        }
        drop(connections);
    }
}

fn poll<C: Clone>(
    table: &Weak<RefCell<SocketTable<C>>>,
    invoker: &SocketInvoker<C>,
    id: u64,
    interval: Duration,
) -> Rearm {
    let Some(table) = table.upgrade() else {
        return Rearm::Stop;
    };

    loop {
        let (event, callback, finished) = {
            let mut table = table.borrow_mut();
            let Some(connection) = table.connections.get_mut(&id) else {
                return Rearm::Stop;
            };
            let event = match connection.events.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) => return Rearm::Delay(interval),
                Err(TryRecvError::Disconnected) => {
                    tracing::warn!(socket_id = id, "socket thread ended without close event");
                    SocketEvent::abnormal_close()
                }
            };

            connection.state = connection.state.on_event(&event);
            let callback = connection.callbacks[event.kind().index()].clone();
            let finished = if matches!(event, SocketEvent::Close { .. }) {
                table.closed.insert(id);
                table.connections.remove(&id)
            } else {
                None
            };
            (event, callback, finished)
        };
        // Callbacks and channels go outside the borrow
        drop(finished);

        tracing::trace!(socket_id = id, event = event.kind().as_str(), "socket event");
        if let Some(callback) = callback {
            if let Err(err) = invoker(&callback, &event) {
                tracing::warn!(socket_id = id, event = event.kind().as_str(), error = %err, "socket callback failed");
            }
        }

        if let SocketEvent::Close { code, .. } = event {
            tracing::info!(socket_id = id, code, "socket closed");
            return Rearm::Stop;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{TransportError, CLOSE_ABNORMAL, CLOSE_NORMAL};
    use crate::ws::WsConnector;
    use bridge_core::{HostLoop, SystemClock};
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::sync::Mutex;

    type Log = Rc<RefCell<Vec<(&'static str, SocketEvent)>>>;

    const TIMEOUT: Duration = Duration::from_secs(5);

    /// Emits a fixed event list, then returns.
    struct Scripted(Vec<SocketEvent>);

    impl Connector for Scripted {
        fn run(&self, _url: &str, link: &mut SocketLink) {
            for event in &self.0 {
                link.events.emit(event.clone());
            }
        }
    }

    /// Opens, echoes sends, and closes on request.
    struct Echo;

    impl Connector for Echo {
        fn run(&self, _url: &str, link: &mut SocketLink) {
            link.events.emit(SocketEvent::Open);
            while let Some(command) = link.commands.blocking_recv() {
                match command {
                    SocketCommand::Send(text) => link.events.emit(SocketEvent::Message(text)),
                    SocketCommand::Close { code, reason } => {
                        link.events.emit(SocketEvent::Close { code, reason });
                        return;
                    }
                }
            }
        }
    }

    /// Waits for a release signal before pushing anything.
    struct Gated(Mutex<mpsc::Receiver<()>>, mpsc::Sender<()>);

    impl Connector for Gated {
        fn run(&self, _url: &str, link: &mut SocketLink) {
            if let Ok(gate) = self.0.lock() {
                let _ = gate.recv();
            }
            link.events.emit(SocketEvent::Open);
            link.events.emit(SocketEvent::Message("late".into()));
            let _ = self.1.send(());
        }
    }

    /// Acknowledges a close request with a late open, then closes once released.
    struct LateOpen(Mutex<mpsc::Receiver<()>>);

    impl Connector for LateOpen {
        fn run(&self, _url: &str, link: &mut SocketLink) {
            while let Some(command) = link.commands.blocking_recv() {
                if let SocketCommand::Close { code, reason } = command {
                    link.events.emit(SocketEvent::Open);
                    if let Ok(gate) = self.0.lock() {
                        let _ = gate.recv();
                    }
                    link.events.emit(SocketEvent::Close { code, reason });
                    return;
                }
            }
        }
    }

    fn setup(connector: Arc<dyn Connector>) -> (Rc<HostLoop>, SocketBridge<&'static str>, Log) {
        let host = Rc::new(HostLoop::new(Rc::new(SystemClock::new())));
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        let bridge = SocketBridge::new(
            host.clone(),
            connector,
            Rc::new(move |label: &&'static str, event: &SocketEvent| {
                sink.borrow_mut().push((*label, event.clone()));
                if *label == "throws" {
                    Err(CallbackError::new("handler blew up"))
                } else {
                    Ok(())
                }
            }),
        );
        (host, bridge, log)
    }

    fn register_all(bridge: &SocketBridge<&'static str>, id: u64) {
        for (event, label) in [("onopen", "open"), ("onmessage", "message"), ("onerror", "error"), ("onclose", "close")] {
            bridge.set_callback(id, event, label).unwrap();
        }
    }

    fn labels(log: &Log) -> Vec<&'static str> {
        log.borrow().iter().map(|(label, _)| *label).collect()
    }

    #[test]
    fn test_events_delivered_in_order() {
        let (host, bridge, log) = setup(Arc::new(Scripted(vec![
            SocketEvent::Open,
            SocketEvent::Message("one".into()),
            SocketEvent::Message("two".into()),
            SocketEvent::Error(TransportError::Io("reset".into())),
            SocketEvent::Close { code: 1011, reason: "bye".into() },
        ])));
        let id = bridge.open("ws://scripted").unwrap();
        register_all(&bridge, id);

        assert!(host.run_until(TIMEOUT, || bridge.ready_state(id) == ReadyState::Closed && !bridge.is_polling(id)));
        assert_eq!(labels(&log), vec!["open", "message", "message", "error", "close"]);
        assert_eq!(log.borrow()[2].1, SocketEvent::Message("two".into()));
    }

    #[test]
    fn test_error_then_close_without_open() {
        let (host, bridge, log) = setup(Arc::new(Scripted(vec![SocketEvent::Error(TransportError::Connect(
            "refused".into(),
        ))])));
        let id = bridge.open("ws://nowhere").unwrap();
        register_all(&bridge, id);

        // The link appends the close the connector never sent
        assert!(host.run_until(TIMEOUT, || !bridge.is_polling(id)));
        assert_eq!(labels(&log), vec!["error", "close"]);
        assert_eq!(log.borrow()[1].1, SocketEvent::abnormal_close());
        assert_eq!(bridge.ready_state(id), ReadyState::Closed);
    }

    #[test]
    fn test_send_is_noop_until_open_and_close_is_optimistic() {
        let (host, bridge, log) = setup(Arc::new(Echo));
        let id = bridge.open("ws://echo").unwrap();
        register_all(&bridge, id);

        // Still CONNECTING: dropped silently
        bridge.send(id, "too early".into()).unwrap();
        assert!(host.run_until(TIMEOUT, || bridge.ready_state(id) == ReadyState::Open));

        bridge.send(id, "hello".into()).unwrap();
        assert!(host.run_until(TIMEOUT, || log.borrow().len() == 2));
        assert_eq!(log.borrow()[1].1, SocketEvent::Message("hello".into()));

        bridge.close(id, CLOSE_NORMAL, "done".into());
        assert_eq!(bridge.ready_state(id), ReadyState::Closing);
        bridge.send(id, "after close".into()).unwrap();

        assert!(host.run_until(TIMEOUT, || bridge.ready_state(id) == ReadyState::Closed));
        assert_eq!(labels(&log), vec!["open", "message", "close"]);
        assert_eq!(
            log.borrow()[2].1,
            SocketEvent::Close { code: CLOSE_NORMAL, reason: "done".into() }
        );
    }

    #[test]
    fn test_open_after_close_request_stays_closing() {
        let (release_tx, release_rx) = mpsc::channel();
        let (host, bridge, log) = setup(Arc::new(LateOpen(Mutex::new(release_rx))));
        let id = bridge.open("ws://late").unwrap();
        register_all(&bridge, id);

        bridge.close(id, CLOSE_NORMAL, String::new());
        assert!(host.run_until(TIMEOUT, || !log.borrow().is_empty()));
        assert_eq!(labels(&log), vec!["open"]);
        assert_eq!(bridge.ready_state(id), ReadyState::Closing);

        release_tx.send(()).unwrap();
        assert!(host.run_until(TIMEOUT, || bridge.ready_state(id) == ReadyState::Closed));
        assert_eq!(labels(&log), vec!["open", "close"]);
    }

    #[test]
    fn test_unknown_ids() {
        let (_host, bridge, _log) = setup(Arc::new(Scripted(vec![])));
        assert!(matches!(bridge.send(42, "x".into()), Err(SocketError::UnknownSocket(42))));
        assert!(matches!(bridge.set_callback(42, "onopen", "open"), Err(SocketError::UnknownSocket(42))));
        assert_eq!(bridge.ready_state(42), ReadyState::Closed);
        bridge.close(42, CLOSE_NORMAL, String::new());
    }

    #[test]
    fn test_unknown_event_name_ignored() {
        let (host, bridge, log) = setup(Arc::new(Scripted(vec![SocketEvent::Open])));
        let id = bridge.open("ws://scripted").unwrap();
        bridge.set_callback(id, "onping", "ping").unwrap();
        bridge.set_callback(id, "close", "close").unwrap();
        assert!(host.run_until(TIMEOUT, || !bridge.is_polling(id)));
        assert_eq!(labels(&log), vec!["close"]);
    }

    #[test]
    fn test_failing_callback_does_not_stop_delivery() {
        let (host, bridge, log) = setup(Arc::new(Scripted(vec![
            SocketEvent::Open,
            SocketEvent::Message("m".into()),
        ])));
        let id = bridge.open("ws://scripted").unwrap();
        bridge.set_callback(id, "onopen", "throws").unwrap();
        bridge.set_callback(id, "onmessage", "message").unwrap();
        bridge.set_callback(id, "onclose", "close").unwrap();
        assert!(host.run_until(TIMEOUT, || !bridge.is_polling(id)));
        assert_eq!(labels(&log), vec!["throws", "message", "close"]);
    }

    #[test]
    fn test_closed_sockets_are_dropped_but_stay_silent() {
        let (host, bridge, log) = setup(Arc::new(Scripted(vec![SocketEvent::Open])));
        let id = bridge.open("ws://scripted").unwrap();
        let live = bridge.open("ws://scripted").unwrap();
        bridge.set_callback(id, "onclose", "close").unwrap();
        assert_eq!(bridge.len(), 2);
        assert!(host.run_until(TIMEOUT, || !bridge.is_polling(id) && !bridge.is_polling(live)));

        assert_eq!(bridge.len(), 0);
        assert!(bridge.is_empty());
        assert_eq!(bridge.url(id), None);
        assert_eq!(bridge.ready_state(id), ReadyState::Closed);
        bridge.send(id, "ignored".into()).unwrap();
        bridge.set_callback(id, "onmessage", "message").unwrap();
        bridge.close(id, CLOSE_NORMAL, String::new());
        assert_eq!(labels(&log), vec!["close"]);

        // IDs never handed out are still rejected
        assert!(matches!(bridge.send(live + 1, "x".into()), Err(SocketError::UnknownSocket(_))));
    }

    #[test]
    fn test_many_closed_sockets_release_their_connections() {
        let (host, bridge, log) = setup(Arc::new(Scripted(vec![SocketEvent::Open])));
        let ids: Vec<u64> = (0..50).map(|_| bridge.open("ws://scripted").unwrap()).collect();
        for id in &ids {
            bridge.set_callback(*id, "onclose", "close").unwrap();
        }
        assert!(host.run_until(TIMEOUT, || log.borrow().len() == ids.len()));
        assert!(bridge.is_empty());
        assert!(!host.has_timed_tasks());
        assert!(ids.iter().all(|id| bridge.send(*id, "late".into()).is_ok()));
    }

    #[test]
    fn test_abandon_discards_late_pushes() {
        // Background threads are left running on purpose; this one exits once
        // its pushes land on the discarded queue.
        let (release_tx, release_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();
        let (host, bridge, log) = setup(Arc::new(Gated(Mutex::new(release_rx), done_tx)));
        let id = bridge.open("ws://gated").unwrap();
        register_all(&bridge, id);

        bridge.abandon();
        assert!(bridge.is_empty());
        release_tx.send(()).unwrap();
        done_rx.recv_timeout(TIMEOUT).unwrap();

        host.run_for(Duration::from_millis(50));
        assert!(log.borrow().is_empty());
        assert!(!host.has_timed_tasks());
    }

    #[test]
    fn test_unreachable_websocket() {
        let (host, bridge, log) = setup(Arc::new(WsConnector));
        let id = bridge.open("ws://127.0.0.1:1").unwrap();
        register_all(&bridge, id);

        assert!(host.run_until(TIMEOUT, || !bridge.is_polling(id)));
        assert_eq!(labels(&log), vec!["error", "close"]);
        assert_eq!(
            log.borrow()[1].1,
            SocketEvent::Close { code: CLOSE_ABNORMAL, reason: String::new() }
        );
        assert_eq!(bridge.ready_state(id), ReadyState::Closed);
    }

    #[test]
    fn test_loopback_echo_server() {
        use tokio_tungstenite::tungstenite::{accept, Message};

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut ws = accept(stream).unwrap();
            loop {
                match ws.read() {
                    Ok(Message::Text(text)) => ws.send(Message::Text(format!("echo: {text}"))).unwrap(),
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
        });

        let (host, bridge, log) = setup(Arc::new(WsConnector));
        let id = bridge.open(&format!("ws://127.0.0.1:{port}")).unwrap();
        register_all(&bridge, id);

        assert!(host.run_until(TIMEOUT, || bridge.ready_state(id) == ReadyState::Open));
        bridge.send(id, "ping".into()).unwrap();
        assert!(host.run_until(TIMEOUT, || log.borrow().len() >= 2));
        assert_eq!(log.borrow()[1].1, SocketEvent::Message("echo: ping".into()));

        bridge.close(id, CLOSE_NORMAL, "bye".into());
        assert!(host.run_until(TIMEOUT, || bridge.ready_state(id) == ReadyState::Closed));
        assert_eq!(labels(&log), vec!["open", "message", "close"]);
        let (_, close) = &log.borrow()[2];
        assert!(matches!(close, SocketEvent::Close { code: CLOSE_NORMAL, .. }));
        server.join().unwrap();
    }
}
