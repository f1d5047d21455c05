//! Script host
//!
//! Owns the engine and every subsystem that holds script callbacks. The
//! subsystems reach the engine only through a `Weak`, so once the host is
//! dropped any callback still queued on the scheduler does nothing.

use crate::bindings;
use crate::callback::{caught, invoke, Engine, ScriptCallback};
use crate::convert::js_to_json;
use crate::error::HostError;
use crate::polyfill::PRELUDE;
use bridge_command::{CommandDispatcher, DispatchOptions};
use bridge_core::{ClockHandle, FrameScheduler, SchedulerHandle, TaskId, Timers};
use bridge_net::{Connector, SocketBridge, SocketEvent, WsConnector, DEFAULT_POLL_INTERVAL};
use bridge_scene::SceneHandle;
use rquickjs::Value;
use std::cell::Cell;
use std::path::Path;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::time::Duration;

/// Everything a host needs from its embedder.
pub struct HostConfig {
    pub scheduler: SchedulerHandle,
    pub clock: ClockHandle,
    pub scene: SceneHandle,
    pub connector: Arc<dyn Connector>,
    pub dispatch: DispatchOptions,
    /// QuickJS heap limit in bytes; 0 means unlimited.
    pub memory_limit: usize,
    pub frame_interval: Duration,
    pub poll_interval: Duration,
}

impl HostConfig {
    pub fn new(scheduler: SchedulerHandle, clock: ClockHandle, scene: SceneHandle) -> Self {
        Self {
            scheduler,
            clock,
            scene,
            connector: Arc::new(WsConnector),
            dispatch: DispatchOptions::default(),
            memory_limit: 0,
            frame_interval: bridge_core::clock::FRAME_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = connector;
        self
    }
}

/// Subsystems reachable from the native bindings.
pub struct HostServices {
    pub timers: Timers<ScriptCallback>,
    pub frames: FrameScheduler<ScriptCallback>,
    pub sockets: SocketBridge<ScriptCallback>,
    pub dispatcher: CommandDispatcher,
    pub clock: ClockHandle,
}

impl HostServices {
    fn new(config: &HostConfig, engine: &Rc<Engine>) -> Self {
        let weak = Rc::downgrade(engine);
        let timer_engine = Weak::clone(&weak);
        let frame_engine = Weak::clone(&weak);
        let socket_engine = weak;

        let timers = Timers::new(
            Rc::clone(&config.scheduler),
            Rc::new(move |callback: &ScriptCallback| {
                invoke(&timer_engine, callback, |func| func.call::<_, ()>(()))
            }),
        );
        let frames = FrameScheduler::with_interval(
            Rc::clone(&config.scheduler),
            Rc::clone(&config.clock),
            Rc::new(move |callback: &ScriptCallback, timestamp: f64| {
                invoke(&frame_engine, callback, |func| func.call::<_, ()>((timestamp,)))
            }),
            config.frame_interval,
        );
        let sockets = SocketBridge::with_poll_interval(
            Rc::clone(&config.scheduler),
            Arc::clone(&config.connector),
            Rc::new(move |callback: &ScriptCallback, event: &SocketEvent| {
                invoke(&socket_engine, callback, |func| match event {
                    SocketEvent::Open => func.call::<_, ()>(()),
                    SocketEvent::Message(data) => func.call::<_, ()>((data.as_str(),)),
                    SocketEvent::Error(err) => func.call::<_, ()>((err.to_string(),)),
                    SocketEvent::Close { code, reason } => {
                        func.call::<_, ()>((i32::from(*code), reason.as_str()))
                    }
                })
            }),
            config.poll_interval,
        );

        Self {
            timers,
            frames,
            sockets,
            dispatcher: CommandDispatcher::with_options(Rc::clone(&config.scene), config.dispatch),
            clock: Rc::clone(&config.clock),
        }
    }

    /// Cancel everything that holds a script callback.
    fn abandon(&self) {
        self.timers.abandon();
        self.frames.abandon();
        self.sockets.abandon();
    }
}

/// One live execution context with its bindings and prelude installed.
pub struct ScriptHost {
    services: Rc<HostServices>,
    engine: Rc<Engine>,
    scheduler: SchedulerHandle,
    microtasks: TaskId,
    abandoned: Cell<bool>,
}

impl ScriptHost {
    pub fn new(config: HostConfig) -> Result<Self, HostError> {
        let engine = Rc::new(Engine::new(config.memory_limit).map_err(HostError::bootstrap)?);
        let services = Rc::new(HostServices::new(&config, &engine));

        engine.context.with(|ctx| {
            bindings::install(&ctx, &services).map_err(|err| HostError::bootstrap(caught(&ctx, err)))?;
            for (name, source) in PRELUDE {
                ctx.eval::<(), _>(source).map_err(|err| {
                    HostError::Bootstrap(format!("prelude {name}: {}", caught(&ctx, err)))
                })?;
            }
            Ok::<_, HostError>(())
        })?;

        let weak = Rc::downgrade(&engine);
        let microtasks = config.scheduler.every_tick(Box::new(move || match weak.upgrade() {
            Some(engine) => {
                engine.drain_microtasks();
                true
            }
            None => false,
        }));

        tracing::info!(memory_limit = config.memory_limit, "script host ready");
        Ok(Self {
            services,
            engine,
            scheduler: config.scheduler,
            microtasks,
            abandoned: Cell::new(false),
        })
    }

    /// Evaluate `source` as a global script and return its completion value
    /// as JSON. Microtasks queued by the script run before this returns.
    pub fn evaluate(&self, source: &str) -> Result<serde_json::Value, HostError> {
        let result = self.engine.context.with(|ctx| {
            ctx.eval::<Value, _>(source)
                .and_then(js_to_json)
                .map_err(|err| HostError::Script(caught(&ctx, err)))
        });
        self.engine.drain_microtasks();
        if let Err(err) = &result {
            tracing::warn!(error = %err, "script evaluation failed");
        }
        result
    }

    /// Read and evaluate a bundle file.
    pub fn load_and_evaluate(&self, path: &Path) -> Result<serde_json::Value, HostError> {
        if !path.is_file() {
            return Err(HostError::BundleNotFound(path.to_path_buf()));
        }
        let source = std::fs::read_to_string(path).map_err(|source| HostError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), bytes = source.len(), "loading bundle");
        self.evaluate(&source)
    }

    /// Run pending promise jobs now instead of waiting for the next tick.
    pub fn run_microtasks(&self) -> usize {
        self.engine.drain_microtasks()
    }

    pub fn services(&self) -> &HostServices {
        &self.services
    }

    pub fn pending_timers(&self) -> usize {
        self.services.timers.len()
    }

    pub fn pending_frames(&self) -> usize {
        self.services.frames.pending()
    }

    pub fn socket_count(&self) -> usize {
        self.services.sockets.len()
    }

    /// Cancel timers, frames, socket polling and the microtask drain without
    /// any graceful shutdown. Socket threads keep running; their pushes are
    /// dropped. Idempotent.
    pub fn abandon(&self) {
        if self.abandoned.replace(true) {
            return;
        }
        self.services.abandon();
        self.scheduler.cancel(self.microtasks);
        tracing::debug!("script host abandoned");
    }

    pub fn is_abandoned(&self) -> bool {
        self.abandoned.get()
    }
}

impl Drop for ScriptHost {
    fn drop(&mut self) {
        // Persistent callbacks must be released while the runtime is alive
        self.abandon();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_core::{HostLoop, ManualClock, SystemClock};
    use bridge_net::{SocketLink, TransportError};
    use bridge_scene::{MemoryScene, SceneGraph};
    use serde_json::json;
    use std::cell::RefCell;
    use std::io::Write;

    const TIMEOUT: Duration = Duration::from_secs(5);

    struct Fixture {
        host: ScriptHost,
        scene: Rc<RefCell<MemoryScene>>,
        clock: Rc<ManualClock>,
        host_loop: Rc<HostLoop>,
    }

    /// Emits a fixed event list and returns.
    struct Scripted(Vec<SocketEvent>);

    impl Connector for Scripted {
        fn run(&self, _url: &str, link: &mut SocketLink) {
            for event in &self.0 {
                link.events.emit(event.clone());
            }
        }
    }

    fn fixture_with(connector: Arc<dyn Connector>) -> Fixture {
        let clock = Rc::new(ManualClock::new());
        let host_loop = Rc::new(HostLoop::new(clock.clone()));
        let scene = Rc::new(RefCell::new(MemoryScene::new()));
        let config = HostConfig::new(host_loop.clone(), clock.clone(), scene.clone()).with_connector(connector);
        let host = ScriptHost::new(config).unwrap();
        Fixture {
            host,
            scene,
            clock,
            host_loop,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(Scripted(Vec::new())))
    }

    impl Fixture {
        fn advance(&self, ms: u64) {
            for _ in 0..ms {
                self.clock.advance_ms(1);
                self.host_loop.tick();
            }
        }
    }

    #[test]
    fn test_evaluate_returns_json() {
        let f = fixture();
        assert_eq!(f.host.evaluate("1 + 2").unwrap(), json!(3));
        assert_eq!(f.host.evaluate("({a: [1, 'x']})").unwrap(), json!({"a": [1, "x"]}));
        assert_eq!(f.host.evaluate("undefined").unwrap(), json!(null));
    }

    #[test]
    fn test_evaluate_reports_exception() {
        let f = fixture();
        let err = f.host.evaluate("null.boom").unwrap_err();
        match err {
            HostError::Script(err) => assert!(err.message.starts_with("TypeError"), "{}", err.message),
            other => panic!("unexpected {other:?}"),
        }
        let err = f.host.evaluate("let x = ;").unwrap_err();
        assert!(matches!(err, HostError::Script(ref e) if e.message.starts_with("SyntaxError")));
    }

    #[test]
    fn test_microtasks_drained_after_evaluate() {
        let f = fixture();
        f.host
            .evaluate("globalThis.order = []; queueMicrotask(() => order.push('micro')); Promise.resolve().then(() => order.push('promise')); order.push('sync');")
            .unwrap();
        assert_eq!(f.host.evaluate("order").unwrap(), json!(["sync", "micro", "promise"]));
    }

    #[test]
    fn test_prelude_globals() {
        let f = fixture();
        let kinds = f
            .host
            .evaluate("[typeof console.log, typeof console.info, typeof queueMicrotask, WebSocket.OPEN, WebSocket.CLOSED, typeof print, typeof inspect, typeof getTime]")
            .unwrap();
        assert_eq!(kinds, json!(["function", "function", "function", 1, 3, "function", "function", "function"]));
        f.host.evaluate("console.log('hello', {a: 1}, new Error('shown'))").unwrap();
        assert_eq!(f.host.evaluate("inspect({b: 2})").unwrap(), json!({"b": 2}));
        f.host.evaluate("print('x', [1, 2])").unwrap();
    }

    #[test]
    fn test_apply_command_text_and_object() {
        let f = fixture();
        let text = f
            .host
            .evaluate(r#"applyCommand('{"type":"create_primitive","shape":"cube","name":"Box1","location":[1,2,3]}')"#)
            .unwrap();
        let reply: serde_json::Value = serde_json::from_str(text.as_str().unwrap()).unwrap();
        assert_eq!(reply, json!({"name": "Box1", "location": [1.0, 2.0, 3.0]}));

        let object = f
            .host
            .evaluate(r#"applyCommand({type: "create_primitive", shape: "cube", name: "Box1"})"#)
            .unwrap();
        assert_eq!(object["name"], json!("Box1.001"));
        assert_eq!(f.scene.borrow().object_count(), 2);
    }

    #[test]
    fn test_cyclic_values_do_not_abort() {
        let f = fixture();
        assert_eq!(
            f.host.evaluate("const a = {}; a.self = a; a").unwrap(),
            json!({"self": "[Circular]"})
        );
        assert_eq!(f.host.evaluate("const b = {}; b.me = b; print(b); 1").unwrap(), json!(1));
        assert_eq!(
            f.host.evaluate("const c = [0]; c.push(c); inspect(c)").unwrap(),
            json!([0, "[Circular]"])
        );

        let reply = f
            .host
            .evaluate(r#"const cmd = {type: "create_primitive", shape: "cube", name: "Loop"}; cmd.me = cmd; applyCommand(cmd)"#)
            .unwrap();
        assert_eq!(reply["name"], json!("Loop"));
        assert_eq!(f.scene.borrow().object_count(), 1);
    }

    #[test]
    fn test_apply_command_error_is_thrown() {
        let f = fixture();
        let caught = f
            .host
            .evaluate(
                r#"try { applyCommand({type: "set_transform", name: "Missing", location: [0, 0, 0]}); 'no error' }
                   catch (e) { [e instanceof Error, e.name, e.message] }"#,
            )
            .unwrap();
        assert_eq!(caught[0], json!(true));
        assert_eq!(caught[1], json!("EntityNotFound"));
        assert!(caught[2].as_str().unwrap().contains("Missing"));
    }

    #[test]
    fn test_timers_fire_and_clear() {
        let f = fixture();
        f.host
            .evaluate(
                "globalThis.hits = 0; globalThis.once = 0;
                 globalThis.interval = setInterval(() => { hits++; }, 50);
                 setTimeout(() => { once++; }, 20);
                 clearTimeout(undefined); clearTimeout(9999);",
            )
            .unwrap();
        f.advance(200);
        assert_eq!(f.host.evaluate("[hits, once]").unwrap(), json!([4, 1]));

        f.host.evaluate("clearInterval(interval)").unwrap();
        f.advance(200);
        assert_eq!(f.host.evaluate("hits").unwrap(), json!(4));
        assert_eq!(f.host.pending_timers(), 0);
    }

    #[test]
    fn test_throwing_interval_stops() {
        let f = fixture();
        f.host
            .evaluate("globalThis.calls = 0; setInterval(() => { calls++; throw new Error('boom'); }, 10);")
            .unwrap();
        f.advance(100);
        assert_eq!(f.host.evaluate("calls").unwrap(), json!(1));
        assert_eq!(f.host.pending_timers(), 0);
    }

    #[test]
    fn test_animation_frames() {
        let f = fixture();
        f.host
            .evaluate(
                "globalThis.stamps = [];
                 requestAnimationFrame(t => stamps.push(['a', t]));
                 requestAnimationFrame(t => stamps.push(['b', t]));
                 const dropped = requestAnimationFrame(() => stamps.push(['never']));
                 cancelAnimationFrame(dropped);",
            )
            .unwrap();
        assert_eq!(f.host.pending_frames(), 2);
        f.advance(40);
        let stamps = f.host.evaluate("stamps").unwrap();
        let stamps = stamps.as_array().unwrap();
        assert_eq!(stamps.len(), 2);
        assert_eq!(stamps[0][1], stamps[1][1]);
        assert_eq!(f.host.pending_frames(), 0);
    }

    #[test]
    fn test_get_time_tracks_clock() {
        let f = fixture();
        let before = f.host.evaluate("getTime()").unwrap().as_f64().unwrap();
        f.clock.advance_ms(250);
        let after = f.host.evaluate("getTime()").unwrap().as_f64().unwrap();
        assert_eq!(after - before, 250.0);
    }

    #[test]
    fn test_websocket_events_reach_handlers() {
        let f = fixture_with(Arc::new(Scripted(vec![
            SocketEvent::Open,
            SocketEvent::Message("hi".into()),
            SocketEvent::Error(TransportError::Io("reset".into())),
            SocketEvent::Close { code: 1011, reason: "gone".into() },
        ])));
        f.host
            .evaluate(
                "globalThis.seen = [];
                 globalThis.ws = new WebSocket('ws://scripted');
                 ws.onopen = e => seen.push([e.type, ws.readyState]);
                 ws.onmessage = e => seen.push([e.type, e.data]);
                 ws.onerror = e => seen.push([e.type, e.error]);
                 ws.onclose = e => seen.push([e.type, e.code, e.reason, ws.readyState]);
                 ws.readyState",
            )
            .unwrap();

        // Poller runs on the scheduler, so drive real time through the manual clock
        let deadline = std::time::Instant::now() + TIMEOUT;
        while f.host.evaluate("seen.length").unwrap() != json!(4) && std::time::Instant::now() < deadline {
            f.advance(10);
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(
            f.host.evaluate("seen").unwrap(),
            json!([
                ["open", 1],
                ["message", "hi"],
                ["error", "connection lost: reset"],
                ["close", 1011, "gone", 3]
            ])
        );
    }

    #[test]
    fn test_websocket_send_on_unknown_socket_throws() {
        let f = fixture();
        let name = f.host.evaluate("try { __ws_send(77, 'x'); 'ok' } catch (e) { e.name }").unwrap();
        assert_eq!(name, json!("SocketError"));
        assert_eq!(f.host.evaluate("__ws_get_ready_state(77)").unwrap(), json!(3));
        f.host.evaluate("__ws_close(77)").unwrap();
    }

    #[test]
    fn test_websocket_close_code_is_validated() {
        let f = fixture();
        let outcomes = f
            .host
            .evaluate(
                "[undefined, 1000, 3000, 4999, 1001, 2999, 5000, 70000, -1, 3000.5, NaN, Infinity, 'x'].map(code => {
                   try { __ws_close(77, code, ''); return 'ok'; } catch (e) { return e.name; }
                 })",
            )
            .unwrap();
        let ok = json!("ok");
        let bad = json!("SocketError");
        assert_eq!(
            outcomes,
            json!([ok, ok, ok, ok, bad, bad, bad, bad, bad, bad, bad, bad, bad])
        );
        let thrown = f.host.evaluate("try { new WebSocket('ws://scripted').close(65536); 'ok' } catch (e) { e.name }");
        assert_eq!(thrown.unwrap(), bad);
    }

    #[test]
    fn test_unreachable_websocket_end_to_end() {
        let clock = Rc::new(SystemClock::new());
        let host_loop = Rc::new(HostLoop::new(clock.clone()));
        let scene = Rc::new(RefCell::new(MemoryScene::new()));
        let host = ScriptHost::new(HostConfig::new(host_loop.clone(), clock, scene)).unwrap();
        host.evaluate(
            "globalThis.events = [];
             globalThis.ws = new WebSocket('ws://127.0.0.1:1');
             ws.onerror = () => events.push('error');
             ws.onclose = e => events.push('close:' + e.code);",
        )
        .unwrap();

        let done = host_loop.run_until(TIMEOUT, || host.evaluate("events.length").ok() == Some(json!(2)));
        assert!(done);
        assert_eq!(host.evaluate("events").unwrap(), json!(["error", "close:1006"]));
        assert_eq!(host.evaluate("ws.readyState").unwrap(), json!(3));
    }

    #[test]
    fn test_load_bundle() {
        let f = fixture();
        let mut bundle = tempfile::NamedTempFile::new().unwrap();
        writeln!(bundle, "globalThis.loaded = true; 'bundle done'").unwrap();
        assert_eq!(f.host.load_and_evaluate(bundle.path()).unwrap(), json!("bundle done"));
        assert_eq!(f.host.evaluate("loaded").unwrap(), json!(true));

        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.js");
        assert!(matches!(f.host.load_and_evaluate(&missing), Err(HostError::BundleNotFound(p)) if p == missing));
    }

    #[test]
    fn test_abandon_cancels_callbacks() {
        let f = fixture();
        f.host
            .evaluate("globalThis.fired = 0; setInterval(() => fired++, 10); requestAnimationFrame(() => fired++);")
            .unwrap();
        f.host.abandon();
        assert!(f.host.is_abandoned());
        f.advance(100);
        assert_eq!(f.host.evaluate("fired").unwrap(), json!(0));
        assert!(!f.host_loop.has_timed_tasks());
        f.host.abandon();
    }

    #[test]
    fn test_dropped_host_leaves_no_tasks() {
        let f = fixture();
        f.host.evaluate("setInterval(() => {}, 5); requestAnimationFrame(() => {});").unwrap();
        let Fixture {
            host, host_loop, clock, ..
        } = f;
        drop(host);
        clock.advance_ms(100);
        host_loop.tick();
        assert!(!host_loop.has_timed_tasks());
    }

    #[test]
    fn test_memory_limit_is_enforced() {
        let clock = Rc::new(ManualClock::new());
        let host_loop = Rc::new(HostLoop::new(clock.clone()));
        let scene: Rc<RefCell<MemoryScene>> = Rc::new(RefCell::new(MemoryScene::new()));
        let mut config = HostConfig::new(host_loop, clock, scene);
        config.memory_limit = 8 * 1024 * 1024;
        let host = ScriptHost::new(config).unwrap();
        let err = host.evaluate("const big = []; while (true) big.push('x'.repeat(1024));");
        assert!(matches!(err, Err(HostError::Script(_))));
    }

    #[test]
    fn test_scene_visible_through_handle() {
        let f = fixture();
        f.host
            .evaluate(r#"applyCommand({type: "create_camera", name: "Cam"})"#)
            .unwrap();
        assert!(f.scene.borrow().object("Cam").is_some());
    }
}
