//! Runtime lifecycle
//!
//! At most one [`ScriptHost`] is live at a time. [`RuntimeState`] holds it
//! together with the factory that builds replacements; the free functions
//! below operate on the process-wide instance, which belongs to the first
//! thread that touches it.

use crate::error::HostError;
use crate::host::ScriptHost;
use once_cell::sync::OnceCell;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::thread::ThreadId;

/// Builds a fresh host. Called on first use and on every reload.
pub type HostFactory = Box<dyn Fn() -> Result<ScriptHost, HostError>>;

#[derive(Default)]
struct Slot {
    factory: Option<HostFactory>,
    bundle: Option<PathBuf>,
    host: Option<Rc<ScriptHost>>,
}

/// Holder of the live host.
#[derive(Default)]
pub struct RuntimeState {
    slot: RefCell<Slot>,
}

impl RuntimeState {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> Result<std::cell::RefMut<'_, Slot>, HostError> {
        self.slot.try_borrow_mut().map_err(|_| HostError::Reentrant)
    }

    /// Configure how hosts are built and which bundle `bootstrap`/`reload`
    /// load. The current host, if any, is left alone.
    pub fn install(&self, factory: HostFactory, bundle: Option<PathBuf>) -> Result<(), HostError> {
        let mut slot = self.slot()?;
        slot.factory = Some(factory);
        slot.bundle = bundle;
        Ok(())
    }

    /// The live host, if one exists.
    pub fn current(&self) -> Result<Option<Rc<ScriptHost>>, HostError> {
        Ok(self.slot()?.host.clone())
    }

    /// Return the live host, building one if needed. A failed build leaves
    /// nothing installed, so a later call retries.
    pub fn get_or_create(&self) -> Result<Rc<ScriptHost>, HostError> {
        let mut slot = self.slot()?;
        if let Some(host) = &slot.host {
            return Ok(Rc::clone(host));
        }
        let host = Rc::new(Self::build(&slot)?);
        slot.host = Some(Rc::clone(&host));
        Ok(host)
    }

    /// Create the host if needed, then evaluate the bundle.
    pub fn bootstrap(&self) -> Result<Rc<ScriptHost>, HostError> {
        let host = self.get_or_create()?;
        self.load_bundle(&host)?;
        Ok(host)
    }

    /// Abandon the live host, build a new one and load the bundle into it.
    /// If the bundle fails the new host stays installed.
    pub fn reload(&self) -> Result<Rc<ScriptHost>, HostError> {
        let host = {
            let mut slot = self.slot()?;
            if let Some(old) = slot.host.take() {
                old.abandon();
            }
            let host = Rc::new(Self::build(&slot)?);
            slot.host = Some(Rc::clone(&host));
            host
        };
        tracing::info!("script runtime reloaded");
        self.load_bundle(&host)?;
        Ok(host)
    }

    /// Abandon and drop the live host.
    pub fn teardown(&self) -> Result<(), HostError> {
        let old = self.slot()?.host.take();
        if let Some(old) = old {
            old.abandon();
            tracing::info!("script runtime torn down");
        }
        Ok(())
    }

    fn build(slot: &Slot) -> Result<ScriptHost, HostError> {
        let factory = slot
            .factory
            .as_ref()
            .ok_or_else(|| HostError::Bootstrap("no host factory installed".to_string()))?;
        factory().inspect_err(|err| tracing::error!(error = %err, "script host bootstrap failed"))
    }

    fn load_bundle(&self, host: &ScriptHost) -> Result<(), HostError> {
        let bundle = self.slot()?.bundle.clone();
        if let Some(path) = bundle {
            host.load_and_evaluate(&path)?;
        }
        Ok(())
    }
}

thread_local! {
    static RUNTIME: RuntimeState = RuntimeState::new();
}

static HOST_THREAD: OnceCell<ThreadId> = OnceCell::new();

/// Run `f` against the process-wide runtime. Only the first thread to call
/// this may use it.
pub fn with_runtime<R>(f: impl FnOnce(&RuntimeState) -> Result<R, HostError>) -> Result<R, HostError> {
    let current = std::thread::current().id();
    if *HOST_THREAD.get_or_init(|| current) != current {
        return Err(HostError::WrongThread);
    }
    RUNTIME.with(f)
}

pub fn install(factory: HostFactory, bundle: Option<PathBuf>) -> Result<(), HostError> {
    with_runtime(|runtime| runtime.install(factory, bundle))
}

pub fn get_or_create() -> Result<Rc<ScriptHost>, HostError> {
    with_runtime(RuntimeState::get_or_create)
}

pub fn bootstrap() -> Result<Rc<ScriptHost>, HostError> {
    with_runtime(RuntimeState::bootstrap)
}

pub fn reload() -> Result<Rc<ScriptHost>, HostError> {
    with_runtime(RuntimeState::reload)
}

pub fn teardown() -> Result<(), HostError> {
    with_runtime(RuntimeState::teardown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostConfig;
    use bridge_core::{HostLoop, ManualClock};
    use bridge_scene::MemoryScene;
    use serde_json::json;
    use std::cell::Cell;
    use std::io::Write;
    use std::time::Duration;

    struct Env {
        clock: Rc<ManualClock>,
        host_loop: Rc<HostLoop>,
    }

    fn env() -> Env {
        let clock = Rc::new(ManualClock::new());
        let host_loop = Rc::new(HostLoop::new(clock.clone()));
        Env { clock, host_loop }
    }

    fn factory(env: &Env) -> HostFactory {
        let clock = env.clock.clone();
        let host_loop = env.host_loop.clone();
        Box::new(move || {
            let scene = Rc::new(RefCell::new(MemoryScene::new()));
            ScriptHost::new(HostConfig::new(host_loop.clone(), clock.clone(), scene))
        })
    }

    fn bundle(source: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{source}").unwrap();
        file
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let env = env();
        let state = RuntimeState::new();
        state.install(factory(&env), None).unwrap();
        assert!(state.current().unwrap().is_none());

        let first = state.get_or_create().unwrap();
        let second = state.get_or_create().unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_missing_factory_is_bootstrap_error() {
        let state = RuntimeState::new();
        assert!(matches!(state.get_or_create(), Err(HostError::Bootstrap(_))));
    }

    #[test]
    fn test_failed_build_installs_nothing_and_retries() {
        let env = env();
        let attempts = Rc::new(Cell::new(0));
        let counter = attempts.clone();
        let inner = factory(&env);
        let state = RuntimeState::new();
        state
            .install(
                Box::new(move || {
                    counter.set(counter.get() + 1);
                    if counter.get() == 1 {
                        Err(HostError::Bootstrap("engine unavailable".into()))
                    } else {
                        inner()
                    }
                }),
                None,
            )
            .unwrap();

        assert!(matches!(state.get_or_create(), Err(HostError::Bootstrap(_))));
        assert!(state.current().unwrap().is_none());
        assert!(state.get_or_create().is_ok());
        assert_eq!(attempts.get(), 2);
    }

    #[test]
    fn test_bootstrap_loads_bundle() {
        let env = env();
        let file = bundle("globalThis.booted = 'yes';");
        let state = RuntimeState::new();
        state.install(factory(&env), Some(file.path().to_path_buf())).unwrap();
        let host = state.bootstrap().unwrap();
        assert_eq!(host.evaluate("booted").unwrap(), json!("yes"));
    }

    #[test]
    fn test_reload_abandons_previous_timers() {
        let env = env();
        let file = bundle("globalThis.ticks = 0; setInterval(() => { ticks++; }, 10);");
        let state = RuntimeState::new();
        state.install(factory(&env), Some(file.path().to_path_buf())).unwrap();

        let old = state.bootstrap().unwrap();
        env.clock.advance(Duration::from_millis(25));
        env.host_loop.tick();
        let fresh = state.reload().unwrap();
        assert!(old.is_abandoned());
        assert!(!Rc::ptr_eq(&old, &fresh));

        for _ in 0..10 {
            env.clock.advance_ms(10);
            env.host_loop.tick();
        }
        // Only the new interval keeps counting; the old context never runs again
        assert_eq!(old.evaluate("ticks").unwrap(), json!(2));
        assert_eq!(fresh.evaluate("ticks").unwrap(), json!(10));
    }

    #[test]
    fn test_reload_with_broken_bundle_keeps_new_host() {
        let env = env();
        let file = bundle("throw new Error('bad bundle');");
        let state = RuntimeState::new();
        state.install(factory(&env), Some(file.path().to_path_buf())).unwrap();
        let old = state.get_or_create().unwrap();

        assert!(matches!(state.reload(), Err(HostError::Script(_))));
        let current = state.current().unwrap().unwrap();
        assert!(!Rc::ptr_eq(&old, &current));
        assert!(old.is_abandoned());
    }

    #[test]
    fn test_missing_bundle_reported() {
        let env = env();
        let dir = tempfile::tempdir().unwrap();
        let state = RuntimeState::new();
        state.install(factory(&env), Some(dir.path().join("bundle.js"))).unwrap();
        assert!(matches!(state.bootstrap(), Err(HostError::BundleNotFound(_))));
        assert!(state.current().unwrap().is_some());
    }

    #[test]
    fn test_teardown_abandons_host() {
        let env = env();
        let state = RuntimeState::new();
        state.install(factory(&env), None).unwrap();
        let host = state.get_or_create().unwrap();
        host.evaluate("setTimeout(() => {}, 100)").unwrap();

        state.teardown().unwrap();
        assert!(host.is_abandoned());
        assert!(state.current().unwrap().is_none());
        assert!(!env.host_loop.has_timed_tasks());
        state.teardown().unwrap();
    }

    #[test]
    fn test_reentrant_creation_rejected() {
        let env = env();
        let state = Rc::new(RuntimeState::new());
        let weak = Rc::downgrade(&state);
        let inner = factory(&env);
        let observed = Rc::new(Cell::new(false));
        let seen = observed.clone();
        state
            .install(
                Box::new(move || {
                    if let Some(state) = weak.upgrade() {
                        seen.set(matches!(state.get_or_create(), Err(HostError::Reentrant)));
                    }
                    inner()
                }),
                None,
            )
            .unwrap();

        state.get_or_create().unwrap();
        assert!(observed.get());
    }

    #[test]
    fn test_global_runtime_is_bound_to_first_thread() {
        // The only test touching the process-wide instance
        teardown().unwrap();
        let other = std::thread::spawn(|| matches!(teardown(), Err(HostError::WrongThread)));
        assert!(other.join().unwrap());
    }
}
