//! Hostbridge Runtime
//!
//! Boots a script host against an in-memory scene, loads the bundle and
//! drives the host loop.

mod cli;

use anyhow::{Context, Result};
use bridge_command::DispatchOptions;
use bridge_core::{HostLoop, SystemClock};
use bridge_net::WsConnector;
use bridge_scene::MemoryScene;
use bridge_script::{lifecycle, HostConfig, ScriptHost};
use bridge_services::{logging, Settings};
use cli::CliOverrides;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

/// Chunk length when running until idle.
const IDLE_SLICE: Duration = Duration::from_secs(60);

/// Layer file settings over the library defaults.
fn apply_settings(mut config: HostConfig, settings: &Settings) -> HostConfig {
    config.connector = Arc::new(WsConnector);
    config.dispatch = DispatchOptions {
        strict_socket_lookup: settings.commands.strict_socket_lookup,
    };
    config.memory_limit = settings.script.memory_limit_bytes;
    if let Some(interval) = settings.frame_interval() {
        config.frame_interval = interval;
    }
    config.poll_interval = settings.poll_interval();
    config
}

fn main() -> Result<()> {
    let overrides = CliOverrides::parse_from_env()?;
    let mut settings = match &overrides.config {
        Some(path) => Settings::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => Settings::default(),
    };
    if let Some(bundle) = &overrides.bundle {
        settings.script.bundle = bundle.clone();
    }
    if let Some(level) = &overrides.log_level {
        settings.log_level = level.clone();
    }

    logging::init(logging::parse_level(&settings.log_level)?);
    tracing::info!("Hostbridge v{}", bridge_core::VERSION);

    let clock = Rc::new(SystemClock::new());
    let host_loop = Rc::new(HostLoop::new(clock.clone()));
    let scene = Rc::new(RefCell::new(MemoryScene::new()));

    let factory = {
        let settings = settings.clone();
        let host_loop = host_loop.clone();
        let scene = scene.clone();
        Box::new(move || {
            let config = HostConfig::new(host_loop.clone(), clock.clone(), scene.clone());
            ScriptHost::new(apply_settings(config, &settings))
        })
    };

    // Without a bundle on disk, --eval alone is enough to run
    let bundle = settings.bundle_path();
    let bundle = (bundle.is_file() || overrides.eval.is_empty()).then_some(bundle);
    lifecycle::install(factory, bundle).context("installing script runtime")?;
    let host = lifecycle::bootstrap().context("bootstrapping script runtime")?;

    for source in &overrides.eval {
        let value = host.evaluate(source).context("evaluating --eval source")?;
        if !value.is_null() {
            println!("{value}");
        }
    }

    match overrides.run_ms {
        Some(ms) => host_loop.run_for(Duration::from_millis(ms)),
        None => while !host_loop.run_until_idle(IDLE_SLICE) {},
    }

    if let Some(target) = &overrides.dump_scene {
        let dump = format!("{:#}", scene.borrow().to_json());
        if target == "-" {
            println!("{dump}");
        } else {
            std::fs::write(target, dump).with_context(|| format!("writing scene to {target}"))?;
        }
    }

    lifecycle::teardown()?;
    tracing::info!(objects = scene.borrow().object_count(), "runtime finished");
    Ok(())
}
