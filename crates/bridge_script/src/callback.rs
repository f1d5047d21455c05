//! Script callback invocation
//!
//! Timer, frame and socket callbacks all go through [`invoke`]: restore the
//! persisted function, call it, drain microtasks, and turn a thrown value
//! into a [`CallbackError`]. A callback whose engine is gone is a no-op.

use crate::convert::display_value;
use bridge_core::CallbackError;
use rquickjs::{Context, Ctx, Exception, Function, Persistent, Runtime};
use std::rc::{Rc, Weak};

/// A script function kept alive across host-loop ticks.
pub type ScriptCallback = Rc<Persistent<Function<'static>>>;

/// The QuickJS runtime and its single execution context.
pub struct Engine {
    pub(crate) context: Context,
    pub(crate) runtime: Runtime,
}

impl Engine {
    pub fn new(memory_limit: usize) -> rquickjs::Result<Self> {
        let runtime = Runtime::new()?;
        if memory_limit > 0 {
            runtime.set_memory_limit(memory_limit);
        }
        let context = Context::full(&runtime)?;
        Ok(Self { context, runtime })
    }

    /// Run queued promise jobs until none are left. Must not be called from
    /// inside `context.with`.
    pub fn drain_microtasks(&self) -> usize {
        let mut ran = 0;
        loop {
            match self.runtime.execute_pending_job() {
                Ok(true) => ran += 1,
                Ok(false) => break,
                Err(failed) => {
                    ran += 1;
                    let err = job_error(&failed.0);
                    tracing::warn!(target: "js", error = %err, stack = err.stack.as_deref().unwrap_or(""), "unhandled exception in microtask");
                }
            }
        }
        ran
    }
}

/// Take the exception a failed promise job left on its context.
fn job_error(context: &Context) -> CallbackError {
    context.with(|ctx| caught(&ctx, rquickjs::Error::Exception))
}

/// Persist `func` so it can be called from a later tick.
pub fn persist<'js>(ctx: &Ctx<'js>, func: Function<'js>) -> ScriptCallback {
    Rc::new(Persistent::save(ctx, func))
}

/// Call `callback` on `engine` with whatever arguments `call` supplies.
pub fn invoke<F>(engine: &Weak<Engine>, callback: &ScriptCallback, call: F) -> Result<(), CallbackError>
where
    F: for<'js> FnOnce(Function<'js>) -> rquickjs::Result<()>,
{
    let Some(engine) = engine.upgrade() else {
        return Ok(());
    };
    let result = engine.context.with(|ctx| {
        let func = Persistent::clone(callback).restore(&ctx).map_err(|err| caught(&ctx, err))?;
        call(func).map_err(|err| caught(&ctx, err))
    });
    engine.drain_microtasks();
    result
}

/// Convert an engine error into a `CallbackError`, taking the pending
/// exception off the context if there is one.
pub fn caught(ctx: &Ctx<'_>, err: rquickjs::Error) -> CallbackError {
    if !matches!(err, rquickjs::Error::Exception) {
        return CallbackError::new(err.to_string());
    }
    let thrown = ctx.catch();
    let exception = thrown.clone().into_object().and_then(Exception::from_object);
    match exception {
        Some(exception) => {
            let name: Option<String> = exception.as_object().get("name").ok().flatten();
            let message = exception.message().unwrap_or_default();
            let message = match name {
                Some(name) if !name.is_empty() => format!("{name}: {message}"),
                _ => message,
            };
            let error = CallbackError::new(message);
            match exception.stack() {
                Some(stack) => error.with_stack(stack),
                None => error,
            }
        }
        None => CallbackError::new(format!("uncaught {}", display_value(thrown))),
    }
}

/// Build a JS `Error` with the given `name` and throw it.
pub fn throw_error(ctx: &Ctx<'_>, name: &str, message: &str) -> rquickjs::Error {
    let exception = match Exception::from_message(ctx.clone(), message) {
        Ok(exception) => exception,
        Err(err) => return err,
    };
    let object = exception.into_object();
    if let Err(err) = object.set("name", name) {
        return err;
    }
    ctx.throw(object.into_value())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> Rc<Engine> {
        Rc::new(Engine::new(0).unwrap())
    }

    fn callback(engine: &Engine, source: &str) -> ScriptCallback {
        engine.context.with(|ctx| {
            let func: Function = ctx.eval(source).unwrap();
            persist(&ctx, func)
        })
    }

    #[test]
    fn test_invoke_runs_callback_and_microtasks() {
        let engine = engine();
        let cb = callback(&engine, "globalThis.log = []; () => { log.push('call'); Promise.resolve().then(() => log.push('micro')); }");
        invoke(&Rc::downgrade(&engine), &cb, |func| func.call::<_, ()>(())).unwrap();

        let log: Vec<String> = engine.context.with(|ctx| ctx.eval("log").unwrap());
        assert_eq!(log, vec!["call", "micro"]);
        drop(cb);
    }

    #[test]
    fn test_thrown_error_becomes_callback_error() {
        let engine = engine();
        let cb = callback(&engine, "() => { throw new TypeError('bad input'); }");
        let err = invoke(&Rc::downgrade(&engine), &cb, |func| func.call::<_, ()>(())).unwrap_err();
        assert_eq!(err.message, "TypeError: bad input");
        assert!(err.stack.is_some());

        let cb2 = callback(&engine, "() => { throw 'plain'; }");
        let err = invoke(&Rc::downgrade(&engine), &cb2, |func| func.call::<_, ()>(())).unwrap_err();
        assert_eq!(err.message, "uncaught plain");
        drop((cb, cb2));
    }

    #[test]
    fn test_job_error_takes_pending_exception() {
        let engine = engine();
        let failed = engine
            .context
            .with(|ctx| ctx.eval::<(), _>("throw new RangeError('late')").is_err());
        assert!(failed);

        let err = job_error(&engine.context);
        assert_eq!(err.message, "RangeError: late");
        assert!(err.stack.is_some());
        engine.context.with(|ctx| assert!(ctx.catch().is_null()));

        let value: i32 = engine.context.with(|ctx| ctx.eval("1 + 1").unwrap());
        assert_eq!(value, 2);
    }

    #[test]
    fn test_drain_survives_throwing_microtasks() {
        let engine = engine();
        engine.context.with(|ctx| {
            ctx.eval::<(), _>(
                "globalThis.count = 0;
                 for (let i = 0; i < 3; i++) {
                   Promise.resolve().then(() => { count++; throw new Error('x' + i); });
                 }",
            )
            .unwrap();
        });
        assert_eq!(engine.drain_microtasks(), 3);
        let count: i32 = engine.context.with(|ctx| ctx.eval("count").unwrap());
        assert_eq!(count, 3);
    }

    #[test]
    fn test_dead_engine_is_noop() {
        let engine = engine();
        let weak = Rc::downgrade(&engine);
        let other = Engine::new(0).unwrap();
        let cb = callback(&other, "() => { throw new Error('never'); }");
        drop(engine);

        assert!(invoke(&weak, &cb, |func| func.call::<_, ()>(())).is_ok());
        // Handles must go before their runtime
        drop(cb);
    }

    #[test]
    fn test_throw_error_sets_name() {
        let engine = engine();
        let message = engine.context.with(|ctx| {
            let thrower = Function::new(ctx.clone(), |ctx: Ctx<'_>| -> rquickjs::Result<()> {
                Err(throw_error(&ctx, "EntityNotFound", "Object not found: Missing"))
            })
            .unwrap();
            ctx.globals().set("thrower", thrower).unwrap();
            ctx.eval::<String, _>("try { thrower(); '' } catch (e) { e.name + '|' + e.message }")
                .unwrap()
        });
        assert_eq!(message, "EntityNotFound|Object not found: Missing");
    }
}
