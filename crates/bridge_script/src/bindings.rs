//! Native functions installed on the script global object

use crate::callback::{persist, throw_error};
use crate::convert::{display_value, js_to_json, json_to_js};
use crate::host::HostServices;
use bridge_command::CommandError;
use bridge_net::{ReadyState, CLOSE_NORMAL};
use rquickjs::function::{IntoJsFunc, Opt, Rest};
use rquickjs::{Ctx, Function, Value};
use std::rc::Rc;

/// Install every host-callable on `ctx`'s global object.
pub fn install<'js>(ctx: &Ctx<'js>, services: &Rc<HostServices>) -> rquickjs::Result<()> {
    install_console(ctx)?;
    install_commands(ctx, services)?;
    install_timers(ctx, services)?;
    install_frames(ctx, services)?;
    install_sockets(ctx, services)?;
    install_clock(ctx, services)?;
    Ok(())
}

fn define<'js, F, P>(ctx: &Ctx<'js>, name: &str, func: F) -> rquickjs::Result<()>
where
    F: IntoJsFunc<'js, P> + 'js,
{
    let func = Function::new(ctx.clone(), func)?.with_name(name)?;
    ctx.globals().set(name, func)
}

/// Timer and socket IDs arrive as JS numbers; anything else matches nothing.
fn id_arg(value: &Opt<Value<'_>>) -> Option<u64> {
    let number = value.0.as_ref()?.as_number()?;
    (number.is_finite() && number >= 0.0).then_some(number as u64)
}

/// Codes a script may pass to `close()`: normal closure or the
/// application range.
fn close_code(value: &Value<'_>) -> Option<u16> {
    let number = value.as_number()?;
    let valid = number.fract() == 0.0 && (number == 1000.0 || (3000.0..=4999.0).contains(&number));
    valid.then_some(number as u16)
}

fn install_console<'js>(ctx: &Ctx<'js>) -> rquickjs::Result<()> {
    define(ctx, "__console_log", |message: String| {
        tracing::info!(target: "js", "{message}");
    })?;
    define(ctx, "__console_warn", |message: String| {
        tracing::warn!(target: "js", "{message}");
    })?;
    define(ctx, "__console_error", |message: String| {
        tracing::error!(target: "js", "{message}");
    })?;
    define(ctx, "__console_debug", |message: String| {
        tracing::debug!(target: "js", "{message}");
    })?;
    define(ctx, "print", |args: Rest<Value<'js>>| {
        let line: Vec<String> = args.0.into_iter().map(display_value).collect();
        tracing::info!(target: "js", "{}", line.join(" "));
    })?;
    define(ctx, "inspect", |value: Value<'js>| -> Value<'js> {
        tracing::info!(target: "js", "{}", display_value(value.clone()));
        value
    })?;
    Ok(())
}

fn command_error(ctx: &Ctx<'_>, err: &CommandError) -> rquickjs::Error {
    throw_error(ctx, err.kind(), &err.to_string())
}

fn install_commands<'js>(ctx: &Ctx<'js>, services: &Rc<HostServices>) -> rquickjs::Result<()> {
    let services = Rc::clone(services);
    define(
        ctx,
        "applyCommand",
        move |ctx: Ctx<'js>, input: Value<'js>| -> rquickjs::Result<Value<'js>> {
            // Text in, text out; object in, object out
            if let Some(text) = input.as_string() {
                let text = text.to_string()?;
                return match services.dispatcher.apply_json(&text) {
                    Ok(reply) => Ok(rquickjs::String::from_str(ctx.clone(), &reply)?.into_value()),
                    Err(err) => Err(command_error(&ctx, &err)),
                };
            }
            let command = js_to_json(input)?;
            match services.dispatcher.apply_value(command) {
                Ok(reply) => json_to_js(&ctx, &reply),
                Err(err) => Err(command_error(&ctx, &err)),
            }
        },
    )
}

fn install_timers<'js>(ctx: &Ctx<'js>, services: &Rc<HostServices>) -> rquickjs::Result<()> {
    for (name, repeating) in [("setTimeout", false), ("setInterval", true)] {
        let services = Rc::clone(services);
        define(
            ctx,
            name,
            move |ctx: Ctx<'js>, callback: Function<'js>, delay: Opt<Value<'js>>| -> f64 {
                let delay_ms = delay.0.and_then(|d| d.as_number()).unwrap_or(0.0);
                services.timers.set(persist(&ctx, callback), delay_ms, repeating) as f64
            },
        )?;
    }
    for name in ["clearTimeout", "clearInterval"] {
        let services = Rc::clone(services);
        define(ctx, name, move |id: Opt<Value<'js>>| {
            if let Some(id) = id_arg(&id) {
                services.timers.clear(id);
            }
        })?;
    }
    Ok(())
}

fn install_frames<'js>(ctx: &Ctx<'js>, services: &Rc<HostServices>) -> rquickjs::Result<()> {
    let request = Rc::clone(services);
    define(
        ctx,
        "requestAnimationFrame",
        move |ctx: Ctx<'js>, callback: Function<'js>| -> f64 { request.frames.request(persist(&ctx, callback)) as f64 },
    )?;
    let cancel = Rc::clone(services);
    define(ctx, "cancelAnimationFrame", move |id: Opt<Value<'js>>| {
        if let Some(id) = id_arg(&id) {
            cancel.frames.cancel(id);
        }
    })
}

fn install_sockets<'js>(ctx: &Ctx<'js>, services: &Rc<HostServices>) -> rquickjs::Result<()> {
    let create = Rc::clone(services);
    define(
        ctx,
        "__ws_create",
        move |ctx: Ctx<'js>, url: String| -> rquickjs::Result<f64> {
            create
                .sockets
                .open(&url)
                .map(|id| id as f64)
                .map_err(|err| throw_error(&ctx, "SocketError", &err.to_string()))
        },
    )?;

    let send = Rc::clone(services);
    define(
        ctx,
        "__ws_send",
        move |ctx: Ctx<'js>, id: Opt<Value<'js>>, data: String| -> rquickjs::Result<()> {
            let id = id_arg(&id).unwrap_or(0);
            send.sockets
                .send(id, data)
                .map_err(|err| throw_error(&ctx, "SocketError", &err.to_string()))
        },
    )?;

    let close = Rc::clone(services);
    define(
        ctx,
        "__ws_close",
        move |ctx: Ctx<'js>, id: Opt<Value<'js>>, code: Opt<Value<'js>>, reason: Opt<String>| -> rquickjs::Result<()> {
            let code = match code.0.filter(|c| !c.is_undefined()) {
                None => CLOSE_NORMAL,
                Some(value) => close_code(&value).ok_or_else(|| {
                    throw_error(&ctx, "SocketError", "close code must be 1000 or in 3000..=4999")
                })?,
            };
            if let Some(id) = id_arg(&id) {
                close.sockets.close(id, code, reason.0.unwrap_or_default());
            }
            Ok(())
        },
    )?;

    let register = Rc::clone(services);
    define(
        ctx,
        "__ws_set_callback",
        move |ctx: Ctx<'js>, id: Opt<Value<'js>>, event: String, callback: Function<'js>| -> rquickjs::Result<()> {
            let id = id_arg(&id).unwrap_or(0);
            register
                .sockets
                .set_callback(id, &event, persist(&ctx, callback))
                .map_err(|err| throw_error(&ctx, "SocketError", &err.to_string()))
        },
    )?;

    let state = Rc::clone(services);
    define(ctx, "__ws_get_ready_state", move |id: Opt<Value<'js>>| -> u8 {
        id_arg(&id).map_or(ReadyState::Closed, |id| state.sockets.ready_state(id)).as_u8()
    })
}

fn install_clock<'js>(ctx: &Ctx<'js>, services: &Rc<HostServices>) -> rquickjs::Result<()> {
    let services = Rc::clone(services);
    define(ctx, "getTime", move || -> f64 { services.clock.epoch_ms() })
}
