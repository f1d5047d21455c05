//! JSON <-> JS value conversion

use rquickjs::{Array, Ctx, Object, Value};
use serde_json::Value as Json;

/// Convert a JSON value into a JS value owned by `ctx`.
pub fn json_to_js<'js>(ctx: &Ctx<'js>, value: &Json) -> rquickjs::Result<Value<'js>> {
    match value {
        Json::Null => Ok(Value::new_null(ctx.clone())),
        Json::Bool(b) => Ok(Value::new_bool(ctx.clone(), *b)),
        Json::Number(n) => match n.as_i64().and_then(|i| i32::try_from(i).ok()) {
            Some(i) => Ok(Value::new_int(ctx.clone(), i)),
            None => Ok(Value::new_float(ctx.clone(), n.as_f64().unwrap_or(f64::NAN))),
        },
        Json::String(s) => Ok(rquickjs::String::from_str(ctx.clone(), s)?.into_value()),
        Json::Array(items) => {
            let array = Array::new(ctx.clone())?;
            for (i, item) in items.iter().enumerate() {
                array.set(i, json_to_js(ctx, item)?)?;
            }
            Ok(array.into_value())
        }
        Json::Object(map) => {
            let object = Object::new(ctx.clone())?;
            for (key, item) in map {
                object.set(key.as_str(), json_to_js(ctx, item)?)?;
            }
            Ok(object.into_value())
        }
    }
}

/// Nesting below this many containers renders as [`TRUNCATED`].
pub const MAX_DEPTH: usize = 64;

/// Stands in for a container that is one of its own ancestors.
pub const CIRCULAR: &str = "[Circular]";

/// Stands in for a container nested deeper than [`MAX_DEPTH`].
pub const TRUNCATED: &str = "[Truncated]";

/// Convert a JS value to JSON. `undefined`, functions and symbols become
/// `null`; non-finite numbers too. Self-references and overly deep nesting
/// become marker strings instead of recursing.
pub fn js_to_json<'js>(value: Value<'js>) -> rquickjs::Result<Json> {
    let mut ancestors = Vec::new();
    walk(value, &mut ancestors)
}

fn walk<'js>(value: Value<'js>, ancestors: &mut Vec<Value<'js>>) -> rquickjs::Result<Json> {
    if value.is_null() || value.is_undefined() {
        return Ok(Json::Null);
    }
    if let Some(b) = value.as_bool() {
        return Ok(Json::Bool(b));
    }
    if let Some(i) = value.as_int() {
        return Ok(Json::from(i));
    }
    if let Some(f) = value.as_float() {
        return Ok(serde_json::Number::from_f64(f).map_or(Json::Null, Json::Number));
    }
    if let Some(s) = value.as_string() {
        return Ok(Json::String(s.to_string()?));
    }
    if value.is_function() || !value.is_object() {
        return Ok(Json::Null);
    }

    // Value equality on objects is identity
    if ancestors.contains(&value) {
        return Ok(Json::String(CIRCULAR.to_string()));
    }
    if ancestors.len() >= MAX_DEPTH {
        return Ok(Json::String(TRUNCATED.to_string()));
    }

    ancestors.push(value.clone());
    let json = walk_container(&value, ancestors);
    ancestors.pop();
    json
}

fn walk_container<'js>(value: &Value<'js>, ancestors: &mut Vec<Value<'js>>) -> rquickjs::Result<Json> {
    if let Some(array) = value.as_array() {
        let mut items = Vec::with_capacity(array.len());
        for item in array.iter::<Value<'js>>() {
            items.push(walk(item?, ancestors)?);
        }
        return Ok(Json::Array(items));
    }
    let mut map = serde_json::Map::new();
    if let Some(object) = value.as_object() {
        for entry in object.props::<String, Value<'js>>() {
            let (key, item) = entry?;
            map.insert(key, walk(item, ancestors)?);
        }
    }
    Ok(Json::Object(map))
}

/// Human-readable rendering used by `print` and `inspect`: strings verbatim,
/// everything else as pretty JSON.
pub fn display_value(value: Value<'_>) -> String {
    if value.is_undefined() {
        return "undefined".to_string();
    }
    if let Some(s) = value.as_string() {
        return s.to_string().unwrap_or_default();
    }
    match js_to_json(value) {
        Ok(json) => serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string()),
        Err(err) => format!("<unprintable: {err}>"),
    }
}
