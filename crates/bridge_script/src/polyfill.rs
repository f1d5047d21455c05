//! Script-level prelude evaluated after the native bindings are installed

/// `console` on top of the `__console_*` sinks. Errors render with their
/// stack, other non-strings as JSON.
pub const CONSOLE: &str = r#"
(function (global) {
  function render(value) {
    if (typeof value === "string") return value;
    if (value instanceof Error) {
      return value.stack ? String(value) + "\n" + value.stack : String(value);
    }
    try {
      const json = JSON.stringify(value);
      return json === undefined ? String(value) : json;
    } catch (_) {
      return String(value);
    }
  }
  function format(args) {
    return Array.prototype.map.call(args, render).join(" ");
  }
  global.console = {
    log: function () { __console_log(format(arguments)); },
    info: function () { __console_log(format(arguments)); },
    warn: function () { __console_warn(format(arguments)); },
    error: function () { __console_error(format(arguments)); },
    debug: function () { __console_debug(format(arguments)); },
  };
})(globalThis);
"#;

pub const QUEUE_MICROTASK: &str = r#"
if (typeof globalThis.queueMicrotask !== "function") {
  globalThis.queueMicrotask = function (callback) {
    if (typeof callback !== "function") {
      throw new TypeError("queueMicrotask expects a function");
    }
    Promise.resolve().then(callback);
  };
}
"#;

/// Browser-style `WebSocket` over the `__ws_*` primitives.
pub const WEBSOCKET: &str = r#"
(function (global) {
  const KINDS = ["open", "message", "error", "close"];

  class WebSocket {
    constructor(url) {
      this.url = String(url);
      this._handlers = {};
      this._id = __ws_create(this.url);
      const socket = this;
      __ws_set_callback(this._id, "open", function () {
        socket._dispatch("open", { type: "open" });
      });
      __ws_set_callback(this._id, "message", function (data) {
        socket._dispatch("message", { type: "message", data: data });
      });
      __ws_set_callback(this._id, "error", function (error) {
        socket._dispatch("error", { type: "error", error: error });
      });
      __ws_set_callback(this._id, "close", function (code, reason) {
        socket._dispatch("close", { type: "close", code: code, reason: reason });
      });
    }

    get readyState() {
      return __ws_get_ready_state(this._id);
    }

    send(data) {
      __ws_send(this._id, String(data));
    }

    close(code = 1000, reason = "") {
      __ws_close(this._id, code, String(reason));
    }

    _dispatch(kind, event) {
      const handler = this._handlers[kind];
      if (typeof handler === "function") {
        handler.call(this, event);
      }
    }
  }

  for (const kind of KINDS) {
    Object.defineProperty(WebSocket.prototype, "on" + kind, {
      get() { return this._handlers[kind] || null; },
      set(handler) { this._handlers[kind] = handler; },
      configurable: true,
    });
  }

  const states = { CONNECTING: 0, OPEN: 1, CLOSING: 2, CLOSED: 3 };
  Object.assign(WebSocket, states);
  Object.assign(WebSocket.prototype, states);
  global.WebSocket = WebSocket;
})(globalThis);
"#;

/// Prelude sources in evaluation order.
pub const PRELUDE: [(&str, &str); 3] = [
    ("console", CONSOLE),
    ("queueMicrotask", QUEUE_MICROTASK),
    ("WebSocket", WEBSOCKET),
];
