//! Remote control intents embedded in the inbound stream.
//!
//! Best effort: anything that is not a JSON object, or carries none of the
//! recognized keys, is ignored.

use serde_json::{Map, Value};
use tracing::debug;

/// What the peer asked the host to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlIntent {
    /// Push the current local time, then acknowledge.
    TimeSync,
    /// The peer is going away on purpose; hold off automatic reconnection.
    SuppressReconnect,
}

/// Lower-cased value of `key` as text, or empty.
///
/// Numbers and booleans are rendered as text; arrays, objects and null are
/// treated as absent.
fn field(obj: &Map<String, Value>, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s.to_lowercase(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// `true` for a JSON boolean `true` or the string `"true"` in any case.
fn flag(obj: &Map<String, Value>, key: &str) -> bool {
    match obj.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

fn wants_time_sync(obj: &Map<String, Value>) -> bool {
    let request = field(obj, "request");
    let get = field(obj, "get");
    let cmd = field(obj, "cmd");

    matches!(request.as_str(), "datetime" | "time")
        || matches!(get.as_str(), "datetime" | "time")
        || matches!(cmd.as_str(), "get_datetime" | "get_time" | "time_sync")
        || flag(obj, "request_datetime")
}

fn wants_disconnect(obj: &Map<String, Value>) -> bool {
    field(obj, "request") == "disconnect"
        || field(obj, "cmd") == "disconnect"
        || field(obj, "event") == "disconnecting"
        || matches!(field(obj, "state").as_str(), "sleep" | "power_save")
}

/// Inspect one decoded line. Time-sync wins when both intents match.
pub fn interpret(line: &str) -> Option<ControlIntent> {
    let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(line) else {
        return None;
    };

    let intent = if wants_time_sync(&obj) {
        Some(ControlIntent::TimeSync)
    } else if wants_disconnect(&obj) {
        Some(ControlIntent::SuppressReconnect)
    } else {
        None
    };

    if let Some(intent) = intent {
        debug!(?intent, "control intent");
    }
    intent
}
