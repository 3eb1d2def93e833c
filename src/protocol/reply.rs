//! Outbound frame builders.
//!
//! Control replies are named `<prefix>:<name>`; frames that only the
//! server emits use `<prefix>_internal:<name>`.

use serde::Serialize;
use serde_json::{json, Value};

/// Keepalive reply name.
pub const PONG: &str = "pong";

/// Acknowledgement sent after a connection joins a channel.
pub const SUBSCRIPTION_SUCCEEDED: &str = "subscription_succeeded";

/// Error reply name.
pub const ERROR: &str = "error";

/// Error code for a request the channel refused to authorize.
pub const ERROR_CODE_UNAUTHORIZED: u16 = 4009;

/// Error code for a server-side failure; the client may retry later.
pub const ERROR_CODE_TRY_AGAIN: u16 = 4100;

/// Full control event name, e.g. `pusher:pong`.
pub fn control_event(prefix: &str, name: &str) -> String {
    format!("{prefix}:{name}")
}

/// Full internal event name, e.g. `pusher_internal:subscription_succeeded`.
pub fn internal_event(prefix: &str, name: &str) -> String {
    format!("{prefix}_internal:{name}")
}

/// `{"event":"<prefix>:pong"}`
pub fn pong(prefix: &str) -> Value {
    json!({ "event": control_event(prefix, PONG) })
}

/// `{"event":"<prefix>_internal:subscription_succeeded","channel":...}`
///
/// `data` is omitted for public channels and carries presence
/// information for presence channels.
pub fn subscription_succeeded(prefix: &str, channel: &str, data: Option<Value>) -> Value {
    let mut frame = json!({
        "event": internal_event(prefix, SUBSCRIPTION_SUCCEEDED),
        "channel": channel,
    });
    if let Some(data) = data {
        frame["data"] = data;
    }
    frame
}

/// `{"event":"<prefix>:error","data":{"message":...,"code":...}}`
pub fn error(prefix: &str, message: &str, code: Option<u16>) -> Value {
    json!({
        "event": control_event(prefix, ERROR),
        "data": { "message": message, "code": code },
    })
}

/// Wrap an operation result as `{"data": ...}`.
pub fn data_frame<T: Serialize>(payload: &T) -> serde_json::Result<Value> {
    Ok(json!({ "data": serde_json::to_value(payload)? }))
}
