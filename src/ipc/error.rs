use serde_json::json;

use crate::session::SessionError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Maps a session-layer error onto the wire. Reconcile errors carry their
/// serialized form in `details` so the front end can point at the blocks.
pub fn session_err(id: &str, e: SessionError) -> serde_json::Value {
    let details = match &e {
        SessionError::Reconcile(re) => serde_json::to_value(re).ok(),
        SessionError::BlockNotFound(_) | SessionError::FeedbackNotFound(_) => None,
    };
    err(id, e.code(), e.message(), details)
}
