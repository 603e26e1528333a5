use serde_json::json;
use uuid::Uuid;

use crate::ipc::error::{err, ok, session_err};
use crate::ipc::handlers::session_snapshot;
use crate::ipc::types::{AppState, Request};
use crate::session::AssessmentSession;
use crate::textblock::{Submission, TextBlockRef};

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "assessments.open" => Some(handle_open(state, req)),
        "assessments.get" => Some(handle_get(state, req)),
        "assessments.close" => Some(handle_close(state, req)),
        _ => None,
    }
}

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "openSessions": state.sessions.len(),
        }),
    )
}

fn handle_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(raw_submission) = req.params.get("submission") else {
        return err(&req.id, "bad_params", "missing params.submission", None);
    };
    let submission: Submission = match serde_json::from_value(raw_submission.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", format!("bad submission: {e}"), None),
    };
    if let Err(msg) = submission.validate_submitted_date() {
        return err(&req.id, "bad_params", msg, None);
    }

    let refs: Vec<TextBlockRef> = match req.params.get("blocks") {
        None => Vec::new(),
        Some(raw) => match serde_json::from_value(raw.clone()) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "bad_params", format!("bad blocks: {e}"), None),
        },
    };

    let max_points = req
        .params
        .get("maxPoints")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);
    let bonus_points = req
        .params
        .get("bonusPoints")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);
    if max_points < 0.0 || bonus_points < 0.0 {
        return err(&req.id, "bad_params", "points must be non-negative", None);
    }

    let session = match AssessmentSession::open(submission, refs, max_points, bonus_points) {
        Ok(s) => s,
        Err(e) => return session_err(&req.id, e),
    };

    let session_id = Uuid::new_v4().to_string();
    let mut result = session_snapshot(&session);
    result["sessionId"] = json!(&session_id);
    state.sessions.insert(session_id, session);
    ok(&req.id, result)
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session = match require_session(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let mut result = session_snapshot(session);
    result["submission"] = json!(session.submission);
    result["blocksWithFeedback"] = json!(session.blocks_with_feedback());
    ok(&req.id, result)
}

fn handle_close(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(session_id) = req.params.get("sessionId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing sessionId", None);
    };
    if state.sessions.remove(session_id).is_none() {
        return err(&req.id, "no_session", "unknown sessionId", None);
    }
    ok(&req.id, json!({ "closed": true }))
}

/// Shared sessionId lookup; an Err carries the ready error response.
pub fn require_session<'a>(
    state: &'a mut AppState,
    req: &Request,
) -> Result<&'a mut AssessmentSession, serde_json::Value> {
    let Some(session_id) = req.params.get("sessionId").and_then(|v| v.as_str()) else {
        return Err(err(&req.id, "bad_params", "missing sessionId", None));
    };
    state
        .sessions
        .get_mut(session_id)
        .ok_or_else(|| err(&req.id, "no_session", "unknown sessionId", None))
}
