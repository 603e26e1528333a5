use serde_json::json;

use crate::ipc::error::{err, ok, session_err};
use crate::ipc::handlers::core::require_session;
use crate::ipc::handlers::session_snapshot;
use crate::ipc::types::{AppState, Request};

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "feedback.upsert" => Some(handle_upsert(state, req)),
        "feedback.delete" => Some(handle_delete(state, req)),
        "score.total" => Some(handle_score_total(state, req)),
        _ => None,
    }
}

fn handle_upsert(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(block_id) = req.params.get("blockId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing blockId", None);
    };
    let Some(credits) = req.params.get("credits").and_then(|v| v.as_f64()) else {
        return err(&req.id, "bad_params", "credits must be a number", None);
    };
    let detail_text = match req.params.get("detailText") {
        None => None,
        Some(v) if v.is_null() => None,
        Some(v) => match v.as_str() {
            Some(s) => Some(s.to_string()),
            None => return err(&req.id, "bad_params", "detailText must be a string", None),
        },
    };

    let block_id = block_id.to_string();
    let session = match require_session(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    if let Err(e) = session.upsert_feedback(&block_id, credits, detail_text) {
        return session_err(&req.id, e);
    }
    if let Err(e) = session.flush() {
        return session_err(&req.id, e);
    }
    ok(&req.id, session_snapshot(session))
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(block_id) = req.params.get("blockId").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing blockId", None);
    };
    let block_id = block_id.to_string();
    let session = match require_session(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    if let Err(e) = session.delete_feedback(&block_id) {
        return session_err(&req.id, e);
    }
    if let Err(e) = session.flush() {
        return session_err(&req.id, e);
    }
    ok(&req.id, session_snapshot(session))
}

fn handle_score_total(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session = match require_session(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    ok(
        &req.id,
        json!({
            "totalScore": session.total_score(),
            "maxPoints": session.max_points,
            "bonusPoints": session.bonus_points,
        }),
    )
}
