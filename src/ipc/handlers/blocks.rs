use serde_json::json;

use crate::ipc::error::{err, ok, session_err};
use crate::ipc::handlers::core::require_session;
use crate::ipc::handlers::session_snapshot;
use crate::ipc::types::{AppState, Request};
use crate::session::{AssessmentSession, SessionError};
use crate::textblock::{Feedback, TextBlockType};

const BLOCKS_BULK_APPLY_MAX_EDITS: usize = 1000;

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "blocks.add" => Some(handle_add(state, req)),
        "blocks.update" => Some(handle_update(state, req)),
        "blocks.delete" => Some(handle_delete(state, req)),
        "blocks.bulkApply" => Some(handle_bulk_apply(state, req)),
        _ => None,
    }
}

/// One block/feedback mutation inside a `blocks.bulkApply` batch.
enum Edit {
    Add {
        start_index: usize,
        end_index: usize,
        feedback: Option<Feedback>,
    },
    Update {
        block_id: String,
        start_index: usize,
        end_index: usize,
    },
    Delete {
        block_id: String,
    },
    FeedbackUpsert {
        block_id: String,
        credits: f64,
        detail_text: Option<String>,
    },
    FeedbackDelete {
        block_id: String,
    },
}

fn parse_index(v: &serde_json::Value, key: &str) -> Result<usize, String> {
    v.get(key)
        .and_then(|n| n.as_u64())
        .map(|n| n as usize)
        .ok_or_else(|| format!("missing or non-integer {key}"))
}

fn parse_block_id(v: &serde_json::Value) -> Result<String, String> {
    v.get("blockId")
        .and_then(|b| b.as_str())
        .map(str::to_string)
        .ok_or_else(|| "missing blockId".to_string())
}

/// Optional inline feedback on an add: `{ credits, detailText? }`.
fn parse_inline_feedback(v: &serde_json::Value) -> Result<Option<Feedback>, String> {
    let Some(raw) = v.get("feedback") else {
        return Ok(None);
    };
    if raw.is_null() {
        return Ok(None);
    }
    let credits = raw
        .get("credits")
        .and_then(|c| c.as_f64())
        .ok_or_else(|| "feedback.credits must be a number".to_string())?;
    let detail_text = match raw.get("detailText") {
        None => None,
        Some(d) if d.is_null() => None,
        Some(d) => Some(
            d.as_str()
                .ok_or_else(|| "feedback.detailText must be a string".to_string())?
                .to_string(),
        ),
    };
    Ok(Some(Feedback {
        credits,
        detail_text,
        feedback_type: TextBlockType::Manual,
    }))
}

fn parse_edit(v: &serde_json::Value) -> Result<Edit, String> {
    let op = v
        .get("op")
        .and_then(|o| o.as_str())
        .ok_or_else(|| "missing op".to_string())?;
    match op {
        "add" => Ok(Edit::Add {
            start_index: parse_index(v, "startIndex")?,
            end_index: parse_index(v, "endIndex")?,
            feedback: parse_inline_feedback(v)?,
        }),
        "update" => Ok(Edit::Update {
            block_id: parse_block_id(v)?,
            start_index: parse_index(v, "startIndex")?,
            end_index: parse_index(v, "endIndex")?,
        }),
        "delete" => Ok(Edit::Delete {
            block_id: parse_block_id(v)?,
        }),
        "feedbackUpsert" => Ok(Edit::FeedbackUpsert {
            block_id: parse_block_id(v)?,
            credits: v
                .get("credits")
                .and_then(|c| c.as_f64())
                .ok_or_else(|| "credits must be a number".to_string())?,
            detail_text: v
                .get("detailText")
                .and_then(|d| d.as_str())
                .map(str::to_string),
        }),
        "feedbackDelete" => Ok(Edit::FeedbackDelete {
            block_id: parse_block_id(v)?,
        }),
        other => Err(format!("unknown op: {other}")),
    }
}

fn apply_edit(session: &mut AssessmentSession, edit: Edit) -> Result<(), SessionError> {
    match edit {
        Edit::Add {
            start_index,
            end_index,
            feedback,
        } => session.add_block(start_index, end_index, feedback).map(|_| ()),
        Edit::Update {
            block_id,
            start_index,
            end_index,
        } => session
            .update_block(&block_id, start_index, end_index)
            .map(|_| ()),
        Edit::Delete { block_id } => session.delete_block(&block_id),
        Edit::FeedbackUpsert {
            block_id,
            credits,
            detail_text,
        } => session.upsert_feedback(&block_id, credits, detail_text),
        Edit::FeedbackDelete { block_id } => session.delete_feedback(&block_id),
    }
}

fn handle_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let start_index = match parse_index(&req.params, "startIndex") {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let end_index = match parse_index(&req.params, "endIndex") {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let feedback = match parse_inline_feedback(&req.params) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let session = match require_session(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let block_id = match session.add_block(start_index, end_index, feedback) {
        Ok(id) => id,
        Err(e) => return session_err(&req.id, e),
    };
    if let Err(e) = session.flush() {
        return session_err(&req.id, e);
    }
    let mut result = session_snapshot(session);
    result["blockId"] = json!(block_id);
    ok(&req.id, result)
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let block_id = match parse_block_id(&req.params) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let start_index = match parse_index(&req.params, "startIndex") {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let end_index = match parse_index(&req.params, "endIndex") {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let session = match require_session(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let new_block_id = match session.update_block(&block_id, start_index, end_index) {
        Ok(id) => id,
        Err(e) => return session_err(&req.id, e),
    };
    if let Err(e) = session.flush() {
        return session_err(&req.id, e);
    }
    let mut result = session_snapshot(session);
    result["blockId"] = json!(new_block_id);
    ok(&req.id, result)
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let block_id = match parse_block_id(&req.params) {
        Ok(v) => v,
        Err(msg) => return err(&req.id, "bad_params", msg, None),
    };
    let session = match require_session(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    if let Err(e) = session.delete_block(&block_id) {
        return session_err(&req.id, e);
    }
    if let Err(e) = session.flush() {
        return session_err(&req.id, e);
    }
    ok(&req.id, session_snapshot(session))
}

/// Applies a whole batch of edits with a single reconciliation at the end.
/// Edits are validated structurally before anything is applied; a failure
/// while applying stops the batch, and the edits before it stay applied
/// (the flush still runs so the partition is consistent).
fn handle_bulk_apply(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(raw_edits) = req.params.get("edits").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing edits array", None);
    };
    if raw_edits.len() > BLOCKS_BULK_APPLY_MAX_EDITS {
        return err(
            &req.id,
            "bad_params",
            format!("too many edits (max {BLOCKS_BULK_APPLY_MAX_EDITS})"),
            Some(json!({ "edits": raw_edits.len() })),
        );
    }

    let mut edits: Vec<Edit> = Vec::with_capacity(raw_edits.len());
    for (i, raw) in raw_edits.iter().enumerate() {
        match parse_edit(raw) {
            Ok(e) => edits.push(e),
            Err(msg) => {
                return err(
                    &req.id,
                    "bad_params",
                    format!("edit {i}: {msg}"),
                    Some(json!({ "index": i })),
                )
            }
        }
    }

    let session = match require_session(state, req) {
        Ok(s) => s,
        Err(resp) => return resp,
    };

    let mut failed: Option<(usize, SessionError)> = None;
    for (i, edit) in edits.into_iter().enumerate() {
        if let Err(e) = apply_edit(session, edit) {
            failed = Some((i, e));
            break;
        }
    }
    if let Err(e) = session.flush() {
        return session_err(&req.id, e);
    }
    if let Some((i, e)) = failed {
        let details = match &e {
            SessionError::Reconcile(re) => json!({ "index": i, "error": re }),
            _ => json!({ "index": i }),
        };
        return err(&req.id, e.code(), e.message(), Some(details));
    }
    ok(&req.id, session_snapshot(session))
}
