pub mod blocks;
pub mod core;
pub mod feedback;

use serde_json::json;

use crate::session::AssessmentSession;

/// The state every mutating method answers with: the reconciled partition,
/// the displaced set, and the capped total score.
pub fn session_snapshot(session: &AssessmentSession) -> serde_json::Value {
    json!({
        "partition": session.text_block_refs,
        "displaced": session.unused_refs,
        "totalScore": session.total_score(),
    })
}
