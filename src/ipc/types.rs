use std::collections::HashMap;

use serde::Deserialize;

use crate::session::AssessmentSession;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Daemon-wide state: the open assessment sessions, keyed by the session id
/// minted at `assessments.open`. Nothing is persisted; the front end
/// re-opens a session from server data after a restart.
#[derive(Default)]
pub struct AppState {
    pub sessions: HashMap<String, AssessmentSession>,
}
