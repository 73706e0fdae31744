//! The single JSONL record shape every stream writes (spec §4.B).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub timestamp_utc: DateTime<Utc>,
    pub run_id: String,
    pub phase: String,
    pub route_id: String,
    pub payload: Value,
}

impl AuditEvent {
    pub fn new(
        run_id: impl Into<String>,
        phase: impl Into<String>,
        route_id: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            timestamp_utc: Utc::now(),
            run_id: run_id.into(),
            phase: phase.into(),
            route_id: route_id.into(),
            payload,
        }
    }
}
