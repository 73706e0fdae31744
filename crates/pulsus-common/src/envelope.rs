//! The standardized response envelope (spec §3 "Envelope").
//!
//! Every capability invocation and every internal stage returns one of
//! these. `success = true` iff `error` is `None`; that invariant is
//! enforced by construction, not by convention — there is no public way
//! to build an `Envelope` with both fields set inconsistently.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Terminal outcome recorded on an [`Envelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    Failure,
    Blocked,
    Cached,
    Partial,
}

/// Response for every capability invocation and every stage output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub status: Status,
    #[serde(default)]
    pub context: BTreeMap<String, Value>,
    /// Append-only step log. Once built, entries are only ever pushed,
    /// never removed or reordered.
    #[serde(default)]
    pub trace: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl Envelope {
    /// Build a successful envelope. `error` is always `None`.
    pub fn ok(data: impl Into<Value>) -> Self {
        Self::new(true, data.into(), None, Status::Success)
    }

    /// Build a successful envelope with an explicit status other than
    /// `Success` (e.g. `Cached`, `Partial`) while still satisfying the
    /// `success = true <-> error = None` invariant.
    pub fn ok_with_status(data: impl Into<Value>, status: Status) -> Self {
        assert!(
            status != Status::Failure && status != Status::Blocked,
            "ok_with_status must not be used to construct a failing envelope"
        );
        Self::new(true, data.into(), None, status)
    }

    /// Build a failed envelope. `success` is always `false`.
    pub fn fail(error: impl Into<String>) -> Self {
        Self::new(false, Value::Null, Some(error.into()), Status::Failure)
    }

    /// Build a `blocked` envelope (policy denial, failed validation, …).
    pub fn blocked(error: impl Into<String>) -> Self {
        Self::new(false, Value::Null, Some(error.into()), Status::Blocked)
    }

    fn new(success: bool, data: Value, error: Option<String>, status: Status) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(
            "timestamp_utc".to_string(),
            Value::String(Utc::now().to_rfc3339()),
        );
        Self {
            success,
            data,
            error,
            status,
            context: BTreeMap::new(),
            trace: Vec::new(),
            metadata,
        }
    }

    /// Attach a caller/session/operation context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Append a human-readable trace step. Never removes prior entries.
    #[must_use]
    pub fn with_trace(mut self, step: impl Into<String>) -> Self {
        self.trace.push(step.into());
        self
    }

    /// Prepend a trace entry, used by the Composer when it forwards a
    /// failing step's envelope but still needs to record that the
    /// composition halted at that step (spec §4.H).
    pub fn prepend_trace(&mut self, step: impl Into<String>) {
        self.trace.insert(0, step.into());
    }

    /// Stamp `metadata.latency_ms` from a start [`Instant`]. Called once,
    /// right before the envelope leaves the owning stage.
    #[must_use]
    pub fn with_latency(mut self, started_at: Instant) -> Self {
        let latency_ms = started_at.elapsed().as_secs_f64() * 1000.0;
        self.metadata.insert(
            "latency_ms".to_string(),
            Value::from(latency_ms.round() as u64),
        );
        self
    }

    /// Arbitrary metadata entry (beyond timestamp/latency).
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Canonical JSON-safe representation (`RouteDecision.to_dict()`
    /// equivalent for bare envelopes, spec §6).
    pub fn to_dict(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Inverse of [`Self::to_dict`]. Rejects malformed envelopes
    /// (unknown `status` tag, missing required fields) with a
    /// descriptive error instead of panicking (spec §4.A).
    pub fn from_dict(value: Value) -> Result<Self, String> {
        serde_json::from_value(value).map_err(|e| format!("malformed envelope: {e}"))
    }

    pub fn timestamp_utc(&self) -> Option<DateTime<Utc>> {
        self.metadata
            .get("timestamp_utc")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_implies_no_error() {
        let env = Envelope::ok(serde_json::json!({"x": 1}));
        assert!(env.success);
        assert!(env.error.is_none());
        assert_eq!(env.status, Status::Success);
    }

    #[test]
    fn failure_implies_error_present() {
        let env = Envelope::fail("boom");
        assert!(!env.success);
        assert_eq!(env.error.as_deref(), Some("boom"));
        assert_eq!(env.status, Status::Failure);
    }

    #[test]
    fn round_trip_is_identity() {
        let env = Envelope::ok(serde_json::json!({"rows": [1, 2, 3]}))
            .with_context("caller", "test")
            .with_trace("parsed")
            .with_trace("scored");
        let dict = env.to_dict();
        let back = Envelope::from_dict(dict).unwrap();
        assert_eq!(back.success, env.success);
        assert_eq!(back.trace, env.trace);
        assert_eq!(back.context, env.context);
        assert_eq!(back.data, env.data);
    }

    #[test]
    fn trace_is_append_only_in_practice() {
        let env = Envelope::ok(Value::Null)
            .with_trace("a")
            .with_trace("b")
            .with_trace("c");
        assert_eq!(env.trace, vec!["a", "b", "c"]);
    }

    #[test]
    fn unknown_status_tag_fails_to_deserialize_rather_than_panic() {
        let raw = serde_json::json!({
            "success": true,
            "data": null,
            "status": "not_a_real_status",
            "context": {},
            "trace": [],
            "metadata": {}
        });
        let result = Envelope::from_dict(raw);
        assert!(result.is_err());
    }
}
