//! Append-only JSONL audit logger (spec §4.B, component B).
//!
//! Three streams, one [`StreamPool`] each: aggregated daily, per-run,
//! and per-validation. Writes are buffered and flushed explicitly at
//! the end of a routing cycle; failures to write are surfaced as
//! warnings (`tracing::warn!`), never as routing errors — a broken
//! audit trail must never block a user's request.

mod event;
mod streams;
mod tail;

pub use event::AuditEvent;
pub use streams::StreamPool;
pub use tail::{tail, Stream};

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum AuditLoggerError {
    #[error("io error: {0}")]
    Io(String),
    #[error("failed to serialize audit event: {0}")]
    Serialize(String),
}

pub struct AuditLogger {
    log_root: PathBuf,
    pool: StreamPool,
}

impl AuditLogger {
    pub fn new(log_root: impl Into<PathBuf>) -> Self {
        Self {
            log_root: log_root.into(),
            pool: StreamPool::default(),
        }
    }

    pub fn log_root(&self) -> &Path {
        &self.log_root
    }

    /// Record one event across the streams relevant to `phase`: always
    /// the aggregated daily stream, plus the per-run stream, plus (for
    /// validation phases) the per-validation stream.
    pub fn record(&self, run_id: &str, phase: &str, route_id: &str, payload: Value) {
        let event = AuditEvent::new(run_id, phase, route_id, payload);
        self.write_or_warn(&tail::stream_path(
            &self.log_root,
            &Stream::AppDaily { date: today() },
        ), &event);
        self.write_or_warn(&tail::stream_path(
            &self.log_root,
            &Stream::Run { run_id: run_id.to_string() },
        ), &event);
    }

    /// Record a validation-stage outcome into its own per-validation
    /// file, in addition to the aggregated/per-run streams.
    pub fn record_validation(
        &self,
        run_id: &str,
        route_id: &str,
        module: &str,
        phase_name: &str,
        payload: Value,
    ) {
        self.record(run_id, phase_name, route_id, payload.clone());
        let event = AuditEvent::new(run_id, phase_name, route_id, payload);
        self.write_or_warn(
            &tail::stream_path(
                &self.log_root,
                &Stream::Validation {
                    date: today(),
                    phase: phase_name.to_string(),
                    module: module.to_string(),
                },
            ),
            &event,
        );
    }

    fn write_or_warn(&self, path: &Path, event: &AuditEvent) {
        if let Err(e) = self.pool.append(path, event) {
            tracing::warn!(error = %e, path = %path.display(), "audit write failed");
        }
    }

    /// Flush and fsync every open stream. Called once at the end of a
    /// routing cycle.
    pub fn flush(&self) {
        if let Err(e) = self.pool.flush_all() {
            tracing::warn!(error = %e, "audit flush failed");
        }
    }

    /// Read-only accessor used by dashboards (spec §6).
    pub fn tail(
        &self,
        stream: &Stream,
        filter: impl Fn(&AuditEvent) -> bool,
    ) -> std::io::Result<Vec<AuditEvent>> {
        tail::tail(&self.log_root, stream, filter)
    }
}

fn today() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}
