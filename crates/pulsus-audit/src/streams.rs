//! Per-file buffered JSONL writer, one mutex per stream (spec §5
//! "Shared-resource policy": the audit logger accepts concurrent
//! writes, serialized per file).

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::event::AuditEvent;
use crate::AuditLoggerError;

#[derive(Default)]
pub struct StreamPool {
    writers: Mutex<HashMap<PathBuf, BufWriter<File>>>,
}

impl StreamPool {
    pub fn append(&self, path: &Path, event: &AuditEvent) -> Result<(), AuditLoggerError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| AuditLoggerError::Io(format!("{}: {e}", parent.display())))?;
        }
        let mut writers = self.writers.lock().expect("stream pool lock poisoned");
        let writer = match writers.get_mut(path) {
            Some(w) => w,
            None => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| AuditLoggerError::Io(format!("{}: {e}", path.display())))?;
                writers.insert(path.to_path_buf(), BufWriter::new(file));
                writers.get_mut(path).expect("just inserted")
            }
        };
        let line = serde_json::to_string(event)
            .map_err(|e| AuditLoggerError::Serialize(e.to_string()))?;
        writeln!(writer, "{line}").map_err(|e| AuditLoggerError::Io(e.to_string()))?;
        Ok(())
    }

    /// Flush every open writer. Called at the end of each routing cycle
    /// (spec §3 "Envelopes are created per-call...Audit events are
    /// owned by the logger; writes are fsync-durable at the end of each
    /// routing cycle").
    pub fn flush_all(&self) -> Result<(), AuditLoggerError> {
        let mut writers = self.writers.lock().expect("stream pool lock poisoned");
        for (path, writer) in writers.iter_mut() {
            writer
                .flush()
                .map_err(|e| AuditLoggerError::Io(format!("{}: {e}", path.display())))?;
            writer
                .get_ref()
                .sync_all()
                .map_err(|e| AuditLoggerError::Io(format!("fsync {}: {e}", path.display())))?;
        }
        Ok(())
    }
}
