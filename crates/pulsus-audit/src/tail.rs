//! Read-only accessor used by dashboards (spec §6 "AuditLogger.tail").

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::event::AuditEvent;

/// Which stream to read: aggregated daily, a specific run, or a
/// specific validation file.
#[derive(Debug, Clone)]
pub enum Stream {
    AppDaily { date: String },
    Run { run_id: String },
    Validation { date: String, phase: String, module: String },
}

/// Read every well-formed line of the named stream, keeping only events
/// that satisfy `filter`. Malformed lines are skipped rather than
/// aborting the read (the writer side never produces them, but a
/// dashboard reading a log concurrently with a crash mid-write should
/// not choke on a half-written final line).
pub fn tail(
    log_root: &Path,
    stream: &Stream,
    filter: impl Fn(&AuditEvent) -> bool,
) -> std::io::Result<Vec<AuditEvent>> {
    let path = stream_path(log_root, stream);
    let file = match File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };
    let reader = BufReader::new(file);
    let mut events = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if let Ok(event) = serde_json::from_str::<AuditEvent>(&line) {
            if filter(&event) {
                events.push(event);
            }
        }
    }
    Ok(events)
}

pub fn stream_path(log_root: &Path, stream: &Stream) -> std::path::PathBuf {
    match stream {
        Stream::AppDaily { date } => log_root.join("app").join(date).join("app.jsonl"),
        Stream::Run { run_id } => log_root.join("runs").join(run_id).join("steps.jsonl"),
        Stream::Validation { date, phase, module } => log_root
            .join("validation")
            .join(date)
            .join(format!("{phase}_{module}.jsonl")),
    }
}
