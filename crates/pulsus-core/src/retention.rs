//! Age-based garbage collection of the scratch directory (spec §3
//! "Lifetime & ownership": composed/generated artifacts are retained
//! for a configured window, default 7 days, then garbage-collected by
//! age).
//!
//! This is a standalone sweep rather than a background task the router
//! spawns itself — nothing in spec §5's concurrency model names a
//! retention timer as one of the three suspension points, so an
//! embedder calls [`sweep_scratch`] on whatever schedule it likes (a
//! cron-style job, a `tokio::time::interval` in its own runtime).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Remove every run directory directly under `route_tmp_root` whose
/// modification time is older than `retention`, relative to `now`.
/// Returns the paths actually removed; a directory whose metadata
/// can't be read is skipped rather than treated as an error, matching
/// the registry's "malformed entry is skipped, not fatal" posture
/// (spec §4.D).
pub fn sweep_scratch(
    route_tmp_root: &Path,
    retention: Duration,
    now: SystemTime,
) -> std::io::Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    let entries = match fs::read_dir(route_tmp_root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(removed),
        Err(e) => return Err(e),
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        let age = now.duration_since(modified).unwrap_or_default();
        if age > retention {
            if fs::remove_dir_all(&path).is_ok() {
                removed.push(path);
            } else {
                tracing::warn!(path = %path.display(), "failed to remove expired scratch directory");
            }
        }
    }

    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn a_run_directory_younger_than_the_window_survives() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("run-1")).unwrap();
        let removed = sweep_scratch(dir.path(), Duration::from_secs(7 * 86_400), SystemTime::now()).unwrap();
        assert!(removed.is_empty());
        assert!(dir.path().join("run-1").exists());
    }

    #[test]
    fn a_zero_retention_window_sweeps_everything_present() {
        let dir = tempdir().unwrap();
        std::fs::create_dir(dir.path().join("run-1")).unwrap();
        std::fs::create_dir(dir.path().join("run-2")).unwrap();
        let removed = sweep_scratch(dir.path(), Duration::ZERO, SystemTime::now()).unwrap();
        assert_eq!(removed.len(), 2);
        assert!(!dir.path().join("run-1").exists());
        assert!(!dir.path().join("run-2").exists());
    }

    #[test]
    fn a_missing_root_sweeps_to_an_empty_result_not_an_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let removed = sweep_scratch(&missing, Duration::from_secs(86_400), SystemTime::now()).unwrap();
        assert!(removed.is_empty());
    }

    #[test]
    fn a_plain_file_under_the_root_is_ignored() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("stray.txt"), b"not a run dir").unwrap();
        let removed = sweep_scratch(dir.path(), Duration::ZERO, SystemTime::now()).unwrap();
        assert!(removed.is_empty());
        assert!(dir.path().join("stray.txt").exists());
    }
}
